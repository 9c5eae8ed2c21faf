use std::time::Duration;

use reqwest::StatusCode;

use crate::ports::SubscriptionStore;
use crate::ports::store::{StoreError, StoreFuture};
use crate::types::push::{BroadcastRecord, Subscription};

const SUBSCRIPTIONS_TABLE: &str = "push_subscriptions";
const HISTORY_TABLE: &str = "notifications";
const SUBSCRIPTION_COLUMNS: &str = "endpoint,p256dh,auth,created_at";

/// Record store of the hosted backend, spoken to through its PostgREST API.
#[derive(Debug, Clone)]
pub struct RestRecordStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestRecordStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| StoreError::Request(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Rejected {
        status: status.as_u16(),
        body,
    })
}

async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
    let response = request
        .send()
        .await
        .map_err(|err| StoreError::Request(err.to_string()))?;
    check_status(response).await
}

impl SubscriptionStore for RestRecordStore {
    fn upsert<'a>(&'a self, subscription: &'a Subscription) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let request = self
                .request(reqwest::Method::POST, SUBSCRIPTIONS_TABLE)
                .query(&[("on_conflict", "endpoint")])
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(&[subscription]);
            send(request).await?;
            Ok(())
        })
    }

    fn list(&self) -> StoreFuture<'_, Vec<Subscription>> {
        Box::pin(async move {
            let request = self
                .request(reqwest::Method::GET, SUBSCRIPTIONS_TABLE)
                .query(&[("select", SUBSCRIPTION_COLUMNS)]);
            let response = send(request).await?;
            response
                .json::<Vec<Subscription>>()
                .await
                .map_err(|err| StoreError::Decode(err.to_string()))
        })
    }

    fn delete<'a>(&'a self, endpoint: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let filter = format!("eq.{endpoint}");
            let request = self
                .request(reqwest::Method::DELETE, SUBSCRIPTIONS_TABLE)
                .query(&[("endpoint", filter.as_str())]);
            match send(request).await {
                Ok(_) => Ok(()),
                Err(StoreError::Rejected { status, .. })
                    if status == StatusCode::NOT_FOUND.as_u16() =>
                {
                    Ok(())
                }
                Err(err) => Err(err),
            }
        })
    }

    fn record_broadcast<'a>(&'a self, record: &'a BroadcastRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let request = self
                .request(reqwest::Method::POST, HISTORY_TABLE)
                .header("Prefer", "return=minimal")
                .json(&[record]);
            send(request).await?;
            Ok(())
        })
    }
}
