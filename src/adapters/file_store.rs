use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::ports::SubscriptionStore;
use crate::ports::store::{StoreError, StoreFuture};
use crate::types::push::{BroadcastRecord, Subscription};

/// Single JSON file holding every subscription keyed by endpoint, plus the
/// broadcast history. Used when no hosted record store is configured.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    subscriptions: BTreeMap<String, Subscription>,
    #[serde(default)]
    notifications: Vec<BroadcastRecord>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<StoreFile, StoreError> {
        let contents = match tokio::fs::read(self.path.as_path()).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreFile::default());
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&contents).map_err(|err| StoreError::Decode(err.to_string()))
    }

    async fn write(&self, file: &StoreFile) -> Result<(), StoreError> {
        let contents =
            serde_json::to_vec_pretty(file).map_err(|err| StoreError::Decode(err.to_string()))?;
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, self.path.as_path()).await?;
        Ok(())
    }

    async fn modify<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut StoreFile) + Send,
    {
        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;
        change(&mut file);
        self.write(&file).await
    }
}

impl SubscriptionStore for JsonFileStore {
    fn upsert<'a>(&'a self, subscription: &'a Subscription) -> StoreFuture<'a, ()> {
        Box::pin(self.modify(move |file| {
            file.subscriptions
                .insert(subscription.endpoint.clone(), subscription.clone());
        }))
    }

    fn list(&self) -> StoreFuture<'_, Vec<Subscription>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let file = self.read().await?;
            Ok(file.subscriptions.into_values().collect())
        })
    }

    fn delete<'a>(&'a self, endpoint: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(self.modify(move |file| {
            file.subscriptions.remove(endpoint);
        }))
    }

    fn record_broadcast<'a>(&'a self, record: &'a BroadcastRecord) -> StoreFuture<'a, ()> {
        Box::pin(self.modify(move |file| {
            file.notifications.push(record.clone());
        }))
    }
}
