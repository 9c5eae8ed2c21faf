use crate::ports::{Clock, Permission, PlatformError, PushPlatform, StoreError, SubscriptionStore};

use base64::{URL_SAFE_NO_PAD, decode_config};
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Unknown,
    Unsubscribed,
    RequestingPermission,
    Registering,
    PersistingRecord,
    Subscribed,
    Revoking,
    DeletingRecord,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrarError {
    #[error("push notifications are not supported on this device")]
    UnsupportedPlatform,
    #[error("notification permission was denied")]
    PermissionDenied,
    #[error("the server's public push key is not configured")]
    MissingServerKey,
    #[error("the server's public push key is not valid base64url")]
    InvalidServerKey,
    #[error("push service error: {0}")]
    Platform(#[from] PlatformError),
    #[error("registered with the push service but the subscription was not stored: {0}")]
    StoreWrite(#[source] StoreError),
    #[error("unsubscribe incomplete: {}", unsubscribe_failures(.revoke, .delete))]
    Unsubscribe {
        revoke: Option<PlatformError>,
        delete: Option<StoreError>,
    },
}

fn unsubscribe_failures(revoke: &Option<PlatformError>, delete: &Option<StoreError>) -> String {
    match (revoke, delete) {
        (Some(revoke), Some(delete)) => format!("revoke failed ({revoke}); delete failed ({delete})"),
        (Some(revoke), None) => format!("revoke failed ({revoke})"),
        (None, Some(delete)) => format!("delete failed ({delete})"),
        (None, None) => "no failure recorded".to_string(),
    }
}

/// Keeps one device's push opt-in in step with the shared subscription store.
///
/// The registrar holds no subscribed flag of its own: `current_state` always
/// asks the platform. Transitions are published on a watch channel for
/// display only.
pub struct Registrar<P, S, C> {
    platform: P,
    store: S,
    clock: C,
    application_server_key: Option<String>,
    transitions: watch::Sender<RegistrationState>,
}

impl<P, S, C> Registrar<P, S, C>
where
    P: PushPlatform,
    S: SubscriptionStore,
    C: Clock,
{
    pub fn new(platform: P, store: S, clock: C, application_server_key: Option<String>) -> Self {
        let (transitions, _) = watch::channel(RegistrationState::Unknown);
        Self {
            platform,
            store,
            clock,
            application_server_key,
            transitions,
        }
    }

    pub fn watch(&self) -> watch::Receiver<RegistrationState> {
        self.transitions.subscribe()
    }

    /// Whether the opt-in control should be shown at all.
    pub fn is_offered(&self) -> bool {
        self.platform.is_supported()
            && self.server_key().is_ok()
            && self.platform.permission() != Permission::Denied
    }

    pub async fn current_state(&self) -> Result<RegistrationState, RegistrarError> {
        if !self.platform.is_supported() {
            return Err(RegistrarError::UnsupportedPlatform);
        }
        let state = match self.platform.current_registration().await? {
            Some(_) => RegistrationState::Subscribed,
            None => RegistrationState::Unsubscribed,
        };
        self.publish(state);
        Ok(state)
    }

    /// Opts this device in.
    ///
    /// A store failure leaves the push-service registration in place; calling
    /// `subscribe` again reuses that registration and only retries the write.
    pub async fn subscribe(&self) -> Result<RegistrationState, RegistrarError> {
        if !self.platform.is_supported() {
            return Err(RegistrarError::UnsupportedPlatform);
        }
        let key = self.server_key()?;

        let registration = match self.platform.current_registration().await? {
            Some(existing) => existing,
            None => {
                self.ensure_permission().await?;
                self.publish(RegistrationState::Registering);
                match self.platform.register(&key).await {
                    Ok(registration) => registration,
                    Err(err) => {
                        self.publish(RegistrationState::Unsubscribed);
                        return Err(err.into());
                    }
                }
            }
        };

        self.publish(RegistrationState::PersistingRecord);
        let subscription = registration.into_subscription(self.clock.now());
        if let Err(err) = self.store.upsert(&subscription).await {
            warn!(
                endpoint = %subscription.endpoint,
                error = %err,
                "push registration kept but subscription not stored"
            );
            self.publish(RegistrationState::Unsubscribed);
            return Err(RegistrarError::StoreWrite(err));
        }

        self.publish(RegistrationState::Subscribed);
        Ok(RegistrationState::Subscribed)
    }

    /// Opts this device out. Revoke and delete are both attempted even when
    /// the other fails.
    pub async fn unsubscribe(&self) -> Result<RegistrationState, RegistrarError> {
        if !self.platform.is_supported() {
            self.publish(RegistrationState::Unsubscribed);
            return Ok(RegistrationState::Unsubscribed);
        }
        let Some(registration) = self.platform.current_registration().await? else {
            self.publish(RegistrationState::Unsubscribed);
            return Ok(RegistrationState::Unsubscribed);
        };

        self.publish(RegistrationState::Revoking);
        let revoke = self.platform.revoke(&registration.endpoint).await.err();
        if let Some(err) = &revoke {
            warn!(endpoint = %registration.endpoint, error = %err, "failed to revoke push registration");
        }

        self.publish(RegistrationState::DeletingRecord);
        let delete = self.store.delete(&registration.endpoint).await.err();
        if let Some(err) = &delete {
            warn!(endpoint = %registration.endpoint, error = %err, "failed to delete stored subscription");
        }

        let state = if revoke.is_some() {
            RegistrationState::Subscribed
        } else {
            RegistrationState::Unsubscribed
        };
        self.publish(state);

        if revoke.is_some() || delete.is_some() {
            return Err(RegistrarError::Unsubscribe { revoke, delete });
        }
        Ok(state)
    }

    async fn ensure_permission(&self) -> Result<(), RegistrarError> {
        match self.platform.permission() {
            Permission::Granted => return Ok(()),
            Permission::Denied => {
                self.publish(RegistrationState::Unsubscribed);
                return Err(RegistrarError::PermissionDenied);
            }
            Permission::Default => {}
        }

        self.publish(RegistrationState::RequestingPermission);
        match self.platform.request_permission().await {
            Ok(Permission::Granted) => Ok(()),
            Ok(_) => {
                self.publish(RegistrationState::Unsubscribed);
                Err(RegistrarError::PermissionDenied)
            }
            Err(err) => {
                self.publish(RegistrationState::Unsubscribed);
                Err(err.into())
            }
        }
    }

    fn server_key(&self) -> Result<Vec<u8>, RegistrarError> {
        let key = self
            .application_server_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(RegistrarError::MissingServerKey)?;
        let decoded = decode_config(key.trim_end_matches('='), URL_SAFE_NO_PAD)
            .map_err(|_| RegistrarError::InvalidServerKey)?;
        if decoded.is_empty() {
            return Err(RegistrarError::InvalidServerKey);
        }
        Ok(decoded)
    }

    fn publish(&self, state: RegistrationState) {
        debug!(?state, "registration state");
        self.transitions.send_replace(state);
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::ports::platform::PlatformFuture;
    use crate::push::dispatcher::tests::{TestClock, TestStore};
    use crate::types::push::Registration;
    use std::sync::{Arc, Mutex};

    const SERVER_KEY: &str =
        "BCRweRf_U5iQM4pKNucGRzM6OuLp8Hisa8yX0N2ePIf1oxKitvFT6qvuGgYoTxlMatMDaytXbZR3rVClc2w_p6U";

    #[derive(Clone)]
    struct FakePlatform {
        supported: bool,
        permission: Arc<Mutex<Permission>>,
        answer: Permission,
        registration: Arc<Mutex<Option<Registration>>>,
        prompts: Arc<Mutex<usize>>,
        registered_keys: Arc<Mutex<Vec<Vec<u8>>>>,
        fail_revoke: bool,
    }

    impl FakePlatform {
        fn granting() -> Self {
            Self {
                supported: true,
                permission: Arc::new(Mutex::new(Permission::Default)),
                answer: Permission::Granted,
                registration: Arc::new(Mutex::new(None)),
                prompts: Arc::new(Mutex::new(0)),
                registered_keys: Arc::new(Mutex::new(Vec::new())),
                fail_revoke: false,
            }
        }

        fn registered(self) -> Self {
            *self.registration.lock().expect("registration lock") = Some(registration());
            *self.permission.lock().expect("permission lock") = Permission::Granted;
            self
        }

        fn prompts(&self) -> usize {
            *self.prompts.lock().expect("prompts lock")
        }

        fn is_registered(&self) -> bool {
            self.registration
                .lock()
                .expect("registration lock")
                .is_some()
        }
    }

    fn registration() -> Registration {
        Registration {
            endpoint: "https://push.example/device".to_string(),
            p256dh: "p256".to_string(),
            auth: "auth".to_string(),
        }
    }

    impl PushPlatform for FakePlatform {
        fn is_supported(&self) -> bool {
            self.supported
        }

        fn permission(&self) -> Permission {
            *self.permission.lock().expect("permission lock")
        }

        fn request_permission(&self) -> PlatformFuture<'_, Permission> {
            Box::pin(async move {
                *self.prompts.lock().expect("prompts lock") += 1;
                *self.permission.lock().expect("permission lock") = self.answer;
                Ok(self.answer)
            })
        }

        fn register<'a>(
            &'a self,
            application_server_key: &'a [u8],
        ) -> PlatformFuture<'a, Registration> {
            Box::pin(async move {
                self.registered_keys
                    .lock()
                    .expect("keys lock")
                    .push(application_server_key.to_vec());
                *self.registration.lock().expect("registration lock") = Some(registration());
                Ok(registration())
            })
        }

        fn current_registration(&self) -> PlatformFuture<'_, Option<Registration>> {
            Box::pin(async move { Ok(self.registration.lock().expect("registration lock").clone()) })
        }

        fn revoke<'a>(&'a self, _endpoint: &'a str) -> PlatformFuture<'a, ()> {
            Box::pin(async move {
                if self.fail_revoke {
                    return Err(PlatformError("push service unreachable".to_string()));
                }
                *self.registration.lock().expect("registration lock") = None;
                Ok(())
            })
        }
    }

    fn registrar(
        platform: &FakePlatform,
        store: &TestStore,
        key: Option<&str>,
    ) -> Registrar<FakePlatform, TestStore, TestClock> {
        Registrar::new(
            platform.clone(),
            store.clone(),
            TestClock::frozen(),
            key.map(str::to_string),
        )
    }

    #[tokio::test]
    async fn subscribe__should_register_and_store_subscription() {
        // Given
        let platform = FakePlatform::granting();
        let store = TestStore::default();
        let registrar = registrar(&platform, &store, Some(SERVER_KEY));

        // When
        let state = registrar.subscribe().await.expect("subscribe");

        // Then
        assert_eq!(state, RegistrationState::Subscribed);
        assert_eq!(store.endpoints(), vec!["https://push.example/device".to_string()]);
        assert_eq!(platform.prompts(), 1);
        let keys = platform.registered_keys.lock().expect("keys lock").clone();
        assert_eq!(keys[0].len(), 65);
        assert_eq!(*registrar.watch().borrow(), RegistrationState::Subscribed);
    }

    #[tokio::test]
    async fn subscribe__should_fail_when_platform_unsupported() {
        // Given
        let platform = FakePlatform {
            supported: false,
            ..FakePlatform::granting()
        };
        let store = TestStore::default();

        // When
        let result = registrar(&platform, &store, Some(SERVER_KEY)).subscribe().await;

        // Then
        assert!(matches!(result, Err(RegistrarError::UnsupportedPlatform)));
        assert!(store.endpoints().is_empty());
    }

    #[tokio::test]
    async fn subscribe__should_fail_when_permission_declined() {
        // Given
        let platform = FakePlatform {
            answer: Permission::Denied,
            ..FakePlatform::granting()
        };
        let store = TestStore::default();
        let registrar = registrar(&platform, &store, Some(SERVER_KEY));

        // When
        let first = registrar.subscribe().await;
        let second = registrar.subscribe().await;

        // Then
        assert!(matches!(first, Err(RegistrarError::PermissionDenied)));
        assert!(matches!(second, Err(RegistrarError::PermissionDenied)));
        assert_eq!(platform.prompts(), 1);
        assert!(!platform.is_registered());
        assert_eq!(*registrar.watch().borrow(), RegistrationState::Unsubscribed);
    }

    #[tokio::test]
    async fn subscribe__should_fail_without_prompting_when_server_key_missing() {
        // Given
        let platform = FakePlatform::granting();
        let store = TestStore::default();

        // When
        let missing = registrar(&platform, &store, None).subscribe().await;
        let invalid = registrar(&platform, &store, Some("not base64!")).subscribe().await;

        // Then
        assert!(matches!(missing, Err(RegistrarError::MissingServerKey)));
        assert!(matches!(invalid, Err(RegistrarError::InvalidServerKey)));
        assert_eq!(platform.prompts(), 0);
    }

    #[tokio::test]
    async fn subscribe__should_keep_registration_when_store_write_fails() {
        // Given
        let platform = FakePlatform::granting();
        let store = TestStore::default().failing_writes();
        let registrar = registrar(&platform, &store, Some(SERVER_KEY));

        // When
        let result = registrar.subscribe().await;

        // Then
        assert!(matches!(result, Err(RegistrarError::StoreWrite(_))));
        assert!(platform.is_registered());
        assert_eq!(
            registrar.current_state().await.expect("state"),
            RegistrationState::Subscribed
        );
    }

    #[tokio::test]
    async fn subscribe__should_reuse_existing_registration() {
        // Given
        let platform = FakePlatform::granting().registered();
        let store = TestStore::default();

        // When
        let state = registrar(&platform, &store, Some(SERVER_KEY))
            .subscribe()
            .await
            .expect("subscribe");

        // Then
        assert_eq!(state, RegistrationState::Subscribed);
        assert_eq!(platform.prompts(), 0);
        assert!(platform.registered_keys.lock().expect("keys lock").is_empty());
        assert_eq!(store.endpoints().len(), 1);
    }

    #[tokio::test]
    async fn unsubscribe__should_revoke_and_delete() {
        // Given
        let platform = FakePlatform::granting().registered();
        let store = TestStore::default();
        let registrar = registrar(&platform, &store, Some(SERVER_KEY));
        registrar.subscribe().await.expect("subscribe");

        // When
        let state = registrar.unsubscribe().await.expect("unsubscribe");

        // Then
        assert_eq!(state, RegistrationState::Unsubscribed);
        assert!(!platform.is_registered());
        assert!(store.endpoints().is_empty());
    }

    #[tokio::test]
    async fn unsubscribe__should_be_noop_without_registration() {
        // Given
        let platform = FakePlatform::granting();
        let store = TestStore::default();

        // When
        let state = registrar(&platform, &store, Some(SERVER_KEY))
            .unsubscribe()
            .await
            .expect("unsubscribe");

        // Then
        assert_eq!(state, RegistrationState::Unsubscribed);
        assert!(store.deletes().is_empty());
    }

    #[tokio::test]
    async fn unsubscribe__should_delete_even_when_revoke_fails() {
        // Given
        let platform = FakePlatform {
            fail_revoke: true,
            ..FakePlatform::granting()
        }
        .registered();
        let store = TestStore::default();

        // When
        let result = registrar(&platform, &store, Some(SERVER_KEY))
            .unsubscribe()
            .await;

        // Then
        let Err(RegistrarError::Unsubscribe { revoke, delete }) = result else {
            panic!("expected unsubscribe error");
        };
        assert!(revoke.is_some());
        assert!(delete.is_none());
        assert_eq!(store.deletes(), vec!["https://push.example/device".to_string()]);
    }

    #[tokio::test]
    async fn unsubscribe__should_revoke_even_when_delete_fails() {
        // Given
        let platform = FakePlatform::granting().registered();
        let store = TestStore::default().failing_writes();

        // When
        let result = registrar(&platform, &store, Some(SERVER_KEY))
            .unsubscribe()
            .await;

        // Then
        let Err(err @ RegistrarError::Unsubscribe { .. }) = result else {
            panic!("expected unsubscribe error");
        };
        assert!(err.to_string().contains("delete failed"));
        assert!(!platform.is_registered());
    }

    #[tokio::test]
    async fn current_state__should_follow_platform_not_store() {
        // Given
        let platform = FakePlatform::granting().registered();
        let store = TestStore::default();
        let registrar = registrar(&platform, &store, Some(SERVER_KEY));

        // When
        let state = registrar.current_state().await.expect("state");

        // Then
        assert_eq!(state, RegistrationState::Subscribed);
        assert!(store.endpoints().is_empty());
    }

    #[test]
    fn is_offered__should_hide_feature_when_unusable() {
        // Given
        let store = TestStore::default();
        let denied = FakePlatform::granting();
        *denied.permission.lock().expect("permission lock") = Permission::Denied;

        // Then
        assert!(registrar(&FakePlatform::granting(), &store, Some(SERVER_KEY)).is_offered());
        assert!(!registrar(&FakePlatform::granting(), &store, None).is_offered());
        assert!(!registrar(&denied, &store, Some(SERVER_KEY)).is_offered());
    }
}
