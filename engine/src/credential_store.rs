//! The credential-store machine and its handle.
//!
//! Every read/write of the secret store funnels through this machine's
//! serialized queue, so a store-then-load race can never return stale data.
//! Callers go through [`CredentialStoreHandle`]: send the operation event,
//! wait for the machine to settle in `Success`/`Error`, read the result
//! from the state, and move the machine back to idle. The operation lock
//! keeps one caller's settle/idle cycle from interleaving with another's.

use std::sync::Arc;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use gatehouse_store::{KeyKind, SecretStore};
use gatehouse_types::{
    Action, AwsCredentials, CredentialStoreEvent, CredentialStoreState, Credentials, Event,
    SignInData, StoreAction, StoreError,
};

use crate::machine::{ActionRunner, EventSender, MachineHandle, Resolution, Resolver, StateMachine};

/// Dependencies for the store machine's actions: the live store, and
/// optionally the legacy store migrated from on first bring-up.
pub struct StoreEnvironment {
    store: Arc<dyn SecretStore>,
    legacy: Option<Arc<dyn SecretStore>>,
}

impl StoreEnvironment {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            legacy: None,
        }
    }

    /// Attach a legacy store whose items are moved into the live store the
    /// first time the machine configures.
    #[must_use]
    pub fn with_legacy(mut self, legacy: Arc<dyn SecretStore>) -> Self {
        self.legacy = Some(legacy);
        self
    }
}

/// On-disk shape of the identity half of [`Credentials`].
#[derive(Serialize, Deserialize)]
struct IdentityBundle {
    identity_id: Option<String>,
    credentials: AwsCredentials,
}

struct CredentialStoreResolver;

impl Resolver for CredentialStoreResolver {
    type State = CredentialStoreState;

    fn resolve(
        &self,
        state: &CredentialStoreState,
        event: &Event,
    ) -> Resolution<CredentialStoreState> {
        let Event::CredentialStore(event) = event else {
            return Resolution::unchanged(state);
        };
        use CredentialStoreEvent as E;
        use CredentialStoreState as S;
        match (state, event) {
            (S::NotConfigured | S::Idle, E::Migrate) => Resolution::with(
                S::MigratingLegacyStore,
                Action::Store(StoreAction::MigrateLegacyStore),
            ),
            (S::MigratingLegacyStore | S::Idle, E::Load) => Resolution::with(
                S::LoadingStoredCredentials,
                Action::Store(StoreAction::LoadCredentials),
            ),
            (S::Idle, E::Store(credentials)) => Resolution::with(
                S::StoringCredentials,
                Action::Store(StoreAction::StoreCredentials(credentials.clone())),
            ),
            (S::Idle, E::Clear) => Resolution::with(
                S::ClearingCredentials,
                Action::Store(StoreAction::ClearCredentials),
            ),
            (state, E::CompletedOperation(credentials)) if state.is_busy() => {
                Resolution::next(S::Success(credentials.clone()))
            }
            (state, E::ThrowError(error)) if state.is_busy() => {
                Resolution::next(S::Error(error.clone()))
            }
            (S::Success(_) | S::Error(_), E::MoveToIdle) => Resolution::next(S::Idle),
            _ => Resolution::unchanged(state),
        }
    }

    fn state_label(state: &CredentialStoreState) -> &'static str {
        state.label()
    }
}

/// Serialized access to the credential-store machine.
#[derive(Clone)]
pub struct CredentialStoreHandle {
    machine: Arc<MachineHandle<CredentialStoreState>>,
    op_lock: Arc<Mutex<()>>,
}

impl CredentialStoreHandle {
    /// Spawns the store machine around the given environment.
    #[must_use]
    pub fn spawn(environment: StoreEnvironment) -> Self {
        let env = Arc::new(environment);
        let runner: ActionRunner = Arc::new(move |action, events| {
            let env = Arc::clone(&env);
            async move {
                match action {
                    Action::Store(action) => run_action(action, &env, &events).await,
                    other => tracing::error!(
                        action = other.label(),
                        "non-store action reached the credential store machine"
                    ),
                }
            }
            .boxed()
        });
        let machine = StateMachine::spawn(
            "credential_store",
            CredentialStoreResolver,
            CredentialStoreState::NotConfigured,
            runner,
        );
        Self {
            machine: Arc::new(machine),
            op_lock: Arc::new(Mutex::new(())),
        }
    }

    /// First bring-up: migrate the legacy store if needed, then load
    /// whatever is persisted. Also valid from idle (reconfigure).
    pub async fn configure(&self) -> Result<Credentials, StoreError> {
        self.operation(CredentialStoreEvent::Migrate).await
    }

    /// Load persisted credentials; an empty value means nothing stored.
    pub async fn load(&self) -> Result<Credentials, StoreError> {
        self.operation(CredentialStoreEvent::Load).await
    }

    /// Persist a full replacement value.
    pub async fn store(&self, credentials: Credentials) -> Result<(), StoreError> {
        self.operation(CredentialStoreEvent::Store(credentials))
            .await
            .map(|_| ())
    }

    /// Clear persisted credentials (the device id survives).
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.operation(CredentialStoreEvent::Clear).await.map(|_| ())
    }

    #[must_use]
    pub fn state(&self) -> CredentialStoreState {
        self.machine.state()
    }

    pub async fn reset(&self) {
        let _guard = self.op_lock.lock().await;
        self.machine.reset().await;
    }

    async fn operation(&self, event: CredentialStoreEvent) -> Result<Credentials, StoreError> {
        let _guard = self.op_lock.lock().await;

        // The machine starts one operation only from not-configured or
        // idle; anything else means the caller skipped configure().
        let ready = matches!(
            self.machine.state(),
            CredentialStoreState::NotConfigured | CredentialStoreState::Idle
        );
        if !ready {
            return Err(StoreError::access("credential store is not ready"));
        }
        if matches!(self.machine.state(), CredentialStoreState::NotConfigured)
            && !matches!(event, CredentialStoreEvent::Migrate)
        {
            return Err(StoreError::access("credential store is not configured"));
        }

        self.machine.send(Event::CredentialStore(event)).await;
        let settled = self
            .machine
            .wait_for(CredentialStoreState::is_settled)
            .await
            .ok_or_else(|| StoreError::access("credential store machine stopped"))?;
        let result = match settled {
            CredentialStoreState::Success(credentials) => Ok(credentials),
            CredentialStoreState::Error(error) => Err(error),
            _ => Err(StoreError::access("credential store settled abnormally")),
        };

        // Return to idle before releasing the lock so the next caller
        // never observes this operation's terminal state.
        self.machine
            .send(Event::CredentialStore(CredentialStoreEvent::MoveToIdle))
            .await;
        let _ = self
            .machine
            .wait_for(|state| matches!(state, CredentialStoreState::Idle))
            .await;

        result
    }
}

async fn run_action(action: StoreAction, env: &StoreEnvironment, events: &EventSender) {
    use CredentialStoreEvent as E;
    let outcome = match action {
        StoreAction::MigrateLegacyStore => match migrate(env).await {
            Ok(()) => {
                events.send(Event::CredentialStore(E::Load)).await;
                return;
            }
            Err(error) => Err(error),
        },
        StoreAction::LoadCredentials => load(env).await,
        StoreAction::StoreCredentials(credentials) => {
            persist(env, &credentials).await.map(|()| credentials)
        }
        StoreAction::ClearCredentials => clear(env).await.map(|()| Credentials::none()),
    };
    match outcome {
        Ok(credentials) => {
            events
                .send(Event::CredentialStore(E::CompletedOperation(credentials)))
                .await;
        }
        Err(error) => {
            tracing::warn!(error = %error, "credential store operation failed");
            events.send(Event::CredentialStore(E::ThrowError(error))).await;
        }
    }
}

async fn migrate(env: &StoreEnvironment) -> Result<(), StoreError> {
    if env
        .store
        .fetch(KeyKind::LegacyStoreMarker)
        .await?
        .is_some()
    {
        return Ok(());
    }
    if let Some(legacy) = &env.legacy {
        for kind in [
            KeyKind::BearerTokens,
            KeyKind::IdentityPoolCredentials,
            KeyKind::DeviceAsfId,
        ] {
            if let Some(value) = legacy.fetch(kind).await? {
                env.store.store(kind, value).await?;
                legacy.clear(kind).await?;
            }
        }
        tracing::debug!("legacy credential store migrated");
    }
    env.store
        .store(KeyKind::LegacyStoreMarker, "1".to_string())
        .await?;
    Ok(())
}

async fn load(env: &StoreEnvironment) -> Result<Credentials, StoreError> {
    let signed_in = match env.store.fetch(KeyKind::BearerTokens).await? {
        Some(blob) => Some(
            serde_json::from_str::<SignInData>(&blob)
                .map_err(|e| StoreError::decode("bearer_tokens", e.to_string()))?,
        ),
        None => None,
    };
    let bundle = match env.store.fetch(KeyKind::IdentityPoolCredentials).await? {
        Some(blob) => Some(
            serde_json::from_str::<IdentityBundle>(&blob)
                .map_err(|e| StoreError::decode("identity_credentials", e.to_string()))?,
        ),
        None => None,
    };
    let (identity_id, aws) = match bundle {
        Some(bundle) => (bundle.identity_id, Some(bundle.credentials)),
        None => (None, None),
    };
    Ok(Credentials::new(signed_in, identity_id, aws))
}

async fn persist(env: &StoreEnvironment, credentials: &Credentials) -> Result<(), StoreError> {
    match credentials.signed_in_data() {
        Some(data) => {
            let blob = serde_json::to_string(data)
                .map_err(|e| StoreError::access(format!("failed to encode tokens: {e}")))?;
            env.store.store(KeyKind::BearerTokens, blob).await?;
        }
        None => env.store.clear(KeyKind::BearerTokens).await?,
    }
    match credentials.aws_credentials() {
        Some(aws) => {
            let bundle = IdentityBundle {
                identity_id: credentials.identity_id().map(str::to_string),
                credentials: aws.clone(),
            };
            let blob = serde_json::to_string(&bundle)
                .map_err(|e| StoreError::access(format!("failed to encode identity: {e}")))?;
            env.store.store(KeyKind::IdentityPoolCredentials, blob).await?;
        }
        None => env.store.clear(KeyKind::IdentityPoolCredentials).await?,
    }
    Ok(())
}

async fn clear(env: &StoreEnvironment) -> Result<(), StoreError> {
    env.store.clear(KeyKind::BearerTokens).await?;
    env.store.clear(KeyKind::IdentityPoolCredentials).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        CredentialStoreHandle, CredentialStoreResolver, IdentityBundle, StoreEnvironment,
    };
    use crate::machine::{Resolution, Resolver};
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use gatehouse_store::{InMemoryStore, KeyKind, SecretStore};
    use gatehouse_types::{
        Action, AwsCredentials, BearerTokens, CredentialStoreEvent, CredentialStoreState,
        Credentials, Event, SignInData, StoreAction,
    };

    fn sign_in_data() -> SignInData {
        SignInData {
            username: "alice".into(),
            user_id: Some("user-1".into()),
            signed_in_at: Utc::now(),
            tokens: BearerTokens {
                id_token: "id".into(),
                access_token: "access".into(),
                refresh_token: "refresh".into(),
                expires_at: Utc::now() + Duration::hours(1),
            },
        }
    }

    fn resolve(
        state: &CredentialStoreState,
        event: CredentialStoreEvent,
    ) -> Resolution<CredentialStoreState> {
        CredentialStoreResolver.resolve(state, &Event::CredentialStore(event))
    }

    #[test]
    fn idle_operations_always_pass_through_a_busy_state() {
        use CredentialStoreEvent as E;
        use CredentialStoreState as S;

        let resolution = resolve(&S::Idle, E::Load);
        assert_eq!(resolution.new_state, S::LoadingStoredCredentials);
        assert_eq!(
            resolution.actions,
            vec![Action::Store(StoreAction::LoadCredentials)]
        );

        let resolution = resolve(&S::Idle, E::Store(Credentials::none()));
        assert_eq!(resolution.new_state, S::StoringCredentials);

        let resolution = resolve(&S::Idle, E::Clear);
        assert_eq!(resolution.new_state, S::ClearingCredentials);
    }

    #[test]
    fn completion_only_lands_from_a_busy_state() {
        use CredentialStoreEvent as E;
        use CredentialStoreState as S;

        let resolution = resolve(
            &S::LoadingStoredCredentials,
            E::CompletedOperation(Credentials::none()),
        );
        assert_eq!(resolution.new_state, S::Success(Credentials::none()));

        // A stray completion in idle is a no-op, not a transition.
        let resolution = resolve(&S::Idle, E::CompletedOperation(Credentials::none()));
        assert_eq!(resolution.new_state, S::Idle);
        assert!(resolution.actions.is_empty());
    }

    #[test]
    fn settled_states_move_to_idle() {
        use CredentialStoreEvent as E;
        use CredentialStoreState as S;
        let resolution = resolve(&S::Success(Credentials::none()), E::MoveToIdle);
        assert_eq!(resolution.new_state, S::Idle);
    }

    #[tokio::test]
    async fn configure_load_store_clear_round_trip() {
        let store = Arc::new(InMemoryStore::new());
        let handle = CredentialStoreHandle::spawn(StoreEnvironment::new(store));

        let loaded = handle.configure().await.unwrap();
        assert!(loaded.is_empty());

        let credentials = Credentials::from_user_pool(sign_in_data());
        handle.store(credentials.clone()).await.unwrap();
        assert_eq!(handle.load().await.unwrap(), credentials);

        handle.clear().await.unwrap();
        assert!(handle.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn operations_before_configure_are_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let handle = CredentialStoreHandle::spawn(StoreEnvironment::new(store));
        assert!(handle.load().await.is_err());
    }

    #[tokio::test]
    async fn legacy_store_migrates_once() {
        let live = Arc::new(InMemoryStore::new());
        let legacy = Arc::new(InMemoryStore::new());
        let blob = serde_json::to_string(&sign_in_data()).unwrap();
        legacy.seed(KeyKind::BearerTokens, blob);

        let handle = CredentialStoreHandle::spawn(
            StoreEnvironment::new(Arc::clone(&live) as Arc<dyn SecretStore>)
                .with_legacy(Arc::clone(&legacy) as Arc<dyn SecretStore>),
        );

        let loaded = handle.configure().await.unwrap();
        assert_eq!(loaded.signed_in_data().unwrap().username, "alice");

        // Moved, not copied.
        assert!(legacy.fetch(KeyKind::BearerTokens).await.unwrap().is_none());
        assert!(
            live.fetch(KeyKind::LegacyStoreMarker)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn stored_identity_bundle_round_trips() {
        let store = Arc::new(InMemoryStore::new());
        let handle = CredentialStoreHandle::spawn(StoreEnvironment::new(store));
        handle.configure().await.unwrap();

        let aws = AwsCredentials {
            access_key_id: "AKIA".into(),
            secret_access_key: "secret".into(),
            session_token: "session".into(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        let credentials = Credentials::new(None, Some("identity-1".into()), Some(aws));
        handle.store(credentials.clone()).await.unwrap();

        let loaded = handle.load().await.unwrap();
        assert_eq!(loaded.identity_id(), Some("identity-1"));
        assert_eq!(loaded, credentials);
    }

    #[test]
    fn identity_bundle_shape_is_stable() {
        let bundle = IdentityBundle {
            identity_id: Some("identity-1".into()),
            credentials: AwsCredentials {
                access_key_id: "AKIA".into(),
                secret_access_key: "secret".into(),
                session_token: "session".into(),
                expires_at: Utc::now(),
            },
        };
        let json = serde_json::to_string(&bundle).unwrap();
        assert!(json.contains("\"identity_id\""));
        assert!(json.contains("\"credentials\""));
    }
}
