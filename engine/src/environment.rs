//! The environment actions execute against.
//!
//! Gathered once at engine construction and shared by reference with every
//! spawned action. Client factories are stateless and safely shared across
//! concurrent actions; the secret store is reachable only through the
//! credential-store handle, never directly.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use gatehouse_provider::{IdentityPoolClient, UserPoolClient};
use gatehouse_types::{AuthConfig, AuthError};

use crate::credential_store::CredentialStoreHandle;
use crate::srp::SrpSuite;

/// Clock access for actions. Resolvers never read this - timestamps reach
/// them only inside events.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Dependencies for the auth machine's actions.
pub struct AuthEnvironment {
    config: AuthConfig,
    user_pool: Option<Arc<dyn UserPoolClient>>,
    identity_pool: Option<Arc<dyn IdentityPoolClient>>,
    srp: Arc<dyn SrpSuite>,
    clock: Arc<dyn Clock>,
    credential_store: CredentialStoreHandle,
}

impl AuthEnvironment {
    pub fn new(
        config: AuthConfig,
        user_pool: Option<Arc<dyn UserPoolClient>>,
        identity_pool: Option<Arc<dyn IdentityPoolClient>>,
        srp: Arc<dyn SrpSuite>,
        credential_store: CredentialStoreHandle,
    ) -> Self {
        Self {
            config,
            user_pool,
            identity_pool,
            srp,
            clock: Arc::new(SystemClock),
            credential_store,
        }
    }

    /// Substitute the clock (tests pin time with this).
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn user_pool(&self) -> Result<Arc<dyn UserPoolClient>, AuthError> {
        self.user_pool
            .clone()
            .ok_or_else(|| AuthError::configuration("no user pool client available"))
    }

    pub fn identity_pool(&self) -> Result<Arc<dyn IdentityPoolClient>, AuthError> {
        self.identity_pool
            .clone()
            .ok_or_else(|| AuthError::configuration("no identity pool client available"))
    }

    #[must_use]
    pub fn srp(&self) -> &dyn SrpSuite {
        self.srp.as_ref()
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[must_use]
    pub(crate) fn clock_handle(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    #[must_use]
    pub fn credential_store(&self) -> &CredentialStoreHandle {
        &self.credential_store
    }
}
