//! Core domain types for Gatehouse.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies: the state trees for every machine, the event and action
//! vocabulary that connects them, credentials, and the error taxonomy.
//! Everything here can be used from any layer of the stack.
//!
//! Resolvers consume these types and produce new ones; they never perform
//! effects. The async half of the system lives in `gatehouse-engine`.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod action;
mod challenge;
mod config;
mod credentials;
mod error;
mod event;
mod state;

pub use action::{
    Action, ConfigureAction, SessionAction, SignInAction, SignOutAction, StoreAction,
};
pub use challenge::{ChallengeData, ChallengeKind, SrpChallenge, SrpKeyPair, TotpSetupData};
pub use config::{AuthConfig, IdentityPoolConfig, UserPoolConfig};
pub use credentials::{
    AwsCredentials, BearerTokens, Credentials, LoginsMap, REFRESH_LEAD_TIME_SECS, SignInData,
};
pub use error::{AuthError, ConfigError, StoreError};
pub use event::{
    AuthEvent, AuthenticationEvent, AuthorizationEvent, CredentialStoreEvent, Event,
    FetchSessionEvent, RefreshContinuation, RefreshEvent, SignInEvent, SignInMechanism,
    SignOutEvent,
};
pub use state::{
    AuthState, AuthenticationState, AuthorizationState, CredentialStoreState, FetchSessionState,
    RefreshSessionState, SignInError, SignInResumeContext, SignInState, SignOutState, SrpStage,
    TotpSetupState,
};

use std::fmt;

use serde::{Deserialize, Serialize};

/// A string whose value must not appear in logs or debug output.
///
/// Passwords, refresh tokens, and secret keys travel inside events and
/// states that are freely `Debug`-formatted by tracing; wrapping them here
/// makes accidental exposure impossible. The value is only reachable through
/// [`SecretString::expose_secret`], which marks the boundary where the
/// secret leaves the process.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Deliberately exposes the secret at the boundary where it is consumed.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
