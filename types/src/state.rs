//! The state trees for every machine.
//!
//! States form a tree of sum types: each composite variant owns the nested
//! machine state that is only meaningful while that variant is active.
//! Exactly one value exists per machine at any instant; transitions happen
//! only through the dispatcher -> resolver pipeline.

use crate::challenge::{ChallengeData, ChallengeKind, TotpSetupData};
use crate::credentials::{AwsCredentials, Credentials, SignInData};
use crate::error::{AuthError, StoreError};

/// Top-level composite state.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    NotConfigured,
    /// Credential store migration/load in progress.
    Configuring,
    /// Authentication sub-machine being configured.
    ConfiguringAuthN(AuthenticationState),
    /// Authentication done (or skipped), authorization being configured.
    ConfiguringAuthZ(AuthenticationState, AuthorizationState),
    Configured(AuthenticationState, AuthorizationState),
    /// Terminal until an explicit reconfigure.
    Error(AuthError),
}

impl AuthState {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::Configuring => "configuring",
            Self::ConfiguringAuthN(_) => "configuring_authentication",
            Self::ConfiguringAuthZ(..) => "configuring_authorization",
            Self::Configured(..) => "configured",
            Self::Error(_) => "error",
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured(..))
    }

    /// The active authentication sub-state, in whichever composite variant
    /// owns one.
    #[must_use]
    pub fn authentication(&self) -> Option<&AuthenticationState> {
        match self {
            Self::ConfiguringAuthN(authn)
            | Self::ConfiguringAuthZ(authn, _)
            | Self::Configured(authn, _) => Some(authn),
            Self::NotConfigured | Self::Configuring | Self::Error(_) => None,
        }
    }

    #[must_use]
    pub fn authorization(&self) -> Option<&AuthorizationState> {
        match self {
            Self::ConfiguringAuthZ(_, authz) | Self::Configured(_, authz) => Some(authz),
            Self::NotConfigured
            | Self::Configuring
            | Self::ConfiguringAuthN(_)
            | Self::Error(_) => None,
        }
    }
}

/// Authentication: is anyone signed in, and which flow is in progress.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthenticationState {
    NotConfigured,
    SigningIn(SignInState),
    SignedIn(SignInData),
    SigningOut(SignOutState),
    SignedOut,
    Error(AuthError),
}

impl AuthenticationState {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::SigningIn(_) => "signing_in",
            Self::SignedIn(_) => "signed_in",
            Self::SigningOut(_) => "signing_out",
            Self::SignedOut => "signed_out",
            Self::Error(_) => "error",
        }
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn(_))
    }
}

/// Where an SRP exchange currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrpStage {
    /// Client key pair generated, initiate request in flight.
    Initiating,
    /// Password claim computed, verifier response in flight.
    RespondingToVerifier,
}

/// Context preserved by a sign-in error so a corrected answer can resume
/// without restarting the exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum SignInResumeContext {
    Challenge(ChallengeData),
    TotpSetup(TotpSetupData),
}

/// A failed sign-in step plus whatever context allows a cheap retry.
#[derive(Debug, Clone, PartialEq)]
pub struct SignInError {
    pub error: AuthError,
    pub resume: Option<SignInResumeContext>,
}

/// One mutually-exclusive sign-in exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum SignInState {
    NotStarted,
    /// A custom-auth flow has been initiated; waiting for the first
    /// server-issued challenge.
    ResolvingChallenge(ChallengeKind),
    /// Holding the minimum data needed to resume once the user answers.
    AwaitingChallengeAnswer(ChallengeData),
    VerifyingChallenge,
    SigningInWithSrp(SrpStage),
    SigningInWithMigration,
    SettingUpTotp(TotpSetupState),
    Done,
    Error(SignInError),
}

impl SignInState {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::ResolvingChallenge(_) => "resolving_challenge",
            Self::AwaitingChallengeAnswer(_) => "awaiting_challenge_answer",
            Self::VerifyingChallenge => "verifying_challenge",
            Self::SigningInWithSrp(_) => "signing_in_with_srp",
            Self::SigningInWithMigration => "signing_in_with_migration",
            Self::SettingUpTotp(_) => "setting_up_totp",
            Self::Done => "done",
            Self::Error(_) => "error",
        }
    }

    /// States from which a server response is still expected.
    #[must_use]
    pub fn awaits_server(&self) -> bool {
        matches!(
            self,
            Self::ResolvingChallenge(_)
                | Self::VerifyingChallenge
                | Self::SigningInWithSrp(_)
                | Self::SigningInWithMigration
        )
    }
}

/// TOTP/MFA setup chain. Errors keep the prior setup data so a corrected
/// code re-enters verification without a new shared secret.
#[derive(Debug, Clone, PartialEq)]
pub enum TotpSetupState {
    SettingUp,
    WaitingForAnswer(TotpSetupData),
    Verifying(TotpSetupData),
    RespondingToAuthChallenge(TotpSetupData),
    Error {
        error: AuthError,
        data: Option<TotpSetupData>,
    },
}

/// Sign-out chain. Remote steps are best-effort: a failed global sign-out
/// or token revocation still clears local credentials.
#[derive(Debug, Clone, PartialEq)]
pub enum SignOutState {
    NotStarted,
    SigningOutGlobally,
    RevokingToken,
    ClearingLocalCredentials,
    SignedOut,
    Error(AuthError),
}

/// Authorization: session fetch/refresh over the identity pool.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizationState {
    NotConfigured,
    Configured,
    FetchingSession(FetchSessionState),
    RefreshingSession(RefreshSessionState),
    SessionEstablished(Credentials),
    Error(AuthError),
}

impl AuthorizationState {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::Configured => "configured",
            Self::FetchingSession(_) => "fetching_session",
            Self::RefreshingSession(_) => "refreshing_session",
            Self::SessionEstablished(_) => "session_established",
            Self::Error(_) => "error",
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&Credentials> {
        match self {
            Self::SessionEstablished(credentials) => Some(credentials),
            _ => None,
        }
    }
}

/// The generic "get identity id, then get credentials for it" exchange,
/// nested by both the cold-start fetch and the refresh path.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchSessionState {
    NotStarted,
    FetchingIdentityId,
    FetchingAwsCredentials,
    Fetched {
        identity_id: String,
        credentials: AwsCredentials,
    },
}

/// Session refresh. Intermediate variants carry the data the next step
/// needs so the final credentials can be assembled without consulting any
/// other machine.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshSessionState {
    NotStarted,
    RefreshingUserPoolToken(SignInData),
    RefreshingUnAuthCredentials,
    RefreshingCredentialsWithUserPool(SignInData),
    FetchingAuthSessionWithUserPool(SignInData, FetchSessionState),
    Refreshed(Credentials),
}

/// The credential-store machine: every read/write of the secret store
/// funnels through these states so a store-then-load race cannot return
/// stale data.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialStoreState {
    NotConfigured,
    MigratingLegacyStore,
    LoadingStoredCredentials,
    StoringCredentials,
    ClearingCredentials,
    Idle,
    Success(Credentials),
    Error(StoreError),
}

impl CredentialStoreState {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::MigratingLegacyStore => "migrating_legacy_store",
            Self::LoadingStoredCredentials => "loading_stored_credentials",
            Self::StoringCredentials => "storing_credentials",
            Self::ClearingCredentials => "clearing_credentials",
            Self::Idle => "idle",
            Self::Success(_) => "success",
            Self::Error(_) => "error",
        }
    }

    /// Terminal for one operation: the handle reads the result here before
    /// moving the machine back to idle.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Error(_))
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::MigratingLegacyStore
                | Self::LoadingStoredCredentials
                | Self::StoringCredentials
                | Self::ClearingCredentials
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AuthState, AuthenticationState, AuthorizationState, CredentialStoreState, SignInState,
        SrpStage,
    };

    #[test]
    fn nested_accessors_follow_the_owning_variant() {
        let state = AuthState::Configured(
            AuthenticationState::SignedOut,
            AuthorizationState::Configured,
        );
        assert!(state.authentication().is_some());
        assert!(state.authorization().is_some());

        let configuring = AuthState::Configuring;
        assert!(configuring.authentication().is_none());
        assert!(configuring.authorization().is_none());
    }

    #[test]
    fn authn_only_visible_while_configuring_authn() {
        let state = AuthState::ConfiguringAuthN(AuthenticationState::NotConfigured);
        assert!(state.authentication().is_some());
        assert!(state.authorization().is_none());
    }

    #[test]
    fn store_busy_and_settled_are_disjoint() {
        for state in [
            CredentialStoreState::MigratingLegacyStore,
            CredentialStoreState::LoadingStoredCredentials,
            CredentialStoreState::StoringCredentials,
            CredentialStoreState::ClearingCredentials,
        ] {
            assert!(state.is_busy());
            assert!(!state.is_settled());
        }
        assert!(!CredentialStoreState::Idle.is_busy());
    }

    #[test]
    fn srp_states_await_the_server() {
        assert!(SignInState::SigningInWithSrp(SrpStage::Initiating).awaits_server());
        assert!(!SignInState::Done.awaits_server());
        assert!(!SignInState::NotStarted.awaits_server());
    }
}
