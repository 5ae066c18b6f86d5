//! The action vocabulary.
//!
//! An action is a named unit of asynchronous work holding only the inputs
//! needed to run it - never a state reference. Execution lives in the
//! engine crate; on completion an action constructs and emits the events
//! that represent its outcome, and nothing else.

use chrono::{DateTime, Utc};

use crate::SecretString;
use crate::challenge::{ChallengeData, SrpChallenge, SrpKeyPair, TotpSetupData};
use crate::config::AuthConfig;
use crate::credentials::{Credentials, LoginsMap, SignInData};
use crate::event::SignInMechanism;

/// All actions, grouped by the machine that schedules them.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Configure(ConfigureAction),
    SignIn(SignInAction),
    SignOut(SignOutAction),
    Session(SessionAction),
    Store(StoreAction),
}

impl Action {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Configure(action) => action.label(),
            Self::SignIn(action) => action.label(),
            Self::SignOut(action) => action.label(),
            Self::Session(action) => action.label(),
            Self::Store(action) => action.label(),
        }
    }
}

/// Configuration chain: store bring-up, then authentication, then
/// authorization.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigureAction {
    ConfigureCredentialStore {
        config: AuthConfig,
    },
    ConfigureAuthentication {
        config: AuthConfig,
        credentials: Credentials,
    },
    ConfigureAuthorization {
        config: AuthConfig,
        credentials: Credentials,
    },
}

impl ConfigureAction {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::ConfigureCredentialStore { .. } => "configure_credential_store",
            Self::ConfigureAuthentication { .. } => "configure_authentication",
            Self::ConfigureAuthorization { .. } => "configure_authorization",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignInAction {
    /// Translate a requested mechanism into its initiating event.
    Begin(SignInMechanism),
    InitiateSrpAuth {
        username: String,
        password: SecretString,
    },
    VerifyPasswordSrp {
        challenge: SrpChallenge,
        password: SecretString,
        key_pair: SrpKeyPair,
    },
    InitiateMigrationAuth {
        username: String,
        password: SecretString,
        session: Option<String>,
    },
    InitiateCustomAuth {
        username: String,
    },
    VerifyChallengeAnswer {
        data: ChallengeData,
        answer: String,
    },
    AssociateSoftwareToken {
        username: String,
        session: Option<String>,
    },
    VerifySoftwareToken {
        data: TotpSetupData,
        code: String,
    },
    RespondToTotpChallenge {
        username: String,
        session: Option<String>,
    },
}

impl SignInAction {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Begin(_) => "begin_sign_in",
            Self::InitiateSrpAuth { .. } => "initiate_srp_auth",
            Self::VerifyPasswordSrp { .. } => "verify_password_srp",
            Self::InitiateMigrationAuth { .. } => "initiate_migration_auth",
            Self::InitiateCustomAuth { .. } => "initiate_custom_auth",
            Self::VerifyChallengeAnswer { .. } => "verify_challenge_answer",
            Self::AssociateSoftwareToken { .. } => "associate_software_token",
            Self::VerifySoftwareToken { .. } => "verify_software_token",
            Self::RespondToTotpChallenge { .. } => "respond_to_totp_challenge",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignOutAction {
    Begin { global: bool, data: SignInData },
    GlobalSignOut { data: SignInData },
    RevokeToken { data: SignInData },
    ClearLocalCredentials,
}

impl SignOutAction {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Begin { .. } => "begin_sign_out",
            Self::GlobalSignOut { .. } => "global_sign_out",
            Self::RevokeToken { .. } => "revoke_token",
            Self::ClearLocalCredentials => "clear_local_credentials",
        }
    }
}

/// Session fetch/refresh work.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Build the logins map from configuration and current tokens, then
    /// kick off the identity exchange.
    BeginFetch {
        signed_in: Option<SignInData>,
        identity_id: Option<String>,
    },
    FetchIdentityId {
        logins: LoginsMap,
    },
    FetchAwsCredentials {
        identity_id: String,
        logins: LoginsMap,
    },
    BeginRefresh {
        credentials: Credentials,
        requested_at: DateTime<Utc>,
        force: bool,
    },
    RefreshUserPoolTokens {
        data: SignInData,
        identity_id: Option<String>,
    },
    RefreshAwsCredentials {
        identity_id: Option<String>,
        signed_in: Option<SignInData>,
    },
    StoreCredentials(Credentials),
}

impl SessionAction {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::BeginFetch { .. } => "begin_fetch_session",
            Self::FetchIdentityId { .. } => "fetch_identity_id",
            Self::FetchAwsCredentials { .. } => "fetch_aws_credentials",
            Self::BeginRefresh { .. } => "begin_refresh_session",
            Self::RefreshUserPoolTokens { .. } => "refresh_user_pool_tokens",
            Self::RefreshAwsCredentials { .. } => "refresh_aws_credentials",
            Self::StoreCredentials(_) => "store_credentials",
        }
    }
}

/// Actions of the credential-store machine itself: the only code path that
/// touches the secret store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreAction {
    MigrateLegacyStore,
    LoadCredentials,
    StoreCredentials(Credentials),
    ClearCredentials,
}

impl StoreAction {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::MigrateLegacyStore => "migrate_legacy_store",
            Self::LoadCredentials => "load_credentials",
            Self::StoreCredentials(_) => "store_credentials",
            Self::ClearCredentials => "clear_credentials",
        }
    }
}
