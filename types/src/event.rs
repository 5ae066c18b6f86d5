//! The event vocabulary.
//!
//! Every event belongs to exactly one machine's namespace; a resolver
//! returns an unchanged state with no actions for events outside its own.
//! Events are immutable values carrying everything the transition needs -
//! resolvers read no other input.

use chrono::{DateTime, Utc};

use crate::SecretString;
use crate::challenge::{ChallengeData, SrpChallenge, SrpKeyPair, TotpSetupData};
use crate::config::AuthConfig;
use crate::credentials::{AwsCredentials, Credentials, LoginsMap, SignInData};
use crate::error::{AuthError, StoreError};
use crate::state::SignInResumeContext;

/// All events, tagged by the machine namespace they belong to.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Auth(AuthEvent),
    Authentication(AuthenticationEvent),
    SignIn(SignInEvent),
    SignOut(SignOutEvent),
    Authorization(AuthorizationEvent),
    FetchSession(FetchSessionEvent),
    Refresh(RefreshEvent),
    CredentialStore(CredentialStoreEvent),
}

impl Event {
    #[must_use]
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Authentication(_) => "authentication",
            Self::SignIn(_) => "sign_in",
            Self::SignOut(_) => "sign_out",
            Self::Authorization(_) => "authorization",
            Self::FetchSession(_) => "fetch_session",
            Self::Refresh(_) => "refresh",
            Self::CredentialStore(_) => "credential_store",
        }
    }
}

/// Top-level configuration lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    Configure(AuthConfig),
    /// Credential store migrated and loaded; carries the configuration
    /// forward so the fan-out needs no other input.
    CachedCredentialsLoaded {
        config: AuthConfig,
        credentials: Credentials,
    },
    AuthenticationConfigured {
        config: AuthConfig,
        credentials: Credentials,
    },
    AuthorizationConfigured,
    ThrowError(AuthError),
}

/// How a sign-in should be performed.
#[derive(Debug, Clone, PartialEq)]
pub enum SignInMechanism {
    Srp {
        username: String,
        password: SecretString,
    },
    Migration {
        username: String,
        password: SecretString,
    },
    Custom {
        username: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthenticationEvent {
    /// Initial status resolved from cached credentials at configure time.
    Configured { signed_in: Option<SignInData> },
    SignInRequested(SignInMechanism),
    SignInCompleted(SignInData),
    CancelSignIn,
    SignOutRequested { global: bool },
    SignOutCompleted,
    ThrowError(AuthError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignInEvent {
    InitiateSrp {
        username: String,
        password: SecretString,
    },
    InitiateMigration {
        username: String,
        password: SecretString,
    },
    InitiateCustom {
        username: String,
    },
    /// The server's SRP half arrived; the password and client key pair ride
    /// along so the verifier step is self-contained.
    RespondPasswordVerifier {
        challenge: SrpChallenge,
        password: SecretString,
        key_pair: SrpKeyPair,
    },
    ReceivedChallenge(ChallengeData),
    VerifyChallengeAnswer {
        answer: String,
    },
    InitiateTotpSetup {
        username: String,
        session: Option<String>,
    },
    TotpSecretIssued(TotpSetupData),
    TotpCodeVerified {
        username: String,
        session: Option<String>,
    },
    FinalizeSignIn(SignInData),
    /// Failure, with whatever context permits a cheap retry.
    ThrowError {
        error: AuthError,
        resume: Option<SignInResumeContext>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignOutEvent {
    Initiate { global: bool, data: SignInData },
    GlobalSignOutCompleted { data: SignInData },
    TokenRevokeCompleted,
    LocalCredentialsCleared,
    ThrowError(AuthError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizationEvent {
    /// Authorization configured; non-empty cached credentials seed the
    /// session so a cold fetch is not forced on every start.
    Configured { cached: Option<Credentials> },
    /// A session was asked for. The timestamp is stamped at the command
    /// boundary; resolvers never read the clock themselves.
    RequestSession {
        requested_at: DateTime<Utc>,
        force_refresh: bool,
    },
    ThrowError(AuthError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchSessionEvent {
    /// Start the exchange. A known identity id skips the get-id step.
    FetchIdentity {
        logins: LoginsMap,
        identity_id: Option<String>,
    },
    IdentityIdFetched {
        identity_id: String,
        logins: LoginsMap,
    },
    AwsCredentialsFetched {
        identity_id: String,
        credentials: AwsCredentials,
    },
}

/// What follows a successful user-pool token refresh, decided by the action
/// from the configuration so the resolver stays pure.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshContinuation {
    /// No identity pool: the refreshed tokens are the whole session.
    Complete,
    /// Identity pool configured: continue into a session fetch.
    FetchSession { identity_id: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshEvent {
    Refresh {
        credentials: Credentials,
        requested_at: DateTime<Utc>,
        force: bool,
    },
    UserPoolTokenRefreshed {
        data: SignInData,
        continuation: RefreshContinuation,
    },
    AwsCredentialsRefreshed {
        identity_id: String,
        credentials: AwsCredentials,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CredentialStoreEvent {
    Migrate,
    Load,
    Store(Credentials),
    Clear,
    CompletedOperation(Credentials),
    ThrowError(StoreError),
    MoveToIdle,
}
