//! Challenge vocabulary: the intermediate steps a sign-in exchange can ask
//! the client to complete, and the SRP data that flows through the password
//! verifier round-trip.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::SecretString;

/// The kinds of challenge the server can issue mid sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeKind {
    SmsMfa,
    SoftwareTokenMfa,
    NewPasswordRequired,
    Custom,
    MfaSetup,
}

impl ChallengeKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::SmsMfa => "sms-mfa",
            Self::SoftwareTokenMfa => "software-token-mfa",
            Self::NewPasswordRequired => "new-password-required",
            Self::Custom => "custom",
            Self::MfaSetup => "mfa-setup",
        }
    }
}

/// Everything needed to resume a pending challenge: the server-issued
/// session token (carried forward verbatim - losing it forces a full
/// restart), the challenge kind, and whatever parameters the server
/// attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeData {
    pub kind: ChallengeKind,
    pub username: String,
    pub session: Option<String>,
    pub parameters: HashMap<String, String>,
}

/// TOTP setup context: the shared secret to present to the user and the
/// session under which the setup is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotpSetupData {
    pub username: String,
    pub session: Option<String>,
    pub secret_code: String,
}

/// The server half of an SRP exchange, returned by the initiate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrpChallenge {
    pub username: String,
    pub user_id_for_srp: String,
    pub salt: String,
    pub server_public_key: String,
    pub secret_block: String,
    pub session: Option<String>,
}

/// Client ephemeral SRP key pair, produced by the supplied SRP suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrpKeyPair {
    pub private_key: SecretString,
    pub public_key: String,
}
