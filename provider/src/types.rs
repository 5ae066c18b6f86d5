//! Request/response shapes for both RPC surfaces.
//!
//! These mirror the wire names of the upstream service closely enough that
//! a transport can map them mechanically, while staying plain data the
//! engine can construct from validated input.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use gatehouse_types::{AwsCredentials, SecretString};

/// Well-known parameter and response keys used across auth flows.
pub mod params {
    pub const USERNAME: &str = "USERNAME";
    pub const PASSWORD: &str = "PASSWORD";
    pub const SRP_A: &str = "SRP_A";
    pub const SRP_B: &str = "SRP_B";
    pub const SALT: &str = "SALT";
    pub const SECRET_BLOCK: &str = "SECRET_BLOCK";
    pub const USER_ID_FOR_SRP: &str = "USER_ID_FOR_SRP";
    pub const PASSWORD_CLAIM_SECRET_BLOCK: &str = "PASSWORD_CLAIM_SECRET_BLOCK";
    pub const PASSWORD_CLAIM_SIGNATURE: &str = "PASSWORD_CLAIM_SIGNATURE";
    pub const TIMESTAMP: &str = "TIMESTAMP";
    pub const REFRESH_TOKEN: &str = "REFRESH_TOKEN";
    pub const SMS_MFA_CODE: &str = "SMS_MFA_CODE";
    pub const SOFTWARE_TOKEN_MFA_CODE: &str = "SOFTWARE_TOKEN_MFA_CODE";
    pub const NEW_PASSWORD: &str = "NEW_PASSWORD";
    pub const ANSWER: &str = "ANSWER";
}

/// Auth flows accepted by the initiate call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthFlow {
    UserSrpAuth,
    UserPasswordAuth,
    RefreshTokenAuth,
    CustomAuth,
}

/// Challenge names the server can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeName {
    PasswordVerifier,
    SmsMfa,
    SoftwareTokenMfa,
    NewPasswordRequired,
    CustomChallenge,
    MfaSetup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitiateAuthRequest {
    pub client_id: String,
    pub flow: AuthFlow,
    pub parameters: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RespondToChallengeRequest {
    pub client_id: String,
    pub challenge: ChallengeName,
    pub session: Option<String>,
    pub responses: HashMap<String, String>,
}

/// Tokens returned when an exchange completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationResult {
    pub id_token: String,
    pub access_token: String,
    /// Absent on refresh responses; the caller keeps the old one.
    pub refresh_token: Option<SecretString>,
    pub expires_in_secs: i64,
}

/// Outcome of initiate-auth or respond-to-challenge: either tokens, or a
/// further challenge with its session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub challenge: Option<ChallengeName>,
    pub session: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    pub result: Option<AuthenticationResult>,
}

impl ChallengeResponse {
    /// A completed exchange: tokens present, no follow-up challenge.
    #[must_use]
    pub fn completed(result: AuthenticationResult) -> Self {
        Self {
            challenge: None,
            session: None,
            parameters: HashMap::new(),
            result: Some(result),
        }
    }

    /// A further challenge.
    #[must_use]
    pub fn challenged(
        challenge: ChallengeName,
        session: Option<String>,
        parameters: HashMap<String, String>,
    ) -> Self {
        Self {
            challenge: Some(challenge),
            session,
            parameters,
            result: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub client_id: String,
    pub username: String,
    pub password: SecretString,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignUpResponse {
    pub user_confirmed: bool,
    pub user_sub: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmSignUpRequest {
    pub client_id: String,
    pub username: String,
    pub confirmation_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociateSoftwareTokenRequest {
    pub session: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociateSoftwareTokenResponse {
    /// Shared secret the user loads into their authenticator.
    pub secret_code: String,
    pub session: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifySoftwareTokenRequest {
    pub session: Option<String>,
    pub user_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifySoftwareTokenResponse {
    pub session: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevokeTokenRequest {
    pub client_id: String,
    pub refresh_token: SecretString,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetIdRequest {
    pub identity_pool_id: String,
    #[serde(default)]
    pub logins: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetIdResponse {
    pub identity_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetCredentialsForIdentityRequest {
    pub identity_id: String,
    #[serde(default)]
    pub logins: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetCredentialsForIdentityResponse {
    pub identity_id: String,
    pub credentials: AwsCredentials,
}
