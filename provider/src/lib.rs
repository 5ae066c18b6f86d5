//! Identity provider RPC boundary.
//!
//! # Architecture
//!
//! The engine depends on two client traits and their typed request/response
//! shapes, nothing more:
//!
//! - [`UserPoolClient`] - the user directory: initiate auth, respond to
//!   challenges, sign up, sign out, token revocation, TOTP enrollment.
//! - [`IdentityPoolClient`] - the identity pool: exchange a verified (or
//!   anonymous) identity for scoped cloud credentials.
//!
//! Concrete transports implement these traits outside this workspace; the
//! engine's tests script them directly. Clients must be stateless and safe
//! to share across concurrent tasks.
//!
//! # Errors
//!
//! Every RPC resolves to a typed success payload or a [`ProviderError`].
//! Transport-level timeouts are applied by the caller (each engine action
//! owns its own deadline) and surface as [`ProviderError::Timeout`].

mod error;
mod types;

pub use error::ProviderError;
pub use types::{
    AssociateSoftwareTokenRequest, AssociateSoftwareTokenResponse, AuthFlow,
    AuthenticationResult, ChallengeName, ChallengeResponse, ConfirmSignUpRequest,
    GetCredentialsForIdentityRequest, GetCredentialsForIdentityResponse, GetIdRequest,
    GetIdResponse, InitiateAuthRequest, RespondToChallengeRequest, RevokeTokenRequest,
    SignUpRequest, SignUpResponse, VerifySoftwareTokenRequest, VerifySoftwareTokenResponse,
    params,
};

use async_trait::async_trait;

/// The user directory RPC surface.
#[async_trait]
pub trait UserPoolClient: Send + Sync {
    async fn initiate_auth(
        &self,
        request: InitiateAuthRequest,
    ) -> Result<ChallengeResponse, ProviderError>;

    async fn respond_to_auth_challenge(
        &self,
        request: RespondToChallengeRequest,
    ) -> Result<ChallengeResponse, ProviderError>;

    async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpResponse, ProviderError>;

    async fn confirm_sign_up(&self, request: ConfirmSignUpRequest) -> Result<(), ProviderError>;

    async fn associate_software_token(
        &self,
        request: AssociateSoftwareTokenRequest,
    ) -> Result<AssociateSoftwareTokenResponse, ProviderError>;

    async fn verify_software_token(
        &self,
        request: VerifySoftwareTokenRequest,
    ) -> Result<VerifySoftwareTokenResponse, ProviderError>;

    async fn global_sign_out(&self, access_token: &str) -> Result<(), ProviderError>;

    async fn revoke_token(&self, request: RevokeTokenRequest) -> Result<(), ProviderError>;
}

/// The identity pool RPC surface.
#[async_trait]
pub trait IdentityPoolClient: Send + Sync {
    async fn get_id(&self, request: GetIdRequest) -> Result<GetIdResponse, ProviderError>;

    async fn get_credentials_for_identity(
        &self,
        request: GetCredentialsForIdentityRequest,
    ) -> Result<GetCredentialsForIdentityResponse, ProviderError>;
}
