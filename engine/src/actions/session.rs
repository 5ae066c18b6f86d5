//! Session actions: the identity exchange, token refresh, and credential
//! persistence.
//!
//! Fetch and refresh failures bubble to the authorization machine as
//! `ThrowError` - neither nested machine has an error state of its own. A
//! persistence failure after an established session is logged but not
//! surfaced: the session in memory is valid regardless.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;

use gatehouse_provider::{
    AuthFlow, GetCredentialsForIdentityRequest, GetIdRequest, IdentityPoolClient,
    InitiateAuthRequest, params,
};
use gatehouse_types::{
    AuthError, AuthorizationEvent, BearerTokens, Event, FetchSessionEvent, IdentityPoolConfig,
    LoginsMap, RefreshContinuation, RefreshEvent, SessionAction, SignInData,
};

use crate::actions::with_timeout;
use crate::environment::AuthEnvironment;
use crate::machine::EventSender;

pub(crate) async fn run(action: SessionAction, env: &AuthEnvironment, events: &EventSender) {
    match action {
        SessionAction::BeginFetch {
            signed_in,
            identity_id,
        } => {
            let logins = logins_map(env, signed_in.as_ref());
            events
                .send(Event::FetchSession(FetchSessionEvent::FetchIdentity {
                    logins,
                    identity_id,
                }))
                .await;
        }
        SessionAction::FetchIdentityId { logins } => fetch_identity_id(logins, env, events).await,
        SessionAction::FetchAwsCredentials {
            identity_id,
            logins,
        } => fetch_aws_credentials(identity_id, logins, env, events).await,
        SessionAction::BeginRefresh {
            credentials,
            requested_at,
            force,
        } => {
            events
                .send(Event::Refresh(RefreshEvent::Refresh {
                    credentials,
                    requested_at,
                    force,
                }))
                .await;
        }
        SessionAction::RefreshUserPoolTokens { data, identity_id } => {
            refresh_user_pool_tokens(data, identity_id, env, events).await;
        }
        SessionAction::RefreshAwsCredentials {
            identity_id,
            signed_in,
        } => refresh_aws_credentials(identity_id, signed_in, env, events).await,
        SessionAction::StoreCredentials(credentials) => {
            if let Err(error) = env.credential_store().store(credentials).await {
                tracing::warn!(error = %error, "failed to persist session credentials");
            }
        }
    }
}

async fn fail(events: &EventSender, error: AuthError) {
    events
        .send(Event::Authorization(AuthorizationEvent::ThrowError(error)))
        .await;
}

/// Logins map for the identity pool: the user pool's provider name mapped
/// to the current id token, or empty for unauthenticated access.
fn logins_map(env: &AuthEnvironment, signed_in: Option<&SignInData>) -> LoginsMap {
    let mut logins = LoginsMap::new();
    if let (Some(pool), Some(data)) = (env.config().user_pool(), signed_in) {
        logins.insert(pool.identity_provider_name(), data.tokens.id_token.clone());
    }
    logins
}

fn identity_pool(
    env: &AuthEnvironment,
) -> Result<(IdentityPoolConfig, Arc<dyn IdentityPoolClient>), AuthError> {
    let config = env
        .config()
        .identity_pool()
        .cloned()
        .ok_or_else(|| AuthError::configuration("no identity pool configured"))?;
    let client = env.identity_pool()?;
    Ok((config, client))
}

async fn fetch_identity_id(logins: LoginsMap, env: &AuthEnvironment, events: &EventSender) {
    let (config, client) = match identity_pool(env) {
        Ok(parts) => parts,
        Err(error) => return fail(events, error).await,
    };
    let request = GetIdRequest {
        identity_pool_id: config.pool_id().to_string(),
        logins: logins.clone(),
    };
    match with_timeout(client.get_id(request)).await {
        Ok(response) => {
            events
                .send(Event::FetchSession(FetchSessionEvent::IdentityIdFetched {
                    identity_id: response.identity_id,
                    logins,
                }))
                .await;
        }
        Err(error) => fail(events, error).await,
    }
}

async fn fetch_aws_credentials(
    identity_id: String,
    logins: LoginsMap,
    env: &AuthEnvironment,
    events: &EventSender,
) {
    let (_, client) = match identity_pool(env) {
        Ok(parts) => parts,
        Err(error) => return fail(events, error).await,
    };
    let request = GetCredentialsForIdentityRequest {
        identity_id,
        logins,
    };
    match with_timeout(client.get_credentials_for_identity(request)).await {
        Ok(response) => {
            events
                .send(Event::FetchSession(FetchSessionEvent::AwsCredentialsFetched {
                    identity_id: response.identity_id,
                    credentials: response.credentials,
                }))
                .await;
        }
        Err(error) => fail(events, error).await,
    }
}

async fn refresh_user_pool_tokens(
    data: SignInData,
    identity_id: Option<String>,
    env: &AuthEnvironment,
    events: &EventSender,
) {
    let (config, client) = match env
        .config()
        .user_pool()
        .cloned()
        .ok_or_else(|| AuthError::configuration("no user pool configured"))
        .and_then(|config| env.user_pool().map(|client| (config, client)))
    {
        Ok(parts) => parts,
        Err(error) => return fail(events, error).await,
    };

    let mut parameters = HashMap::new();
    parameters.insert(
        params::REFRESH_TOKEN.to_string(),
        data.tokens.refresh_token.expose_secret().to_string(),
    );
    let request = InitiateAuthRequest {
        client_id: config.client_id().to_string(),
        flow: AuthFlow::RefreshTokenAuth,
        parameters,
    };

    match with_timeout(client.initiate_auth(request)).await {
        Ok(response) => match response.result {
            Some(result) => {
                // Refresh responses may omit a new refresh token; the old
                // one stays valid in that case.
                let refresh_token = result
                    .refresh_token
                    .unwrap_or_else(|| data.tokens.refresh_token.clone());
                let now = env.now();
                let refreshed = SignInData {
                    username: data.username,
                    user_id: data.user_id,
                    signed_in_at: data.signed_in_at,
                    tokens: BearerTokens {
                        id_token: result.id_token,
                        access_token: result.access_token,
                        refresh_token,
                        expires_at: now + Duration::seconds(result.expires_in_secs),
                    },
                };
                let continuation = if env.config().has_identity_pool() {
                    RefreshContinuation::FetchSession { identity_id }
                } else {
                    RefreshContinuation::Complete
                };
                events
                    .send(Event::Refresh(RefreshEvent::UserPoolTokenRefreshed {
                        data: refreshed,
                        continuation,
                    }))
                    .await;
            }
            None => {
                fail(
                    events,
                    AuthError::internal("token refresh response carried no tokens"),
                )
                .await;
            }
        },
        Err(error) => fail(events, error).await,
    }
}

async fn refresh_aws_credentials(
    identity_id: Option<String>,
    signed_in: Option<SignInData>,
    env: &AuthEnvironment,
    events: &EventSender,
) {
    let (config, client) = match identity_pool(env) {
        Ok(parts) => parts,
        Err(error) => return fail(events, error).await,
    };
    let logins = logins_map(env, signed_in.as_ref());

    let identity_id = match identity_id {
        Some(identity_id) => identity_id,
        None => {
            let request = GetIdRequest {
                identity_pool_id: config.pool_id().to_string(),
                logins: logins.clone(),
            };
            match with_timeout(client.get_id(request)).await {
                Ok(response) => response.identity_id,
                Err(error) => return fail(events, error).await,
            }
        }
    };

    let request = GetCredentialsForIdentityRequest {
        identity_id,
        logins,
    };
    match with_timeout(client.get_credentials_for_identity(request)).await {
        Ok(response) => {
            events
                .send(Event::Refresh(RefreshEvent::AwsCredentialsRefreshed {
                    identity_id: response.identity_id,
                    credentials: response.credentials,
                }))
                .await;
        }
        Err(error) => fail(events, error).await,
    }
}
