//! Sign-out actions.
//!
//! Remote steps are best-effort: a failed global sign-out or token
//! revocation is logged and the chain continues, so local credentials are
//! always cleared and the user always ends up signed out locally.

use gatehouse_provider::RevokeTokenRequest;
use gatehouse_types::{AuthenticationEvent, Event, SignOutAction, SignOutEvent};

use crate::actions::with_timeout;
use crate::environment::AuthEnvironment;
use crate::machine::EventSender;

pub(crate) async fn run(action: SignOutAction, env: &AuthEnvironment, events: &EventSender) {
    match action {
        SignOutAction::Begin { global, data } => {
            events
                .send(Event::SignOut(SignOutEvent::Initiate { global, data }))
                .await;
        }
        SignOutAction::GlobalSignOut { data } => {
            match env.user_pool() {
                Ok(client) => {
                    if let Err(error) =
                        with_timeout(client.global_sign_out(&data.tokens.access_token)).await
                    {
                        tracing::warn!(error = %error, "global sign-out failed; continuing locally");
                    }
                }
                Err(error) => {
                    tracing::warn!(error = %error, "no user pool client; skipping global sign-out");
                }
            }
            events
                .send(Event::SignOut(SignOutEvent::GlobalSignOutCompleted { data }))
                .await;
        }
        SignOutAction::RevokeToken { data } => {
            match (env.config().user_pool(), env.user_pool()) {
                (Some(config), Ok(client)) => {
                    let request = RevokeTokenRequest {
                        client_id: config.client_id().to_string(),
                        refresh_token: data.tokens.refresh_token.clone(),
                    };
                    if let Err(error) = with_timeout(client.revoke_token(request)).await {
                        tracing::warn!(error = %error, "token revocation failed; continuing locally");
                    }
                }
                _ => {
                    tracing::warn!("no user pool client; skipping token revocation");
                }
            }
            events
                .send(Event::SignOut(SignOutEvent::TokenRevokeCompleted))
                .await;
        }
        SignOutAction::ClearLocalCredentials => {
            if let Err(error) = env.credential_store().clear().await {
                tracing::warn!(error = %error, "failed to clear stored credentials");
            }
            events
                .send(Event::SignOut(SignOutEvent::LocalCredentialsCleared))
                .await;
            events
                .send(Event::Authentication(AuthenticationEvent::SignOutCompleted))
                .await;
        }
    }
}
