//! Configuration actions: credential store bring-up and the
//! authentication/authorization fan-out.

use gatehouse_types::{
    AuthEvent, AuthenticationEvent, AuthorizationEvent, ConfigureAction, Credentials, Event,
};

use crate::environment::AuthEnvironment;
use crate::machine::EventSender;

pub(crate) async fn run(action: ConfigureAction, env: &AuthEnvironment, events: &EventSender) {
    match action {
        ConfigureAction::ConfigureCredentialStore { config } => {
            // A store failure downgrades to "no cached credentials":
            // configuration proceeds, the user just is not signed in.
            let credentials = match env.credential_store().configure().await {
                Ok(credentials) => credentials,
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        "stored credentials unavailable; continuing without them"
                    );
                    Credentials::none()
                }
            };
            events
                .send(Event::Auth(AuthEvent::CachedCredentialsLoaded {
                    config,
                    credentials,
                }))
                .await;
        }
        ConfigureAction::ConfigureAuthentication {
            config,
            credentials,
        } => {
            let signed_in = credentials.signed_in_data().cloned();
            events
                .send(Event::Authentication(AuthenticationEvent::Configured {
                    signed_in,
                }))
                .await;
            events
                .send(Event::Auth(AuthEvent::AuthenticationConfigured {
                    config,
                    credentials,
                }))
                .await;
        }
        ConfigureAction::ConfigureAuthorization { config, credentials } => {
            // Cached credentials only seed the session when they are
            // complete for this configuration; a missing identity half
            // forces a cold fetch on first request instead.
            let complete = !credentials.is_empty()
                && (credentials.aws_credentials().is_some() || config.identity_pool().is_none());
            let cached = complete.then_some(credentials);
            events
                .send(Event::Authorization(AuthorizationEvent::Configured {
                    cached,
                }))
                .await;
            events.send(Event::Auth(AuthEvent::AuthorizationConfigured)).await;
        }
    }
}
