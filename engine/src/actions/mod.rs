//! Action executors.
//!
//! Each action runs as an independent task: read the environment, perform
//! the effect, and emit the events that describe the outcome. Actions never
//! touch machine state directly, and every network call carries its own
//! deadline - a timeout surfaces as an ordinary error event.

pub(crate) mod configure;
pub(crate) mod session;
pub(crate) mod sign_in;
pub(crate) mod sign_out;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use gatehouse_provider::ProviderError;
use gatehouse_types::{Action, AuthError};

use crate::environment::AuthEnvironment;
use crate::machine::EventSender;

/// Deadline applied to each identity-provider round trip.
const NETWORK_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) async fn run(action: Action, env: Arc<AuthEnvironment>, events: EventSender) {
    tracing::debug!(action = action.label(), "running action");
    match action {
        Action::Configure(action) => configure::run(action, &env, &events).await,
        Action::SignIn(action) => sign_in::run(action, &env, &events).await,
        Action::SignOut(action) => sign_out::run(action, &env, &events).await,
        Action::Session(action) => session::run(action, &env, &events).await,
        Action::Store(action) => {
            // Store actions belong to the credential-store machine; the
            // auth resolver never schedules one.
            tracing::error!(
                action = action.label(),
                "store action scheduled on the auth machine"
            );
        }
    }
}

/// Runs one RPC under the network deadline, flattening timeout and provider
/// failures into the shared error taxonomy.
pub(crate) async fn with_timeout<T>(
    future: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, AuthError> {
    match tokio::time::timeout(NETWORK_TIMEOUT, future).await {
        Ok(result) => result.map_err(AuthError::from),
        Err(_) => Err(AuthError::from(ProviderError::Timeout)),
    }
}
