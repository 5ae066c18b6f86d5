//! The public engine facade.
//!
//! [`AuthEngine`] owns the auth machine and the credential-store handle.
//! Callers either push raw events with [`AuthEngine::send`] or go through
//! the command boundary: [`AuthCommand`] is routed by an exhaustive match,
//! and a command illegal in the current composite state is rejected with
//! `InvalidState` before any event is enqueued. State is observed through
//! [`AuthEngine::state`] and [`AuthEngine::subscribe`]; terminal
//! resolutions (`SignedIn`, `SessionEstablished`, `Error`) are read from
//! the state tree, never returned from an action.

use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::watch;

use gatehouse_types::{
    AuthConfig, AuthError, AuthEvent, AuthState, AuthenticationEvent, AuthenticationState,
    AuthorizationEvent, Event, SecretString, SignInError, SignInEvent, SignInMechanism,
    SignInState, TotpSetupState,
};

use crate::actions;
use crate::credential_store::CredentialStoreHandle;
use crate::environment::{AuthEnvironment, Clock};
use crate::machine::{ActionRunner, MachineHandle, StateMachine};
use crate::resolvers::AuthResolver;

/// Commands accepted at the ingestion boundary.
///
/// Adding a command extends this enum; the dispatch match is exhaustive, so
/// the compiler enforces that every command gets a routing decision.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthCommand {
    /// Run the configuration chain with the environment's configuration.
    Configure,
    SignInWithSrp {
        username: String,
        password: SecretString,
    },
    SignInWithMigration {
        username: String,
        password: SecretString,
    },
    SignInWithCustom {
        username: String,
    },
    /// Answer whichever challenge (or TOTP code) is currently pending.
    SubmitChallengeAnswer {
        answer: String,
    },
    CancelSignIn,
    SignOut {
        global: bool,
    },
    FetchSession {
        force_refresh: bool,
    },
    /// Tear down to `NotConfigured`, cancelling in-flight work.
    Reset,
}

/// One running auth engine: the composite machine, its credential-store
/// machine, and the clock used to stamp session requests.
pub struct AuthEngine {
    machine: MachineHandle<AuthState>,
    credential_store: CredentialStoreHandle,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
}

impl AuthEngine {
    /// Spawns the machine workers. The engine is inert until a
    /// [`AuthCommand::Configure`] (or a raw configure event) arrives.
    #[must_use]
    pub fn start(environment: AuthEnvironment) -> Self {
        let credential_store = environment.credential_store().clone();
        let clock = environment.clock_handle();
        let config = environment.config().clone();
        let env = Arc::new(environment);
        let runner: ActionRunner = Arc::new(move |action, events| {
            actions::run(action, Arc::clone(&env), events).boxed()
        });
        let machine = StateMachine::spawn("auth", AuthResolver, AuthState::NotConfigured, runner);
        Self {
            machine,
            credential_store,
            clock,
            config,
        }
    }

    /// Snapshot of the composite state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.machine.state()
    }

    /// Watch receiver notified on every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.machine.subscribe()
    }

    /// Waits until the predicate holds. `None` if the engine stopped.
    pub async fn wait_for(&self, predicate: impl FnMut(&AuthState) -> bool) -> Option<AuthState> {
        self.machine.wait_for(predicate).await
    }

    /// Enqueue a raw event, bypassing command validation.
    pub async fn send(&self, event: Event) {
        self.machine.send(event).await;
    }

    #[must_use]
    pub fn credential_store(&self) -> &CredentialStoreHandle {
        &self.credential_store
    }

    /// Validate a command against the current state and enqueue its events.
    pub async fn dispatch(&self, command: AuthCommand) -> Result<(), AuthError> {
        match command {
            AuthCommand::Configure => match self.state() {
                AuthState::NotConfigured | AuthState::Error(_) => {
                    self.send(Event::Auth(AuthEvent::Configure(self.config.clone())))
                        .await;
                    Ok(())
                }
                _ => Err(AuthError::invalid_state("auth is already configured")),
            },
            AuthCommand::SignInWithSrp { username, password } => {
                self.request_sign_in(SignInMechanism::Srp { username, password })
                    .await
            }
            AuthCommand::SignInWithMigration { username, password } => {
                self.request_sign_in(SignInMechanism::Migration { username, password })
                    .await
            }
            AuthCommand::SignInWithCustom { username } => {
                self.request_sign_in(SignInMechanism::Custom { username })
                    .await
            }
            AuthCommand::SubmitChallengeAnswer { answer } => {
                if self.awaiting_challenge_answer() {
                    self.send(Event::SignIn(SignInEvent::VerifyChallengeAnswer {
                        answer,
                    }))
                    .await;
                    Ok(())
                } else {
                    Err(AuthError::invalid_state(
                        "no challenge is awaiting an answer",
                    ))
                }
            }
            AuthCommand::CancelSignIn => match self.authentication() {
                Some(AuthenticationState::SigningIn(_)) => {
                    self.send(Event::Authentication(AuthenticationEvent::CancelSignIn))
                        .await;
                    Ok(())
                }
                _ => Err(AuthError::invalid_state("no sign-in is in progress")),
            },
            AuthCommand::SignOut { global } => match self.authentication() {
                Some(AuthenticationState::SignedIn(_)) => {
                    self.send(Event::Authentication(
                        AuthenticationEvent::SignOutRequested { global },
                    ))
                    .await;
                    Ok(())
                }
                Some(_) => Err(AuthError::invalid_state("no user is signed in")),
                None => Err(AuthError::invalid_state("auth is not configured")),
            },
            AuthCommand::FetchSession { force_refresh } => {
                if self.state().authorization().is_none() {
                    return Err(AuthError::invalid_state("auth is not configured"));
                }
                self.send(Event::Authorization(AuthorizationEvent::RequestSession {
                    requested_at: self.clock.now(),
                    force_refresh,
                }))
                .await;
                Ok(())
            }
            AuthCommand::Reset => {
                self.machine.reset().await;
                self.credential_store.reset().await;
                Ok(())
            }
        }
    }

    fn authentication(&self) -> Option<AuthenticationState> {
        self.state().authentication().cloned()
    }

    async fn request_sign_in(&self, mechanism: SignInMechanism) -> Result<(), AuthError> {
        match self.authentication() {
            Some(
                AuthenticationState::SignedOut
                | AuthenticationState::Error(_)
                | AuthenticationState::SigningIn(SignInState::Error(_)),
            ) => {
                self.send(Event::Authentication(AuthenticationEvent::SignInRequested(
                    mechanism,
                )))
                .await;
                Ok(())
            }
            Some(AuthenticationState::SignedIn(_)) => {
                Err(AuthError::invalid_state("a user is already signed in"))
            }
            Some(_) => Err(AuthError::invalid_state(
                "another auth operation is in progress",
            )),
            None => Err(AuthError::invalid_state("auth is not configured")),
        }
    }

    fn awaiting_challenge_answer(&self) -> bool {
        let Some(AuthenticationState::SigningIn(child)) = self.authentication() else {
            return false;
        };
        match child {
            SignInState::AwaitingChallengeAnswer(_) => true,
            SignInState::Error(SignInError { resume, .. }) => resume.is_some(),
            SignInState::SettingUpTotp(totp) => matches!(
                totp,
                TotpSetupState::WaitingForAnswer(_) | TotpSetupState::Error { data: Some(_), .. }
            ),
            _ => false,
        }
    }
}
