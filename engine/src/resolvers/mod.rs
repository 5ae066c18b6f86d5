//! Pure state-transition functions.
//!
//! The top-level resolver owns the configuration lifecycle and delegates
//! everything else to the nested resolver for whichever sub-state is
//! active, wrapping the nested resolution back into the composite variant.
//! No resolver performs IO or reads the clock; timestamps arrive inside
//! events.

pub(crate) mod authentication;
pub(crate) mod session;
pub(crate) mod sign_in;
pub(crate) mod sign_out;

use gatehouse_types::{
    Action, AuthEvent, AuthState, AuthenticationState, AuthorizationState, ConfigureAction, Event,
    SignInData,
};

use crate::machine::{Resolution, Resolver};

pub(crate) struct AuthResolver;

impl Resolver for AuthResolver {
    type State = AuthState;

    fn resolve(&self, state: &AuthState, event: &Event) -> Resolution<AuthState> {
        resolve(state, event)
    }

    fn state_label(state: &AuthState) -> &'static str {
        state.label()
    }
}

pub(crate) fn resolve(state: &AuthState, event: &Event) -> Resolution<AuthState> {
    match event {
        Event::Auth(event) => resolve_configuration(state, event),
        // Credential store events belong to the other machine instance.
        Event::CredentialStore(_) => Resolution::unchanged(state),
        _ => delegate(state, event),
    }
}

fn resolve_configuration(state: &AuthState, event: &AuthEvent) -> Resolution<AuthState> {
    use AuthEvent as E;
    use AuthState as S;
    match (state, event) {
        (S::NotConfigured | S::Error(_), E::Configure(config)) => Resolution::with(
            S::Configuring,
            Action::Configure(ConfigureAction::ConfigureCredentialStore {
                config: config.clone(),
            }),
        ),
        (S::Configuring, E::CachedCredentialsLoaded {
            config,
            credentials,
        }) => {
            if config.has_user_pool() {
                Resolution::with(
                    S::ConfiguringAuthN(AuthenticationState::NotConfigured),
                    Action::Configure(ConfigureAction::ConfigureAuthentication {
                        config: config.clone(),
                        credentials: credentials.clone(),
                    }),
                )
            } else {
                // Identity-pool-only: authentication is never configured;
                // go straight to authorization.
                Resolution::with(
                    S::ConfiguringAuthZ(
                        AuthenticationState::NotConfigured,
                        AuthorizationState::NotConfigured,
                    ),
                    Action::Configure(ConfigureAction::ConfigureAuthorization {
                        config: config.clone(),
                        credentials: credentials.clone(),
                    }),
                )
            }
        }
        (S::ConfiguringAuthN(authn), E::AuthenticationConfigured {
            config,
            credentials,
        }) => Resolution::with(
            S::ConfiguringAuthZ(authn.clone(), AuthorizationState::NotConfigured),
            Action::Configure(ConfigureAction::ConfigureAuthorization {
                config: config.clone(),
                credentials: credentials.clone(),
            }),
        ),
        (S::ConfiguringAuthZ(authn, authz), E::AuthorizationConfigured) => {
            Resolution::next(S::Configured(authn.clone(), authz.clone()))
        }
        (_, E::ThrowError(error)) => Resolution::next(S::Error(error.clone())),
        _ => Resolution::unchanged(state),
    }
}

fn delegate(state: &AuthState, event: &Event) -> Resolution<AuthState> {
    match state {
        AuthState::ConfiguringAuthN(authn) => {
            let resolved = authentication::resolve(authn, event);
            Resolution {
                new_state: AuthState::ConfiguringAuthN(resolved.new_state),
                actions: resolved.actions,
            }
        }
        AuthState::ConfiguringAuthZ(authn, authz) => {
            let (authn, authz, actions) = route_children(authn, authz, event);
            Resolution {
                new_state: AuthState::ConfiguringAuthZ(authn, authz),
                actions,
            }
        }
        AuthState::Configured(authn, authz) => {
            let (authn, authz, actions) = route_children(authn, authz, event);
            Resolution {
                new_state: AuthState::Configured(authn, authz),
                actions,
            }
        }
        AuthState::NotConfigured | AuthState::Configuring | AuthState::Error(_) => {
            Resolution::unchanged(state)
        }
    }
}

fn route_children(
    authn: &AuthenticationState,
    authz: &AuthorizationState,
    event: &Event,
) -> (AuthenticationState, AuthorizationState, Vec<Action>) {
    match event {
        Event::Authentication(_) | Event::SignIn(_) | Event::SignOut(_) => {
            let resolved = authentication::resolve(authn, event);
            (resolved.new_state, authz.clone(), resolved.actions)
        }
        Event::Authorization(_) | Event::FetchSession(_) | Event::Refresh(_) => {
            let resolved = session::resolve(authz, event, signed_in(authn));
            (authn.clone(), resolved.new_state, resolved.actions)
        }
        Event::Auth(_) | Event::CredentialStore(_) => {
            (authn.clone(), authz.clone(), Vec::new())
        }
    }
}

fn signed_in(authn: &AuthenticationState) -> Option<&SignInData> {
    match authn {
        AuthenticationState::SignedIn(data) => Some(data),
        _ => None,
    }
}
