//! Authorization resolver: session fetch, proactive refresh, and the
//! nested identity exchange shared by both paths.
//!
//! The staleness decision is pure: the request event carries the timestamp
//! it was made at, and credentials within the refresh lead time of expiry
//! trigger a refresh instead of being served.

use chrono::{DateTime, Utc};

use gatehouse_types::{
    Action, AuthorizationEvent, AuthorizationState, Credentials, Event, FetchSessionEvent,
    FetchSessionState, RefreshContinuation, RefreshEvent, RefreshSessionState, SessionAction,
    SignInData,
};

use crate::machine::Resolution;

pub(crate) fn resolve(
    state: &AuthorizationState,
    event: &Event,
    signed_in: Option<&SignInData>,
) -> Resolution<AuthorizationState> {
    use AuthorizationState as S;
    match (state, event) {
        (_, Event::Authorization(event)) => resolve_own(state, event, signed_in),
        (S::FetchingSession(child), Event::FetchSession(event)) => {
            let resolved = fetch_session::resolve(child, event);
            match resolved.new_state {
                FetchSessionState::Fetched {
                    identity_id,
                    credentials,
                } => {
                    let session = Credentials::new(
                        signed_in.cloned(),
                        Some(identity_id),
                        Some(credentials),
                    );
                    established(session, resolved.actions)
                }
                other => Resolution {
                    new_state: S::FetchingSession(other),
                    actions: resolved.actions,
                },
            }
        }
        (S::RefreshingSession(child), Event::FetchSession(_) | Event::Refresh(_)) => {
            let resolved = refresh::resolve(child, event);
            match resolved.new_state {
                RefreshSessionState::Refreshed(credentials) => {
                    established(credentials, resolved.actions)
                }
                other => Resolution {
                    new_state: S::RefreshingSession(other),
                    actions: resolved.actions,
                },
            }
        }
        _ => Resolution::unchanged(state),
    }
}

/// A fresh session: establish it and schedule persistence. The credentials
/// value is brand-new and fully populated; it replaces the old one whole.
fn established(credentials: Credentials, mut actions: Vec<Action>) -> Resolution<AuthorizationState> {
    actions.push(Action::Session(SessionAction::StoreCredentials(
        credentials.clone(),
    )));
    Resolution {
        new_state: AuthorizationState::SessionEstablished(credentials),
        actions,
    }
}

fn resolve_own(
    state: &AuthorizationState,
    event: &AuthorizationEvent,
    signed_in: Option<&SignInData>,
) -> Resolution<AuthorizationState> {
    use AuthorizationEvent as E;
    use AuthorizationState as S;
    match (state, event) {
        (S::NotConfigured, E::Configured { cached }) => match cached {
            Some(credentials) => Resolution::next(S::SessionEstablished(credentials.clone())),
            None => Resolution::next(S::Configured),
        },
        (S::Configured | S::Error(_), E::RequestSession { requested_at, .. }) => {
            // Stale tokens would poison the logins map; refresh them first
            // and let the refresh path run the identity exchange.
            if let Some(data) = signed_in.filter(|data| data.tokens.is_stale(*requested_at)) {
                let credentials = Credentials::from_user_pool(data.clone());
                Resolution::with(
                    S::RefreshingSession(RefreshSessionState::NotStarted),
                    Action::Session(SessionAction::BeginRefresh {
                        credentials,
                        requested_at: *requested_at,
                        force: false,
                    }),
                )
            } else {
                Resolution::with(
                    S::FetchingSession(FetchSessionState::NotStarted),
                    Action::Session(SessionAction::BeginFetch {
                        signed_in: signed_in.cloned(),
                        identity_id: None,
                    }),
                )
            }
        }
        (S::SessionEstablished(credentials), E::RequestSession {
            requested_at,
            force_refresh,
        }) => {
            if *force_refresh || credentials.requires_refresh(*requested_at) {
                Resolution::with(
                    S::RefreshingSession(RefreshSessionState::NotStarted),
                    Action::Session(SessionAction::BeginRefresh {
                        credentials: credentials.clone(),
                        requested_at: *requested_at,
                        force: *force_refresh,
                    }),
                )
            } else {
                // Fresh enough: the caller reads the established state.
                Resolution::unchanged(state)
            }
        }
        (_, E::ThrowError(error)) => Resolution::next(S::Error(error.clone())),
        _ => Resolution::unchanged(state),
    }
}

pub(crate) mod fetch_session {
    use super::{Action, FetchSessionEvent, FetchSessionState, Resolution, SessionAction};

    pub(crate) fn resolve(
        state: &FetchSessionState,
        event: &FetchSessionEvent,
    ) -> Resolution<FetchSessionState> {
        use FetchSessionEvent as E;
        use FetchSessionState as S;
        match (state, event) {
            (S::NotStarted, E::FetchIdentity {
                logins,
                identity_id: Some(identity_id),
            }) => Resolution::with(
                S::FetchingAwsCredentials,
                Action::Session(SessionAction::FetchAwsCredentials {
                    identity_id: identity_id.clone(),
                    logins: logins.clone(),
                }),
            ),
            (S::NotStarted, E::FetchIdentity {
                logins,
                identity_id: None,
            }) => Resolution::with(
                S::FetchingIdentityId,
                Action::Session(SessionAction::FetchIdentityId {
                    logins: logins.clone(),
                }),
            ),
            (S::FetchingIdentityId, E::IdentityIdFetched {
                identity_id,
                logins,
            }) => Resolution::with(
                S::FetchingAwsCredentials,
                Action::Session(SessionAction::FetchAwsCredentials {
                    identity_id: identity_id.clone(),
                    logins: logins.clone(),
                }),
            ),
            (S::FetchingAwsCredentials, E::AwsCredentialsFetched {
                identity_id,
                credentials,
            }) => Resolution::next(S::Fetched {
                identity_id: identity_id.clone(),
                credentials: credentials.clone(),
            }),
            _ => Resolution::unchanged(state),
        }
    }
}

pub(crate) mod refresh {
    use super::{
        Action, Credentials, DateTime, Event, FetchSessionState, RefreshContinuation,
        RefreshEvent, RefreshSessionState, Resolution, SessionAction, Utc, fetch_session,
    };

    pub(crate) fn resolve(
        state: &RefreshSessionState,
        event: &Event,
    ) -> Resolution<RefreshSessionState> {
        use RefreshSessionState as S;
        match (state, event) {
            (S::NotStarted, Event::Refresh(RefreshEvent::Refresh {
                credentials,
                requested_at,
                force,
            })) => plan(credentials, *requested_at, *force),
            (
                S::RefreshingUserPoolToken(_),
                Event::Refresh(RefreshEvent::UserPoolTokenRefreshed { data, continuation }),
            ) => match continuation {
                RefreshContinuation::Complete => {
                    Resolution::next(S::Refreshed(Credentials::from_user_pool(data.clone())))
                }
                RefreshContinuation::FetchSession { identity_id } => Resolution::with(
                    S::FetchingAuthSessionWithUserPool(
                        data.clone(),
                        FetchSessionState::NotStarted,
                    ),
                    Action::Session(SessionAction::BeginFetch {
                        signed_in: Some(data.clone()),
                        identity_id: identity_id.clone(),
                    }),
                ),
            },
            (
                S::RefreshingUnAuthCredentials,
                Event::Refresh(RefreshEvent::AwsCredentialsRefreshed {
                    identity_id,
                    credentials,
                }),
            ) => Resolution::next(S::Refreshed(Credentials::new(
                None,
                Some(identity_id.clone()),
                Some(credentials.clone()),
            ))),
            (
                S::RefreshingCredentialsWithUserPool(data),
                Event::Refresh(RefreshEvent::AwsCredentialsRefreshed {
                    identity_id,
                    credentials,
                }),
            ) => Resolution::next(S::Refreshed(Credentials::new(
                Some(data.clone()),
                Some(identity_id.clone()),
                Some(credentials.clone()),
            ))),
            (S::FetchingAuthSessionWithUserPool(data, child), Event::FetchSession(event)) => {
                let resolved = fetch_session::resolve(child, event);
                match resolved.new_state {
                    FetchSessionState::Fetched {
                        identity_id,
                        credentials,
                    } => Resolution {
                        new_state: S::Refreshed(Credentials::new(
                            Some(data.clone()),
                            Some(identity_id),
                            Some(credentials),
                        )),
                        actions: resolved.actions,
                    },
                    other => Resolution {
                        new_state: S::FetchingAuthSessionWithUserPool(data.clone(), other),
                        actions: resolved.actions,
                    },
                }
            }
            _ => Resolution::unchanged(state),
        }
    }

    /// Pick the refresh path from what is stale. Pure: the timestamp comes
    /// from the triggering event.
    fn plan(
        credentials: &Credentials,
        requested_at: DateTime<Utc>,
        force: bool,
    ) -> Resolution<RefreshSessionState> {
        use RefreshSessionState as S;
        let Some(data) = credentials.signed_in_data() else {
            // Unauthenticated access: refetch scoped credentials directly.
            return Resolution::with(
                S::RefreshingUnAuthCredentials,
                Action::Session(SessionAction::RefreshAwsCredentials {
                    identity_id: credentials.identity_id().map(str::to_string),
                    signed_in: None,
                }),
            );
        };

        if force || data.tokens.is_stale(requested_at) {
            return Resolution::with(
                S::RefreshingUserPoolToken(data.clone()),
                Action::Session(SessionAction::RefreshUserPoolTokens {
                    data: data.clone(),
                    identity_id: credentials.identity_id().map(str::to_string),
                }),
            );
        }

        if credentials
            .aws_credentials()
            .is_some_and(|aws| aws.is_stale(requested_at))
        {
            return match credentials.identity_id() {
                Some(identity_id) => Resolution::with(
                    S::RefreshingCredentialsWithUserPool(data.clone()),
                    Action::Session(SessionAction::RefreshAwsCredentials {
                        identity_id: Some(identity_id.to_string()),
                        signed_in: Some(data.clone()),
                    }),
                ),
                None => Resolution::with(
                    S::FetchingAuthSessionWithUserPool(
                        data.clone(),
                        FetchSessionState::NotStarted,
                    ),
                    Action::Session(SessionAction::BeginFetch {
                        signed_in: Some(data.clone()),
                        identity_id: None,
                    }),
                ),
            };
        }

        // Nothing stale after all: hand the same value back unchanged.
        Resolution::next(S::Refreshed(credentials.clone()))
    }
}
