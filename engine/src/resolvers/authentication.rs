//! Authentication resolver: signed-in/signed-out lifecycle, delegating the
//! active sign-in or sign-out exchange to its nested machine.

use gatehouse_types::{
    Action, AuthenticationEvent, AuthenticationState, Event, SignInAction, SignInState,
    SignOutAction, SignOutState,
};

use crate::machine::Resolution;
use crate::resolvers::{sign_in, sign_out};

pub(crate) fn resolve(
    state: &AuthenticationState,
    event: &Event,
) -> Resolution<AuthenticationState> {
    match event {
        Event::Authentication(event) => resolve_own(state, event),
        Event::SignIn(event) => delegate_sign_in(state, event),
        Event::SignOut(event) => delegate_sign_out(state, event),
        _ => Resolution::unchanged(state),
    }
}

fn resolve_own(
    state: &AuthenticationState,
    event: &AuthenticationEvent,
) -> Resolution<AuthenticationState> {
    use AuthenticationEvent as E;
    use AuthenticationState as S;
    match (state, event) {
        (S::NotConfigured, E::Configured { signed_in }) => match signed_in {
            Some(data) => Resolution::next(S::SignedIn(data.clone())),
            None => Resolution::next(S::SignedOut),
        },
        (S::SignedOut | S::Error(_), E::SignInRequested(mechanism))
        | (S::SigningIn(SignInState::Error(_)), E::SignInRequested(mechanism)) => {
            Resolution::with(
                S::SigningIn(SignInState::NotStarted),
                Action::SignIn(SignInAction::Begin(mechanism.clone())),
            )
        }
        (S::SigningIn(_), E::SignInCompleted(data)) => Resolution::next(S::SignedIn(data.clone())),
        (S::SigningIn(_), E::CancelSignIn) => Resolution::next(S::SignedOut),
        (S::SignedIn(data), E::SignOutRequested { global }) => Resolution::with(
            S::SigningOut(SignOutState::NotStarted),
            Action::SignOut(SignOutAction::Begin {
                global: *global,
                data: data.clone(),
            }),
        ),
        (S::SigningOut(_), E::SignOutCompleted) => Resolution::next(S::SignedOut),
        (_, E::ThrowError(error)) => Resolution::next(S::Error(error.clone())),
        _ => Resolution::unchanged(state),
    }
}

fn delegate_sign_in(
    state: &AuthenticationState,
    event: &gatehouse_types::SignInEvent,
) -> Resolution<AuthenticationState> {
    let AuthenticationState::SigningIn(child) = state else {
        return Resolution::unchanged(state);
    };
    let resolved = sign_in::resolve(child, event);
    Resolution {
        new_state: AuthenticationState::SigningIn(resolved.new_state),
        actions: resolved.actions,
    }
}

fn delegate_sign_out(
    state: &AuthenticationState,
    event: &gatehouse_types::SignOutEvent,
) -> Resolution<AuthenticationState> {
    let AuthenticationState::SigningOut(child) = state else {
        return Resolution::unchanged(state);
    };
    let resolved = sign_out::resolve(child, event);
    Resolution {
        new_state: AuthenticationState::SigningOut(resolved.new_state),
        actions: resolved.actions,
    }
}
