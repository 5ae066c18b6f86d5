//! Sign-out resolver.
//!
//! Remote steps run in a fixed order (global sign-out, token revocation,
//! local clear) and are best-effort: the actions report completion even
//! when the remote call failed, so a broken network never strands local
//! state. Only an explicit error event parks the machine in `Error`.

use gatehouse_types::{Action, SignOutAction, SignOutEvent, SignOutState};

use crate::machine::Resolution;

pub(crate) fn resolve(state: &SignOutState, event: &SignOutEvent) -> Resolution<SignOutState> {
    use SignOutEvent as E;
    use SignOutState as S;
    match (state, event) {
        (S::NotStarted, E::Initiate { global: true, data }) => Resolution::with(
            S::SigningOutGlobally,
            Action::SignOut(SignOutAction::GlobalSignOut { data: data.clone() }),
        ),
        (S::NotStarted, E::Initiate {
            global: false,
            data,
        }) => Resolution::with(
            S::RevokingToken,
            Action::SignOut(SignOutAction::RevokeToken { data: data.clone() }),
        ),
        (S::SigningOutGlobally, E::GlobalSignOutCompleted { data }) => Resolution::with(
            S::RevokingToken,
            Action::SignOut(SignOutAction::RevokeToken { data: data.clone() }),
        ),
        (S::RevokingToken, E::TokenRevokeCompleted) => Resolution::with(
            S::ClearingLocalCredentials,
            Action::SignOut(SignOutAction::ClearLocalCredentials),
        ),
        (S::ClearingLocalCredentials, E::LocalCredentialsCleared) => {
            Resolution::next(S::SignedOut)
        }
        (state, E::ThrowError(error)) if !matches!(state, S::SignedOut) => {
            Resolution::next(S::Error(error.clone()))
        }
        _ => Resolution::unchanged(state),
    }
}
