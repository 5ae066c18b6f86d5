//! Sign-in resolver: SRP, migration, custom challenges, and TOTP setup.
//!
//! Validation failures are caught here, before any network action is
//! scheduled. Errors preserve the pending challenge or TOTP context so a
//! corrected answer resumes the exchange instead of restarting it; the
//! server-issued session token is carried forward verbatim through every
//! step.

use gatehouse_types::{
    Action, AuthError, ChallengeKind, SecretString, SignInAction, SignInError, SignInEvent,
    SignInResumeContext, SignInState, SrpStage, TotpSetupData, TotpSetupState,
};

use crate::machine::Resolution;

pub(crate) fn resolve(state: &SignInState, event: &SignInEvent) -> Resolution<SignInState> {
    use SignInEvent as E;
    use SignInState as S;
    match (state, event) {
        (S::NotStarted, E::InitiateSrp { username, password }) => {
            match validate(username, Some(password)) {
                Some(error) => fail(error),
                None => Resolution::with(
                    S::SigningInWithSrp(SrpStage::Initiating),
                    Action::SignIn(SignInAction::InitiateSrpAuth {
                        username: username.clone(),
                        password: password.clone(),
                    }),
                ),
            }
        }
        (S::NotStarted, E::InitiateMigration { username, password }) => {
            initiate_migration(username, password, None)
        }
        // A partial exchange left a session behind; resume it rather than
        // starting over.
        (S::Error(error), E::InitiateMigration { username, password }) => {
            let session = match &error.resume {
                Some(SignInResumeContext::Challenge(data)) => data.session.clone(),
                _ => None,
            };
            initiate_migration(username, password, session)
        }
        (S::NotStarted, E::InitiateCustom { username }) => match validate(username, None) {
            Some(error) => fail(error),
            None => Resolution::with(
                S::ResolvingChallenge(ChallengeKind::Custom),
                Action::SignIn(SignInAction::InitiateCustomAuth {
                    username: username.clone(),
                }),
            ),
        },
        (
            S::SigningInWithSrp(SrpStage::Initiating),
            E::RespondPasswordVerifier {
                challenge,
                password,
                key_pair,
            },
        ) => Resolution::with(
            S::SigningInWithSrp(SrpStage::RespondingToVerifier),
            Action::SignIn(SignInAction::VerifyPasswordSrp {
                challenge: challenge.clone(),
                password: password.clone(),
                key_pair: key_pair.clone(),
            }),
        ),
        (state, E::ReceivedChallenge(data)) if state.awaits_server() => {
            Resolution::next(S::AwaitingChallengeAnswer(data.clone()))
        }
        (S::AwaitingChallengeAnswer(data), E::VerifyChallengeAnswer { answer }) => {
            Resolution::with(
                S::VerifyingChallenge,
                Action::SignIn(SignInAction::VerifyChallengeAnswer {
                    data: data.clone(),
                    answer: answer.clone(),
                }),
            )
        }
        (S::Error(error), E::VerifyChallengeAnswer { answer }) => resume_from_error(error, answer),
        (state, E::InitiateTotpSetup { username, session }) if state.awaits_server() => {
            Resolution::with(
                S::SettingUpTotp(TotpSetupState::SettingUp),
                Action::SignIn(SignInAction::AssociateSoftwareToken {
                    username: username.clone(),
                    session: session.clone(),
                }),
            )
        }
        (S::SettingUpTotp(totp), event) => resolve_totp(totp, event),
        (state, E::FinalizeSignIn(_)) if state.awaits_server() => Resolution::next(S::Done),
        (state, E::ThrowError { error, resume })
            if !matches!(state, S::Done | S::Error(_)) =>
        {
            let resume = resume.clone().or_else(|| resume_context(state));
            Resolution::next(S::Error(SignInError {
                error: error.clone(),
                resume,
            }))
        }
        _ => Resolution::unchanged(state),
    }
}

fn resolve_totp(totp: &TotpSetupState, event: &SignInEvent) -> Resolution<SignInState> {
    use SignInEvent as E;
    use TotpSetupState as T;
    let wrap = |totp| SignInState::SettingUpTotp(totp);
    match (totp, event) {
        (T::SettingUp, E::TotpSecretIssued(data)) => {
            Resolution::next(wrap(T::WaitingForAnswer(data.clone())))
        }
        (T::WaitingForAnswer(data), E::VerifyChallengeAnswer { answer }) => Resolution::with(
            wrap(T::Verifying(data.clone())),
            Action::SignIn(SignInAction::VerifySoftwareToken {
                data: data.clone(),
                code: answer.clone(),
            }),
        ),
        // A corrected code re-enters verification with the retained setup
        // data; no new shared secret is issued.
        (T::Error {
            data: Some(data), ..
        }, E::VerifyChallengeAnswer { answer }) => Resolution::with(
            wrap(T::Verifying(data.clone())),
            Action::SignIn(SignInAction::VerifySoftwareToken {
                data: data.clone(),
                code: answer.clone(),
            }),
        ),
        (T::Verifying(data), E::TotpCodeVerified { username, session }) => {
            let updated = TotpSetupData {
                username: username.clone(),
                session: session.clone(),
                secret_code: data.secret_code.clone(),
            };
            Resolution::with(
                wrap(T::RespondingToAuthChallenge(updated)),
                Action::SignIn(SignInAction::RespondToTotpChallenge {
                    username: username.clone(),
                    session: session.clone(),
                }),
            )
        }
        (T::RespondingToAuthChallenge(_), E::FinalizeSignIn(_)) => {
            Resolution::next(SignInState::Done)
        }
        (totp, E::ThrowError { error, resume }) => {
            let data = totp_data(totp).or_else(|| match resume {
                Some(SignInResumeContext::TotpSetup(data)) => Some(data.clone()),
                _ => None,
            });
            Resolution::next(wrap(T::Error {
                error: error.clone(),
                data,
            }))
        }
        (totp, _) => Resolution::unchanged(&SignInState::SettingUpTotp(totp.clone())),
    }
}

fn totp_data(totp: &TotpSetupState) -> Option<TotpSetupData> {
    match totp {
        TotpSetupState::WaitingForAnswer(data)
        | TotpSetupState::Verifying(data)
        | TotpSetupState::RespondingToAuthChallenge(data) => Some(data.clone()),
        TotpSetupState::Error { data, .. } => data.clone(),
        TotpSetupState::SettingUp => None,
    }
}

fn resume_context(state: &SignInState) -> Option<SignInResumeContext> {
    match state {
        SignInState::AwaitingChallengeAnswer(data) => {
            Some(SignInResumeContext::Challenge(data.clone()))
        }
        SignInState::SettingUpTotp(totp) => totp_data(totp).map(SignInResumeContext::TotpSetup),
        _ => None,
    }
}

fn resume_from_error(error: &SignInError, answer: &str) -> Resolution<SignInState> {
    match &error.resume {
        Some(SignInResumeContext::Challenge(data)) => Resolution::with(
            SignInState::VerifyingChallenge,
            Action::SignIn(SignInAction::VerifyChallengeAnswer {
                data: data.clone(),
                answer: answer.to_string(),
            }),
        ),
        Some(SignInResumeContext::TotpSetup(data)) => Resolution::with(
            SignInState::SettingUpTotp(TotpSetupState::Verifying(data.clone())),
            Action::SignIn(SignInAction::VerifySoftwareToken {
                data: data.clone(),
                code: answer.to_string(),
            }),
        ),
        None => Resolution::next(SignInState::Error(error.clone())),
    }
}

fn initiate_migration(
    username: &str,
    password: &SecretString,
    session: Option<String>,
) -> Resolution<SignInState> {
    match validate(username, Some(password)) {
        Some(error) => fail(error),
        None => Resolution::with(
            SignInState::SigningInWithMigration,
            Action::SignIn(SignInAction::InitiateMigrationAuth {
                username: username.to_string(),
                password: password.clone(),
                session,
            }),
        ),
    }
}

fn validate(username: &str, password: Option<&SecretString>) -> Option<AuthError> {
    if username.trim().is_empty() {
        return Some(AuthError::validation("username", "must not be empty"));
    }
    if password.is_some_and(SecretString::is_empty) {
        return Some(AuthError::validation("password", "must not be empty"));
    }
    None
}

fn fail(error: AuthError) -> Resolution<SignInState> {
    Resolution::next(SignInState::Error(SignInError {
        error,
        resume: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::resolve;
    use std::collections::HashMap;

    use gatehouse_types::{
        Action, AuthError, ChallengeData, ChallengeKind, SecretString, SignInAction, SignInError,
        SignInEvent, SignInResumeContext, SignInState, SrpChallenge, SrpKeyPair, SrpStage,
        TotpSetupData, TotpSetupState,
    };

    fn initiate_srp() -> SignInEvent {
        SignInEvent::InitiateSrp {
            username: "alice".into(),
            password: SecretString::new("correct-pw"),
        }
    }

    fn challenge_data(session: &str) -> ChallengeData {
        ChallengeData {
            kind: ChallengeKind::SmsMfa,
            username: "alice".into(),
            session: Some(session.into()),
            parameters: HashMap::new(),
        }
    }

    fn srp_challenge() -> SrpChallenge {
        SrpChallenge {
            username: "alice".into(),
            user_id_for_srp: "user-1".into(),
            salt: "aa".into(),
            server_public_key: "bb".into(),
            secret_block: "cc".into(),
            session: Some("srp-session".into()),
        }
    }

    #[test]
    fn initiate_srp_starts_the_exchange() {
        let resolution = resolve(&SignInState::NotStarted, &initiate_srp());
        assert_eq!(
            resolution.new_state,
            SignInState::SigningInWithSrp(SrpStage::Initiating)
        );
        assert!(matches!(
            resolution.actions.as_slice(),
            [Action::SignIn(SignInAction::InitiateSrpAuth { .. })]
        ));
    }

    #[test]
    fn empty_username_fails_validation_before_any_action() {
        let resolution = resolve(
            &SignInState::NotStarted,
            &SignInEvent::InitiateSrp {
                username: "  ".into(),
                password: SecretString::new("pw"),
            },
        );
        assert!(resolution.actions.is_empty());
        match resolution.new_state {
            SignInState::Error(SignInError {
                error: AuthError::Validation { field, .. },
                ..
            }) => assert_eq!(field, "username"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_password_fails_validation() {
        let resolution = resolve(
            &SignInState::NotStarted,
            &SignInEvent::InitiateSrp {
                username: "alice".into(),
                password: SecretString::new(""),
            },
        );
        assert!(matches!(
            resolution.new_state,
            SignInState::Error(SignInError {
                error: AuthError::Validation { .. },
                ..
            })
        ));
    }

    #[test]
    fn server_srp_half_advances_to_the_verifier_round() {
        let state = SignInState::SigningInWithSrp(SrpStage::Initiating);
        let resolution = resolve(
            &state,
            &SignInEvent::RespondPasswordVerifier {
                challenge: srp_challenge(),
                password: SecretString::new("correct-pw"),
                key_pair: SrpKeyPair {
                    private_key: SecretString::new("a"),
                    public_key: "A".into(),
                },
            },
        );
        assert_eq!(
            resolution.new_state,
            SignInState::SigningInWithSrp(SrpStage::RespondingToVerifier)
        );
        match resolution.actions.as_slice() {
            [Action::SignIn(SignInAction::VerifyPasswordSrp { challenge, .. })] => {
                assert_eq!(challenge.session.as_deref(), Some("srp-session"));
            }
            other => panic!("unexpected actions: {other:?}"),
        }
    }

    #[test]
    fn further_challenge_waits_for_an_answer() {
        let state = SignInState::SigningInWithSrp(SrpStage::RespondingToVerifier);
        let resolution = resolve(
            &state,
            &SignInEvent::ReceivedChallenge(challenge_data("S1")),
        );
        assert_eq!(
            resolution.new_state,
            SignInState::AwaitingChallengeAnswer(challenge_data("S1"))
        );
    }

    #[test]
    fn answer_carries_the_session_token_verbatim() {
        let state = SignInState::AwaitingChallengeAnswer(challenge_data("S1"));
        let resolution = resolve(
            &state,
            &SignInEvent::VerifyChallengeAnswer {
                answer: "123456".into(),
            },
        );
        assert_eq!(resolution.new_state, SignInState::VerifyingChallenge);
        match resolution.actions.as_slice() {
            [Action::SignIn(SignInAction::VerifyChallengeAnswer { data, answer })] => {
                assert_eq!(data.session.as_deref(), Some("S1"));
                assert_eq!(answer, "123456");
            }
            other => panic!("unexpected actions: {other:?}"),
        }
    }

    #[test]
    fn error_preserves_challenge_context_for_retry() {
        let state = SignInState::AwaitingChallengeAnswer(challenge_data("S1"));
        let resolution = resolve(
            &state,
            &SignInEvent::ThrowError {
                error: AuthError::service("CodeMismatchException", "code mismatch"),
                resume: None,
            },
        );
        let SignInState::Error(error) = resolution.new_state else {
            panic!("expected error state");
        };
        assert!(matches!(
            error.resume,
            Some(SignInResumeContext::Challenge(ref data)) if data.session.as_deref() == Some("S1")
        ));
    }

    #[test]
    fn retry_from_error_reuses_the_preserved_session() {
        let state = SignInState::Error(SignInError {
            error: AuthError::service("CodeMismatchException", "code mismatch"),
            resume: Some(SignInResumeContext::Challenge(challenge_data("S1"))),
        });
        let resolution = resolve(
            &state,
            &SignInEvent::VerifyChallengeAnswer {
                answer: "123456".into(),
            },
        );
        assert_eq!(resolution.new_state, SignInState::VerifyingChallenge);
        match resolution.actions.as_slice() {
            [Action::SignIn(SignInAction::VerifyChallengeAnswer { data, .. })] => {
                assert_eq!(data.session.as_deref(), Some("S1"));
            }
            other => panic!("unexpected actions: {other:?}"),
        }
    }

    #[test]
    fn totp_setup_chain_reaches_done() {
        let setup = TotpSetupData {
            username: "alice".into(),
            session: Some("S2".into()),
            secret_code: "SECRET".into(),
        };

        let state = SignInState::VerifyingChallenge;
        let resolution = resolve(
            &state,
            &SignInEvent::InitiateTotpSetup {
                username: "alice".into(),
                session: Some("S2".into()),
            },
        );
        assert_eq!(
            resolution.new_state,
            SignInState::SettingUpTotp(TotpSetupState::SettingUp)
        );

        let resolution = resolve(
            &resolution.new_state,
            &SignInEvent::TotpSecretIssued(setup.clone()),
        );
        assert_eq!(
            resolution.new_state,
            SignInState::SettingUpTotp(TotpSetupState::WaitingForAnswer(setup.clone()))
        );

        let resolution = resolve(
            &resolution.new_state,
            &SignInEvent::VerifyChallengeAnswer {
                answer: "000111".into(),
            },
        );
        assert_eq!(
            resolution.new_state,
            SignInState::SettingUpTotp(TotpSetupState::Verifying(setup.clone()))
        );

        let resolution = resolve(
            &resolution.new_state,
            &SignInEvent::TotpCodeVerified {
                username: "alice".into(),
                session: Some("S3".into()),
            },
        );
        assert!(matches!(
            resolution.new_state,
            SignInState::SettingUpTotp(TotpSetupState::RespondingToAuthChallenge(ref data))
                if data.session.as_deref() == Some("S3")
        ));

        let data = gatehouse_types::SignInData {
            username: "alice".into(),
            user_id: None,
            signed_in_at: chrono::Utc::now(),
            tokens: gatehouse_types::BearerTokens {
                id_token: "id".into(),
                access_token: "access".into(),
                refresh_token: "refresh".into(),
                expires_at: chrono::Utc::now(),
            },
        };
        let resolution = resolve(&resolution.new_state, &SignInEvent::FinalizeSignIn(data));
        assert_eq!(resolution.new_state, SignInState::Done);
    }

    #[test]
    fn totp_error_retains_setup_data_and_resumes() {
        let setup = TotpSetupData {
            username: "alice".into(),
            session: Some("S2".into()),
            secret_code: "SECRET".into(),
        };
        let state = SignInState::SettingUpTotp(TotpSetupState::Verifying(setup.clone()));
        let resolution = resolve(
            &state,
            &SignInEvent::ThrowError {
                error: AuthError::service("CodeMismatchException", "code mismatch"),
                resume: None,
            },
        );
        assert_eq!(
            resolution.new_state,
            SignInState::SettingUpTotp(TotpSetupState::Error {
                error: AuthError::service("CodeMismatchException", "code mismatch"),
                data: Some(setup.clone()),
            })
        );

        let resolution = resolve(
            &resolution.new_state,
            &SignInEvent::VerifyChallengeAnswer {
                answer: "222333".into(),
            },
        );
        assert_eq!(
            resolution.new_state,
            SignInState::SettingUpTotp(TotpSetupState::Verifying(setup))
        );
    }

    #[test]
    fn stray_events_after_completion_are_no_ops() {
        let resolution = resolve(
            &SignInState::Done,
            &SignInEvent::ReceivedChallenge(challenge_data("S9")),
        );
        assert_eq!(resolution.new_state, SignInState::Done);
        assert!(resolution.actions.is_empty());
    }

    #[test]
    fn migration_resume_reuses_the_partial_session() {
        let state = SignInState::Error(SignInError {
            error: AuthError::service("NotAuthorizedException", "expired"),
            resume: Some(SignInResumeContext::Challenge(challenge_data("S1"))),
        });
        let resolution = resolve(
            &state,
            &SignInEvent::InitiateMigration {
                username: "alice".into(),
                password: SecretString::new("pw"),
            },
        );
        assert_eq!(resolution.new_state, SignInState::SigningInWithMigration);
        match resolution.actions.as_slice() {
            [Action::SignIn(SignInAction::InitiateMigrationAuth { session, .. })] => {
                assert_eq!(session.as_deref(), Some("S1"));
            }
            other => panic!("unexpected actions: {other:?}"),
        }
    }
}
