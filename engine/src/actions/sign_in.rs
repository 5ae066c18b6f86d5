//! Sign-in actions: the SRP exchange, migration and custom auth, challenge
//! answers, and TOTP enrollment.
//!
//! Every respond call carries the server-issued session token verbatim;
//! failures emit `ThrowError` with whatever context allows the resolver to
//! offer a cheap retry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use gatehouse_provider::{
    AssociateSoftwareTokenRequest, AuthFlow, AuthenticationResult, ChallengeName,
    ChallengeResponse, InitiateAuthRequest, RespondToChallengeRequest, UserPoolClient,
    VerifySoftwareTokenRequest, params,
};
use gatehouse_types::{
    AuthError, AuthenticationEvent, BearerTokens, ChallengeData, ChallengeKind, Event,
    SecretString, SignInAction, SignInData, SignInEvent, SignInMechanism, SignInResumeContext,
    SrpChallenge, SrpKeyPair, TotpSetupData, UserPoolConfig,
};

use crate::actions::with_timeout;
use crate::environment::AuthEnvironment;
use crate::machine::EventSender;
use crate::srp::{PasswordClaimRequest, claim_timestamp};

pub(crate) async fn run(action: SignInAction, env: &AuthEnvironment, events: &EventSender) {
    match action {
        SignInAction::Begin(mechanism) => begin(mechanism, events).await,
        SignInAction::InitiateSrpAuth { username, password } => {
            initiate_srp(username, password, env, events).await;
        }
        SignInAction::VerifyPasswordSrp {
            challenge,
            password,
            key_pair,
        } => verify_password_srp(challenge, password, key_pair, env, events).await,
        SignInAction::InitiateMigrationAuth {
            username,
            password,
            session,
        } => initiate_migration(username, password, session, env, events).await,
        SignInAction::InitiateCustomAuth { username } => {
            initiate_custom(username, env, events).await;
        }
        SignInAction::VerifyChallengeAnswer { data, answer } => {
            verify_challenge_answer(data, answer, env, events).await;
        }
        SignInAction::AssociateSoftwareToken { username, session } => {
            associate_software_token(username, session, env, events).await;
        }
        SignInAction::VerifySoftwareToken { data, code } => {
            verify_software_token(data, code, env, events).await;
        }
        SignInAction::RespondToTotpChallenge { username, session } => {
            respond_to_totp_challenge(username, session, env, events).await;
        }
    }
}

async fn begin(mechanism: SignInMechanism, events: &EventSender) {
    let event = match mechanism {
        SignInMechanism::Srp { username, password } => {
            SignInEvent::InitiateSrp { username, password }
        }
        SignInMechanism::Migration { username, password } => {
            SignInEvent::InitiateMigration { username, password }
        }
        SignInMechanism::Custom { username } => SignInEvent::InitiateCustom { username },
    };
    events.send(Event::SignIn(event)).await;
}

async fn fail(events: &EventSender, error: AuthError, resume: Option<SignInResumeContext>) {
    events
        .send(Event::SignIn(SignInEvent::ThrowError { error, resume }))
        .await;
}

fn user_pool(
    env: &AuthEnvironment,
) -> Result<(UserPoolConfig, Arc<dyn UserPoolClient>), AuthError> {
    let config = env
        .config()
        .user_pool()
        .cloned()
        .ok_or_else(|| AuthError::configuration("no user pool configured"))?;
    let client = env.user_pool()?;
    Ok((config, client))
}

async fn initiate_srp(
    username: String,
    password: SecretString,
    env: &AuthEnvironment,
    events: &EventSender,
) {
    let (config, client) = match user_pool(env) {
        Ok(parts) => parts,
        Err(error) => return fail(events, error, None).await,
    };
    let key_pair = env.srp().generate_key_pair();

    let mut parameters = HashMap::new();
    parameters.insert(params::USERNAME.to_string(), username.clone());
    parameters.insert(params::SRP_A.to_string(), key_pair.public_key.clone());
    let request = InitiateAuthRequest {
        client_id: config.client_id().to_string(),
        flow: AuthFlow::UserSrpAuth,
        parameters,
    };

    match with_timeout(client.initiate_auth(request)).await {
        Ok(response) if response.challenge == Some(ChallengeName::PasswordVerifier) => {
            match srp_challenge(&username, &response) {
                Ok(challenge) => {
                    events
                        .send(Event::SignIn(SignInEvent::RespondPasswordVerifier {
                            challenge,
                            password,
                            key_pair,
                        }))
                        .await;
                }
                Err(error) => fail(events, error, None).await,
            }
        }
        Ok(response) => dispatch_outcome(&username, None, response, env, events, None).await,
        Err(error) => fail(events, error, None).await,
    }
}

/// Extract the server's SRP half. A password-verifier challenge missing any
/// of its parameters is an invariant violation, not a user error.
fn srp_challenge(username: &str, response: &ChallengeResponse) -> Result<SrpChallenge, AuthError> {
    let get = |key: &str| {
        response.parameters.get(key).cloned().ok_or_else(|| {
            AuthError::internal(format!("password verifier challenge missing {key}"))
        })
    };
    Ok(SrpChallenge {
        username: response
            .parameters
            .get(params::USERNAME)
            .cloned()
            .unwrap_or_else(|| username.to_string()),
        user_id_for_srp: get(params::USER_ID_FOR_SRP)?,
        salt: get(params::SALT)?,
        server_public_key: get(params::SRP_B)?,
        secret_block: get(params::SECRET_BLOCK)?,
        session: response.session.clone(),
    })
}

async fn verify_password_srp(
    challenge: SrpChallenge,
    password: SecretString,
    key_pair: SrpKeyPair,
    env: &AuthEnvironment,
    events: &EventSender,
) {
    let (config, client) = match user_pool(env) {
        Ok(parts) => parts,
        Err(error) => return fail(events, error, None).await,
    };

    let claim_request = PasswordClaimRequest {
        pool_id: config.pool_id().to_string(),
        user_id: challenge.user_id_for_srp.clone(),
        password,
        salt: challenge.salt.clone(),
        server_public_key: challenge.server_public_key.clone(),
        secret_block: challenge.secret_block.clone(),
        key_pair,
        timestamp: claim_timestamp(env.now()),
    };
    let claim = match env.srp().password_claim(&claim_request) {
        Ok(claim) => claim,
        Err(error) => return fail(events, error, None).await,
    };

    let mut responses = HashMap::new();
    responses.insert(
        params::USERNAME.to_string(),
        challenge.user_id_for_srp.clone(),
    );
    responses.insert(
        params::PASSWORD_CLAIM_SECRET_BLOCK.to_string(),
        challenge.secret_block.clone(),
    );
    responses.insert(
        params::PASSWORD_CLAIM_SIGNATURE.to_string(),
        claim.signature,
    );
    responses.insert(params::TIMESTAMP.to_string(), claim.timestamp);
    let request = RespondToChallengeRequest {
        client_id: config.client_id().to_string(),
        challenge: ChallengeName::PasswordVerifier,
        session: challenge.session.clone(),
        responses,
    };

    let user_id = Some(challenge.user_id_for_srp.clone());
    match with_timeout(client.respond_to_auth_challenge(request)).await {
        Ok(response) => {
            dispatch_outcome(&challenge.username, user_id, response, env, events, None).await;
        }
        Err(error) => fail(events, error, None).await,
    }
}

async fn initiate_migration(
    username: String,
    password: SecretString,
    session: Option<String>,
    env: &AuthEnvironment,
    events: &EventSender,
) {
    let (config, client) = match user_pool(env) {
        Ok(parts) => parts,
        Err(error) => return fail(events, error, None).await,
    };

    let outcome = if let Some(session) = session {
        // A prior partial exchange left a session: answer its challenge
        // with the plaintext credentials instead of starting over.
        let mut responses = HashMap::new();
        responses.insert(params::USERNAME.to_string(), username.clone());
        responses.insert(params::ANSWER.to_string(), password.expose_secret().to_string());
        with_timeout(client.respond_to_auth_challenge(RespondToChallengeRequest {
            client_id: config.client_id().to_string(),
            challenge: ChallengeName::CustomChallenge,
            session: Some(session),
            responses,
        }))
        .await
    } else {
        let mut parameters = HashMap::new();
        parameters.insert(params::USERNAME.to_string(), username.clone());
        parameters.insert(
            params::PASSWORD.to_string(),
            password.expose_secret().to_string(),
        );
        with_timeout(client.initiate_auth(InitiateAuthRequest {
            client_id: config.client_id().to_string(),
            flow: AuthFlow::UserPasswordAuth,
            parameters,
        }))
        .await
    };

    match outcome {
        Ok(response) => dispatch_outcome(&username, None, response, env, events, None).await,
        Err(error) => fail(events, error, None).await,
    }
}

async fn initiate_custom(username: String, env: &AuthEnvironment, events: &EventSender) {
    let (config, client) = match user_pool(env) {
        Ok(parts) => parts,
        Err(error) => return fail(events, error, None).await,
    };
    let mut parameters = HashMap::new();
    parameters.insert(params::USERNAME.to_string(), username.clone());
    let request = InitiateAuthRequest {
        client_id: config.client_id().to_string(),
        flow: AuthFlow::CustomAuth,
        parameters,
    };
    match with_timeout(client.initiate_auth(request)).await {
        Ok(response) => dispatch_outcome(&username, None, response, env, events, None).await,
        Err(error) => fail(events, error, None).await,
    }
}

async fn verify_challenge_answer(
    data: ChallengeData,
    answer: String,
    env: &AuthEnvironment,
    events: &EventSender,
) {
    let resume = Some(SignInResumeContext::Challenge(data.clone()));
    let (config, client) = match user_pool(env) {
        Ok(parts) => parts,
        Err(error) => return fail(events, error, resume).await,
    };

    let (challenge, answer_key) = match data.kind {
        ChallengeKind::SmsMfa => (ChallengeName::SmsMfa, params::SMS_MFA_CODE),
        ChallengeKind::SoftwareTokenMfa => {
            (ChallengeName::SoftwareTokenMfa, params::SOFTWARE_TOKEN_MFA_CODE)
        }
        ChallengeKind::NewPasswordRequired => {
            (ChallengeName::NewPasswordRequired, params::NEW_PASSWORD)
        }
        ChallengeKind::Custom => (ChallengeName::CustomChallenge, params::ANSWER),
        ChallengeKind::MfaSetup => {
            return fail(
                events,
                AuthError::internal("mfa-setup answers flow through totp verification"),
                resume,
            )
            .await;
        }
    };

    let mut responses = HashMap::new();
    responses.insert(params::USERNAME.to_string(), data.username.clone());
    responses.insert(answer_key.to_string(), answer);
    let request = RespondToChallengeRequest {
        client_id: config.client_id().to_string(),
        challenge,
        session: data.session.clone(),
        responses,
    };

    match with_timeout(client.respond_to_auth_challenge(request)).await {
        Ok(response) => {
            dispatch_outcome(&data.username, None, response, env, events, resume).await;
        }
        Err(error) => fail(events, error, resume).await,
    }
}

async fn associate_software_token(
    username: String,
    session: Option<String>,
    env: &AuthEnvironment,
    events: &EventSender,
) {
    let client = match env.user_pool() {
        Ok(client) => client,
        Err(error) => return fail(events, error, None).await,
    };
    let request = AssociateSoftwareTokenRequest {
        session: session.clone(),
    };
    match with_timeout(client.associate_software_token(request)).await {
        Ok(response) => {
            let data = TotpSetupData {
                username,
                session: response.session.or(session),
                secret_code: response.secret_code,
            };
            events
                .send(Event::SignIn(SignInEvent::TotpSecretIssued(data)))
                .await;
        }
        Err(error) => fail(events, error, None).await,
    }
}

async fn verify_software_token(
    data: TotpSetupData,
    code: String,
    env: &AuthEnvironment,
    events: &EventSender,
) {
    let resume = Some(SignInResumeContext::TotpSetup(data.clone()));
    let client = match env.user_pool() {
        Ok(client) => client,
        Err(error) => return fail(events, error, resume).await,
    };
    let request = VerifySoftwareTokenRequest {
        session: data.session.clone(),
        user_code: code,
    };
    match with_timeout(client.verify_software_token(request)).await {
        Ok(response) => {
            events
                .send(Event::SignIn(SignInEvent::TotpCodeVerified {
                    username: data.username.clone(),
                    session: response.session.or(data.session.clone()),
                }))
                .await;
        }
        Err(error) => fail(events, error, resume).await,
    }
}

async fn respond_to_totp_challenge(
    username: String,
    session: Option<String>,
    env: &AuthEnvironment,
    events: &EventSender,
) {
    let (config, client) = match user_pool(env) {
        Ok(parts) => parts,
        Err(error) => return fail(events, error, None).await,
    };
    let mut responses = HashMap::new();
    responses.insert(params::USERNAME.to_string(), username.clone());
    let request = RespondToChallengeRequest {
        client_id: config.client_id().to_string(),
        challenge: ChallengeName::MfaSetup,
        session,
        responses,
    };
    match with_timeout(client.respond_to_auth_challenge(request)).await {
        Ok(response) => dispatch_outcome(&username, None, response, env, events, None).await,
        Err(error) => fail(events, error, None).await,
    }
}

/// Shared completion router for initiate/respond responses: tokens finish
/// the sign-in, a follow-up challenge re-enters the waiting state, and
/// MFA setup branches into TOTP enrollment.
async fn dispatch_outcome(
    username: &str,
    user_id: Option<String>,
    response: ChallengeResponse,
    env: &AuthEnvironment,
    events: &EventSender,
    resume: Option<SignInResumeContext>,
) {
    if let Some(result) = response.result {
        match sign_in_data(username, user_id, result, env.now()) {
            Ok(data) => {
                events
                    .send(Event::SignIn(SignInEvent::FinalizeSignIn(data.clone())))
                    .await;
                events
                    .send(Event::Authentication(AuthenticationEvent::SignInCompleted(
                        data,
                    )))
                    .await;
            }
            Err(error) => fail(events, error, resume).await,
        }
        return;
    }

    match response.challenge.and_then(challenge_kind) {
        Some(ChallengeKind::MfaSetup) => {
            events
                .send(Event::SignIn(SignInEvent::InitiateTotpSetup {
                    username: username.to_string(),
                    session: response.session,
                }))
                .await;
        }
        Some(kind) => {
            events
                .send(Event::SignIn(SignInEvent::ReceivedChallenge(ChallengeData {
                    kind,
                    username: username.to_string(),
                    session: response.session,
                    parameters: response.parameters,
                })))
                .await;
        }
        None => {
            fail(
                events,
                AuthError::internal("auth response carried neither tokens nor a challenge"),
                resume,
            )
            .await;
        }
    }
}

fn challenge_kind(name: ChallengeName) -> Option<ChallengeKind> {
    match name {
        ChallengeName::SmsMfa => Some(ChallengeKind::SmsMfa),
        ChallengeName::SoftwareTokenMfa => Some(ChallengeKind::SoftwareTokenMfa),
        ChallengeName::NewPasswordRequired => Some(ChallengeKind::NewPasswordRequired),
        ChallengeName::CustomChallenge => Some(ChallengeKind::Custom),
        ChallengeName::MfaSetup => Some(ChallengeKind::MfaSetup),
        // A verifier challenge outside the SRP exchange is malformed.
        ChallengeName::PasswordVerifier => None,
    }
}

fn sign_in_data(
    username: &str,
    user_id: Option<String>,
    result: AuthenticationResult,
    now: DateTime<Utc>,
) -> Result<SignInData, AuthError> {
    let refresh_token = result
        .refresh_token
        .ok_or_else(|| AuthError::internal("authentication result missing refresh token"))?;
    Ok(SignInData {
        username: username.to_string(),
        user_id,
        signed_in_at: now,
        tokens: BearerTokens {
            id_token: result.id_token,
            access_token: result.access_token,
            refresh_token,
            expires_at: now + Duration::seconds(result.expires_in_secs),
        },
    })
}
