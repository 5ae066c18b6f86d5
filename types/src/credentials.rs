//! Credentials: bearer tokens, identity-pool credentials, and the composite
//! the engine caches and persists.
//!
//! A [`Credentials`] value is immutable once constructed and replaced
//! wholesale on every refresh - there is no field-level mutation anywhere, so
//! a reader can never observe a half-updated pair.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::SecretString;

/// Credentials expiring within this many seconds are treated as stale and
/// refreshed proactively instead of being served.
pub const REFRESH_LEAD_TIME_SECS: i64 = 300;

/// Identity-provider logins map: provider name -> token.
pub type LoginsMap = HashMap<String, String>;

fn is_stale(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at - now < Duration::seconds(REFRESH_LEAD_TIME_SECS)
}

/// ID/access/refresh token triple issued by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerTokens {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl BearerTokens {
    /// True when the tokens are inside the refresh lead time (or past
    /// expiry) as of `now`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        is_stale(self.expires_at, now)
    }
}

/// Temporary cloud-access credentials from the identity pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl AwsCredentials {
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        is_stale(self.expires_at, now)
    }
}

/// The record of a completed sign-in: who signed in, when, and the tokens
/// that came back. This is the bearer-token bundle the credential store
/// persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInData {
    pub username: String,
    pub user_id: Option<String>,
    pub signed_in_at: DateTime<Utc>,
    pub tokens: BearerTokens,
}

/// Composite of the optional bearer-token bundle and the optional
/// identity-pool credentials.
///
/// Constructed whole, read-only afterwards. An empty value (both halves
/// absent) is the valid "no credentials" outcome of a store load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    user_pool: Option<SignInData>,
    identity_id: Option<String>,
    aws_credentials: Option<AwsCredentials>,
}

impl Credentials {
    #[must_use]
    pub fn new(
        user_pool: Option<SignInData>,
        identity_id: Option<String>,
        aws_credentials: Option<AwsCredentials>,
    ) -> Self {
        Self {
            user_pool,
            identity_id,
            aws_credentials,
        }
    }

    /// The valid "nothing stored" value.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_user_pool(data: SignInData) -> Self {
        Self::new(Some(data), None, None)
    }

    #[must_use]
    pub fn signed_in_data(&self) -> Option<&SignInData> {
        self.user_pool.as_ref()
    }

    #[must_use]
    pub fn user_pool_tokens(&self) -> Option<&BearerTokens> {
        self.user_pool.as_ref().map(|data| &data.tokens)
    }

    #[must_use]
    pub fn identity_id(&self) -> Option<&str> {
        self.identity_id.as_deref()
    }

    #[must_use]
    pub fn aws_credentials(&self) -> Option<&AwsCredentials> {
        self.aws_credentials.as_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.user_pool.is_none() && self.aws_credentials.is_none()
    }

    /// True when any present half is inside the refresh lead time.
    ///
    /// An empty value never requires a refresh (there is nothing to
    /// refresh); the cold-start fetch path handles that case.
    #[must_use]
    pub fn requires_refresh(&self, now: DateTime<Utc>) -> bool {
        let tokens_stale = self
            .user_pool_tokens()
            .is_some_and(|tokens| tokens.is_stale(now));
        let aws_stale = self
            .aws_credentials
            .as_ref()
            .is_some_and(|creds| creds.is_stale(now));
        tokens_stale || aws_stale
    }
}

#[cfg(test)]
mod tests {
    use super::{AwsCredentials, BearerTokens, Credentials, SignInData};
    use chrono::{DateTime, Duration, Utc};

    fn at(minutes_from_epoch: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::minutes(minutes_from_epoch)
    }

    fn tokens(expires_at: DateTime<Utc>) -> BearerTokens {
        BearerTokens {
            id_token: "id".into(),
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at,
        }
    }

    fn aws(expires_at: DateTime<Utc>) -> AwsCredentials {
        AwsCredentials {
            access_key_id: "AKIA".into(),
            secret_access_key: "secret".into(),
            session_token: "session".into(),
            expires_at,
        }
    }

    fn signed_in(expires_at: DateTime<Utc>) -> SignInData {
        SignInData {
            username: "alice".into(),
            user_id: Some("user-1".into()),
            signed_in_at: at(0),
            tokens: tokens(expires_at),
        }
    }

    #[test]
    fn stale_inside_the_lead_time() {
        let expiry = at(100);
        // Four minutes before expiry: inside the five-minute lead time.
        assert!(tokens(expiry).is_stale(expiry - Duration::minutes(4)));
        // Six minutes before expiry: still fresh.
        assert!(!tokens(expiry).is_stale(expiry - Duration::minutes(6)));
    }

    #[test]
    fn already_expired_is_stale() {
        let expiry = at(100);
        assert!(aws(expiry).is_stale(expiry + Duration::minutes(1)));
    }

    #[test]
    fn composite_refresh_tracks_the_stalest_half() {
        let now = at(100);
        let fresh = now + Duration::hours(1);
        let stale = now + Duration::minutes(2);

        let both_fresh = Credentials::new(
            Some(signed_in(fresh)),
            Some("identity-1".into()),
            Some(aws(fresh)),
        );
        assert!(!both_fresh.requires_refresh(now));

        let aws_stale = Credentials::new(
            Some(signed_in(fresh)),
            Some("identity-1".into()),
            Some(aws(stale)),
        );
        assert!(aws_stale.requires_refresh(now));
    }

    #[test]
    fn empty_credentials_never_require_refresh() {
        assert!(Credentials::none().is_empty());
        assert!(!Credentials::none().requires_refresh(at(0)));
    }

    #[test]
    fn round_trips_through_serde() {
        let creds = Credentials::new(Some(signed_in(at(100))), None, None);
        let json = serde_json::to_string(&creds).unwrap();
        let back: Credentials = serde_json::from_str(&json).unwrap();
        assert_eq!(back, creds);
    }
}
