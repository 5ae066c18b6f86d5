//! Validated configuration for the auth engine.
//!
//! Raw deserialization structs (with `Option` fields) stay private; the
//! public types are resolved at the parse boundary via `#[serde(try_from)]`,
//! so holding an [`AuthConfig`] is the proof that it is valid. Loading the
//! raw data from disk or a bundle is the embedder's concern.

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Deserialize)]
struct RawUserPoolConfig {
    pool_id: String,
    client_id: String,
    region: String,
}

/// Validated user-pool (user directory) configuration.
///
/// Invariant: all fields are non-empty (enforced at the deserialization
/// boundary and in [`UserPoolConfig::new`]).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawUserPoolConfig")]
pub struct UserPoolConfig {
    pool_id: String,
    client_id: String,
    region: String,
}

impl TryFrom<RawUserPoolConfig> for UserPoolConfig {
    type Error = ConfigError;

    fn try_from(raw: RawUserPoolConfig) -> Result<Self, Self::Error> {
        Self::new(raw.pool_id, raw.client_id, raw.region)
    }
}

impl UserPoolConfig {
    pub fn new(
        pool_id: impl Into<String>,
        client_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let pool_id = pool_id.into();
        let client_id = client_id.into();
        let region = region.into();
        if pool_id.trim().is_empty() {
            return Err(ConfigError::EmptyUserPoolField("pool_id"));
        }
        if client_id.trim().is_empty() {
            return Err(ConfigError::EmptyUserPoolField("client_id"));
        }
        if region.trim().is_empty() {
            return Err(ConfigError::EmptyUserPoolField("region"));
        }
        Ok(Self {
            pool_id,
            client_id,
            region,
        })
    }

    #[must_use]
    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The key under which this pool's tokens appear in an identity-pool
    /// logins map.
    #[must_use]
    pub fn identity_provider_name(&self) -> String {
        format!("cognito-idp.{}.amazonaws.com/{}", self.region, self.pool_id)
    }
}

#[derive(Deserialize)]
struct RawIdentityPoolConfig {
    pool_id: String,
    region: String,
}

/// Validated identity-pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawIdentityPoolConfig")]
pub struct IdentityPoolConfig {
    pool_id: String,
    region: String,
}

impl TryFrom<RawIdentityPoolConfig> for IdentityPoolConfig {
    type Error = ConfigError;

    fn try_from(raw: RawIdentityPoolConfig) -> Result<Self, Self::Error> {
        Self::new(raw.pool_id, raw.region)
    }
}

impl IdentityPoolConfig {
    pub fn new(
        pool_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let pool_id = pool_id.into();
        let region = region.into();
        if pool_id.trim().is_empty() {
            return Err(ConfigError::EmptyIdentityPoolField("pool_id"));
        }
        if region.trim().is_empty() {
            return Err(ConfigError::EmptyIdentityPoolField("region"));
        }
        Ok(Self { pool_id, region })
    }

    #[must_use]
    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }
}

#[derive(Deserialize)]
struct RawAuthConfig {
    user_pool: Option<UserPoolConfig>,
    identity_pool: Option<IdentityPoolConfig>,
}

/// Top-level auth configuration: a user pool, an identity pool, or both.
///
/// The three legal combinations drive the configuration fan-out: an
/// identity-pool-only setup skips authentication configuration entirely and
/// goes straight to authorization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawAuthConfig")]
pub struct AuthConfig {
    user_pool: Option<UserPoolConfig>,
    identity_pool: Option<IdentityPoolConfig>,
}

impl TryFrom<RawAuthConfig> for AuthConfig {
    type Error = ConfigError;

    fn try_from(raw: RawAuthConfig) -> Result<Self, Self::Error> {
        Self::new(raw.user_pool, raw.identity_pool)
    }
}

impl AuthConfig {
    pub fn new(
        user_pool: Option<UserPoolConfig>,
        identity_pool: Option<IdentityPoolConfig>,
    ) -> Result<Self, ConfigError> {
        if user_pool.is_none() && identity_pool.is_none() {
            return Err(ConfigError::NothingConfigured);
        }
        Ok(Self {
            user_pool,
            identity_pool,
        })
    }

    #[must_use]
    pub fn user_pool(&self) -> Option<&UserPoolConfig> {
        self.user_pool.as_ref()
    }

    #[must_use]
    pub fn identity_pool(&self) -> Option<&IdentityPoolConfig> {
        self.identity_pool.as_ref()
    }

    #[must_use]
    pub fn has_user_pool(&self) -> bool {
        self.user_pool.is_some()
    }

    #[must_use]
    pub fn has_identity_pool(&self) -> bool {
        self.identity_pool.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthConfig, IdentityPoolConfig, UserPoolConfig};
    use crate::error::ConfigError;

    fn user_pool() -> UserPoolConfig {
        UserPoolConfig::new("us-east-1_Example", "client-abc", "us-east-1").unwrap()
    }

    #[test]
    fn rejects_fully_empty_config() {
        assert_eq!(
            AuthConfig::new(None, None).unwrap_err(),
            ConfigError::NothingConfigured
        );
    }

    #[test]
    fn rejects_blank_pool_id() {
        let err = UserPoolConfig::new("  ", "client", "us-east-1").unwrap_err();
        assert_eq!(err, ConfigError::EmptyUserPoolField("pool_id"));
    }

    #[test]
    fn identity_pool_only_is_valid() {
        let identity = IdentityPoolConfig::new("us-east-1:guid", "us-east-1").unwrap();
        let config = AuthConfig::new(None, Some(identity)).unwrap();
        assert!(!config.has_user_pool());
        assert!(config.has_identity_pool());
    }

    #[test]
    fn deserializes_through_validation() {
        let json = r#"{
            "user_pool": {
                "pool_id": "us-east-1_Example",
                "client_id": "client-abc",
                "region": "us-east-1"
            },
            "identity_pool": null
        }"#;
        let config: AuthConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.user_pool(), Some(&user_pool()));
    }

    #[test]
    fn deserialization_surfaces_validation_errors() {
        let json = r#"{ "user_pool": null, "identity_pool": null }"#;
        let parsed: Result<AuthConfig, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn provider_name_includes_region_and_pool() {
        assert_eq!(
            user_pool().identity_provider_name(),
            "cognito-idp.us-east-1.amazonaws.com/us-east-1_Example"
        );
    }
}
