//! SRP contract.
//!
//! The cryptographic primitives (big-integer exponentiation, HMAC key
//! derivation) are a supplied library; the engine only depends on this
//! trait. Actions generate the ephemeral key pair before the initiate call
//! and compute the password claim when the server's half arrives - the
//! resolver never sees key material beyond the opaque values carried in
//! events.

use chrono::{DateTime, Utc};

use gatehouse_types::{AuthError, SecretString, SrpKeyPair};

/// Inputs to the password-claim computation, assembled by the verify
/// action from the server challenge and the retained client half.
#[derive(Debug, Clone)]
pub struct PasswordClaimRequest {
    pub pool_id: String,
    pub user_id: String,
    pub password: SecretString,
    pub salt: String,
    pub server_public_key: String,
    pub secret_block: String,
    pub key_pair: SrpKeyPair,
    pub timestamp: String,
}

/// The computed proof: signature over the secret block, bound to the
/// timestamp it was computed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordClaim {
    pub signature: String,
    pub timestamp: String,
}

/// The supplied SRP implementation.
pub trait SrpSuite: Send + Sync {
    /// Fresh ephemeral client key pair for one exchange.
    fn generate_key_pair(&self) -> SrpKeyPair;

    /// Shared secret plus HMAC proof for the password verifier round.
    fn password_claim(&self, request: &PasswordClaimRequest) -> Result<PasswordClaim, AuthError>;
}

/// Timestamp format the verifier binds the claim to, e.g.
/// `Sun Jan 4 09:05:00 UTC 2026`. Single-digit days are unpadded.
#[must_use]
pub fn claim_timestamp(now: DateTime<Utc>) -> String {
    now.format("%a %b %-d %H:%M:%S UTC %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::claim_timestamp;
    use chrono::{TimeZone, Utc};

    #[test]
    fn timestamp_matches_the_verifier_format() {
        let moment = Utc.with_ymd_and_hms(2026, 1, 4, 9, 5, 0).unwrap();
        assert_eq!(claim_timestamp(moment), "Sun Jan 4 09:05:00 UTC 2026");
    }

    #[test]
    fn double_digit_days_are_not_padded_differently() {
        let moment = Utc.with_ymd_and_hms(2026, 3, 17, 23, 59, 59).unwrap();
        assert_eq!(claim_timestamp(moment), "Tue Mar 17 23:59:59 UTC 2026");
    }
}
