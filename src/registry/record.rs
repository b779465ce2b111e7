use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::Serialize;

/// Lifetime of every issued token, in seconds.
pub const TOKEN_TTL_SECS: i64 = 3600;

/// Raw entropy per token; rendered as twice as many hex characters.
pub const TOKEN_BYTES: usize = 32;

/// One issued session: the token and the customer it is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRecord {
    pub token: String,
    pub customer_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub(crate) fn issue(customer_id: String, now: DateTime<Utc>) -> Self {
        Self {
            token: generate_token(),
            customer_id,
            created_at: now,
            expires_at: now + Duration::seconds(TOKEN_TTL_SECS),
        }
    }

    /// Seconds the token stays valid from issuance.
    pub fn expires_in(&self) -> i64 {
        (self.expires_at - self.created_at).num_seconds()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// 32 bytes from the OS CSPRNG, lowercase hex.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Shortened form safe to put in logs.
pub fn token_prefix(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_format() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_issue_sets_fixed_ttl() {
        let now = Utc::now();
        let record = SessionRecord::issue("cust-1".to_string(), now);
        assert_eq!(record.created_at, now);
        assert_eq!(record.expires_at, now + Duration::seconds(3600));
        assert_eq!(record.expires_in(), 3600);
        assert_eq!(record.customer_id, "cust-1");
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let record = SessionRecord::issue("c".to_string(), now);
        assert!(!record.is_expired_at(record.expires_at));
        assert!(record.is_expired_at(record.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn test_token_prefix() {
        assert_eq!(token_prefix("0123456789abcdef"), "01234567");
        assert_eq!(token_prefix("abc"), "abc");
        assert_eq!(token_prefix(""), "");
    }
}
