use subtle::ConstantTimeEq;

/// Header carrying the shared secret on every administrative request.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared secret gating the token endpoints.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Constant-time comparison against the configured secret. Length
    /// mismatches fail early; the length of the key is not secret.
    pub fn verify(&self, provided: Option<&str>) -> bool {
        match provided {
            Some(candidate) => candidate.as_bytes().ct_eq(self.0.as_bytes()).into(),
            None => false,
        }
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}
