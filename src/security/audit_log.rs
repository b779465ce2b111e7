use tracing::{info, warn};

use crate::registry::token_prefix;

/// Security-relevant events, emitted under the `audit` target.
#[derive(Debug, Clone, Default)]
pub struct AuditLogger;

impl AuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn auth_failure(&self, client: &str, route: &str, reason: &str) {
        warn!(target: "audit", event = "auth_failure", client, route, reason);
    }

    pub fn token_issued(&self, customer_id: &str, token: &str) {
        info!(target: "audit", event = "token_issued", customer_id, token = token_prefix(token));
    }

    pub fn token_rejected(&self, token: &str) {
        warn!(target: "audit", event = "token_rejected", token = token_prefix(token));
    }

    pub fn tokens_swept(&self, removed: usize, remaining: usize) {
        info!(target: "audit", event = "tokens_swept", removed, remaining);
    }
}
