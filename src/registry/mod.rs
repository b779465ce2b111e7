//! In-memory registry of issued handoff tokens.
//!
//! Every record lives for [`TOKEN_TTL_SECS`] after issuance. Expired records
//! are dropped lazily when `check` trips over them, or in bulk by `sweep`.

pub mod clock;
mod record;
pub mod sweeper;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub use clock::{Clock, ManualClock, SystemClock};
pub use record::{generate_token, token_prefix, SessionRecord, TOKEN_BYTES, TOKEN_TTL_SECS};

/// Token is unknown or past its expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid or expired token")]
pub struct InvalidToken;

/// Outcome of a bulk expiry pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub removed: usize,
    pub remaining: usize,
}

#[derive(Debug)]
pub struct TokenRegistry {
    records: RwLock<HashMap<String, SessionRecord>>,
    clock: Arc<dyn Clock>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Issue a fresh token bound to `customer_id`.
    ///
    /// The caller is responsible for rejecting empty ids. A token collision
    /// overwrites the older record.
    pub fn issue(&self, customer_id: impl Into<String>) -> SessionRecord {
        let record = SessionRecord::issue(customer_id.into(), self.clock.now());
        self.write().insert(record.token.clone(), record.clone());
        debug!(
            token = token_prefix(&record.token),
            customer_id = %record.customer_id,
            "token issued"
        );
        record
    }

    /// Resolve `token` to its customer id.
    ///
    /// A live record is left in place so it can be checked again. An expired
    /// one is removed before `InvalidToken` is returned.
    pub fn check(&self, token: &str) -> Result<String, InvalidToken> {
        if token.is_empty() {
            return Err(InvalidToken);
        }
        let now = self.clock.now();
        {
            let records = self.read();
            match records.get(token) {
                None => return Err(InvalidToken),
                Some(record) if !record.is_expired_at(now) => {
                    return Ok(record.customer_id.clone())
                }
                Some(_) => {}
            }
        }

        // Re-check under the write lock: the entry may have been swept or
        // replaced since the read guard was dropped.
        let mut records = self.write();
        if records
            .get(token)
            .is_some_and(|record| record.is_expired_at(now))
        {
            records.remove(token);
            debug!(token = token_prefix(token), "expired token evicted on check");
        }
        Err(InvalidToken)
    }

    /// Drop every expired record.
    pub fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let mut records = self.write();
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        let remaining = records.len();
        SweepReport {
            removed: before - remaining,
            remaining,
        }
    }

    /// Resident records, expired ones included until evicted.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Whether `token` is still stored, regardless of expiry.
    pub fn contains(&self, token: &str) -> bool {
        self.read().contains_key(token)
    }

    // A panicking writer cannot leave a half-inserted record behind, so the
    // map is still consistent after poisoning.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SessionRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SessionRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}
