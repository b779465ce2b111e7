pub mod api_key;
pub mod audit_log;

pub use api_key::{ApiKey, API_KEY_HEADER};
pub use audit_log::AuditLogger;
