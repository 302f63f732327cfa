//! Domain model for versioned documents.
//!
//! # Responsibility
//! - Define canonical records shared by repository, storage and services.
//! - Keep identity types explicit in signatures.
//!
//! # Invariants
//! - Every record is identified by a stable UUID that is never reused.
//! - Versions are append-only; nothing in the model mutates a stored digest.

pub mod attribute;
pub mod document;
pub mod permission;

use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier of a document container.
pub type DocumentId = Uuid;
/// Stable identifier of one immutable content version.
pub type VersionId = Uuid;
/// Identity of an already-authenticated acting user.
pub type UserId = Uuid;
/// Stable identifier of a document group.
pub type GroupId = Uuid;

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
