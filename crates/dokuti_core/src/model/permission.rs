//! Per-document permission kinds and entries.
//!
//! # Invariants
//! - Permission kinds form a closed set; `DocumentPermission::ALL` lists every
//!   variant exactly once.
//! - Kinds are independent grants. `Write` implies nothing about `Read`.

use super::{DocumentId, UserId};
use serde::{Deserialize, Serialize};

/// Capability a user can hold on one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentPermission {
    /// Read metadata and content.
    Read,
    /// Create versions and change metadata or group membership.
    Write,
    /// Archive or delete the document (enforced by outer layers).
    Delete,
    /// Share the document with other users (enforced by outer layers).
    Share,
    /// Grant and revoke permissions on the document.
    Admin,
}

impl DocumentPermission {
    /// Every permission kind, in declaration order.
    pub const ALL: [DocumentPermission; 5] = [
        DocumentPermission::Read,
        DocumentPermission::Write,
        DocumentPermission::Delete,
        DocumentPermission::Share,
        DocumentPermission::Admin,
    ];

    /// Stable storage value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Share => "share",
            Self::Admin => "admin",
        }
    }

    /// Parses a stored permission value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            "delete" => Some(Self::Delete),
            "share" => Some(Self::Share),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// One permission record for `(document, user, permission)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEntry {
    pub document_id: DocumentId,
    pub user_id: UserId,
    pub permission: DocumentPermission,
    /// Revoked entries stay on record with `granted = false`.
    pub granted: bool,
    pub granted_by: UserId,
}

impl PermissionEntry {
    pub fn granted(
        document_id: DocumentId,
        user_id: UserId,
        permission: DocumentPermission,
        granted_by: UserId,
    ) -> Self {
        Self {
            document_id,
            user_id,
            permission,
            granted: true,
            granted_by,
        }
    }

    pub fn revoked(
        document_id: DocumentId,
        user_id: UserId,
        permission: DocumentPermission,
        revoked_by: UserId,
    ) -> Self {
        Self {
            granted: false,
            ..Self::granted(document_id, user_id, permission, revoked_by)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DocumentPermission;
    use std::collections::BTreeSet;

    #[test]
    fn all_lists_each_kind_once_and_round_trips_storage_values() {
        let unique: BTreeSet<_> = DocumentPermission::ALL.iter().copied().collect();
        assert_eq!(unique.len(), DocumentPermission::ALL.len());

        for permission in DocumentPermission::ALL {
            assert_eq!(
                DocumentPermission::parse(permission.as_str()),
                Some(permission)
            );
        }
    }

    #[test]
    fn parse_rejects_unknown_values() {
        assert_eq!(DocumentPermission::parse("READ"), None);
        assert_eq!(DocumentPermission::parse("owner"), None);
    }
}
