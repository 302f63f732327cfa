//! Document container and version records.
//!
//! # Responsibility
//! - Define the document aggregate returned to callers.
//! - Define immutable version records and group references.
//!
//! # Invariants
//! - A persisted document has `latest_version_id = Some(_)`; `None` only exists
//!   inside the creation transaction.
//! - `Version::document_id` and `Version::checksum` never change after creation.
//! - `tags` are lowercase, trimmed and sorted.

use super::attribute::AttributeAssociation;
use super::permission::DocumentPermission;
use super::{now_epoch_ms, DocumentId, GroupId, UserId, VersionId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Named content container with metadata, permissions and version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    /// Cleaned file name of the most recent upload.
    pub name: String,
    pub description: String,
    pub content_type: String,
    /// Last user that changed the document.
    pub updated_by: UserId,
    pub latest_version_id: Option<VersionId>,
    /// Granted permission kinds keyed by subject user.
    pub permissions: BTreeMap<UserId, BTreeSet<DocumentPermission>>,
    pub attributes: Vec<AttributeAssociation>,
    pub tags: Vec<String>,
    pub groups: Vec<Group>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Document {
    /// Creates an unsaved document with a generated stable id.
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        description: impl Into<String>,
        updated_by: UserId,
    ) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            content_type: content_type.into(),
            updated_by,
            latest_version_id: None,
            permissions: BTreeMap::new(),
            attributes: Vec::new(),
            tags: Vec::new(),
            groups: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Records `user` as the latest modifier.
    pub fn touch(&mut self, user: UserId) {
        self.updated_by = user;
        self.updated_at = now_epoch_ms();
    }

    pub fn is_member_of(&self, group_id: GroupId) -> bool {
        self.groups.iter().any(|group| group.id == group_id)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeAssociation> {
        self.attributes
            .iter()
            .find(|association| association.attribute_name == name)
    }

    /// Granted kinds for `user` as loaded with the document.
    ///
    /// Authorization decisions go through `PermissionGate`, which queries the
    /// store instead of this snapshot.
    pub fn granted_permissions(&self, user: UserId) -> BTreeSet<DocumentPermission> {
        self.permissions.get(&user).cloned().unwrap_or_default()
    }
}

/// One immutable snapshot of document content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: VersionId,
    pub document_id: DocumentId,
    /// Lowercase hex digest of the stored content.
    pub checksum: String,
    /// Algorithm that produced `checksum`.
    pub checksum_algorithm: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub created_by: UserId,
}

/// Named container documents can be members of.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// Normalizes an uploaded file name into a document name.
///
/// Backslashes become `/`, empty and `.` segments are dropped and `..` removes
/// the preceding segment when there is one.
pub fn clean_file_name(raw: &str) -> String {
    let unified = raw.trim().replace('\\', "/");
    let absolute = unified.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Normalizes one tag value: trimmed and lowercased, `None` when blank.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes, deduplicates and sorts tag values, dropping blanks.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let unique: BTreeSet<String> = tags.iter().filter_map(|tag| normalize_tag(tag)).collect();
    unique.into_iter().collect()
}
