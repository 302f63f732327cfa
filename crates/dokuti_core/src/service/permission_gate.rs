//! Per-document authorization checks.
//!
//! # Invariants
//! - Default deny: no granted entry of the exact kind means `false`.
//! - Kinds are independent; no kind implies another.
//! - Every check is one indexed lookup on `(document, user, permission)`.

use super::error::{DocumentServiceError, ServiceResult};
use crate::model::document::Document;
use crate::model::permission::{DocumentPermission, PermissionEntry};
use crate::model::UserId;
use crate::repo::document_repo::{DocumentRepository, RepoResult};
use log::{debug, warn};

/// Answers authorization questions against the permission store.
pub struct PermissionGate<'r, R> {
    repo: &'r R,
}

impl<'r, R: DocumentRepository> PermissionGate<'r, R> {
    pub fn new(repo: &'r R) -> Self {
        Self { repo }
    }

    pub fn has_permission(
        &self,
        document: &Document,
        user: UserId,
        permission: DocumentPermission,
    ) -> RepoResult<bool> {
        self.repo.has_permission(document.id, user, permission)
    }

    pub fn can_read(&self, document: &Document, user: UserId) -> RepoResult<bool> {
        self.has_permission(document, user, DocumentPermission::Read)
    }

    pub fn can_write(&self, document: &Document, user: UserId) -> RepoResult<bool> {
        self.has_permission(document, user, DocumentPermission::Write)
    }

    /// Fails with `NotAuthorized` unless `user` holds `permission`.
    pub fn require(
        &self,
        document: &Document,
        user: UserId,
        permission: DocumentPermission,
    ) -> ServiceResult<()> {
        if self
            .has_permission(document, user, permission)
            .map_err(DocumentServiceError::persistence)?
        {
            return Ok(());
        }

        warn!(
            "event=permission_check module=service status=denied document_id={} user_id={user} permission={}",
            document.id,
            permission.as_str()
        );
        Err(DocumentServiceError::NotAuthorized {
            user_id: user,
            document_id: document.id,
            permission,
        })
    }

    /// Grants every permission kind to `subject`. Used once, at creation.
    pub fn grant_all_permissions(
        &self,
        document: &Document,
        subject: UserId,
        granting_user: UserId,
    ) -> RepoResult<Vec<PermissionEntry>> {
        DocumentPermission::ALL
            .iter()
            .map(|&permission| self.grant(document, subject, permission, granting_user))
            .collect()
    }

    pub fn grant(
        &self,
        document: &Document,
        subject: UserId,
        permission: DocumentPermission,
        granting_user: UserId,
    ) -> RepoResult<PermissionEntry> {
        let entry = PermissionEntry::granted(document.id, subject, permission, granting_user);
        self.repo.upsert_permission(&entry)?;
        debug!(
            "event=permission_grant module=service status=ok document_id={} subject={subject} permission={} granted_by={granting_user}",
            document.id,
            permission.as_str()
        );
        Ok(entry)
    }

    pub fn revoke(
        &self,
        document: &Document,
        subject: UserId,
        permission: DocumentPermission,
        revoking_user: UserId,
    ) -> RepoResult<PermissionEntry> {
        let entry = PermissionEntry::revoked(document.id, subject, permission, revoking_user);
        self.repo.upsert_permission(&entry)?;
        debug!(
            "event=permission_revoke module=service status=ok document_id={} subject={subject} permission={} revoked_by={revoking_user}",
            document.id,
            permission.as_str()
        );
        Ok(entry)
    }
}
