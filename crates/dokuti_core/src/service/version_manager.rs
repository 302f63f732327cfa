//! Version creation and verified content retrieval.
//!
//! # Responsibility
//! - Write new content, record its checksum and advance the latest pointer.
//! - Recompute checksums on every read and refuse mismatched content.
//!
//! # Invariants
//! - Bytes are written under a pre-generated version id before any metadata
//!   row references them. A metadata failure leaves at most an orphaned blob,
//!   never a version row without content.
//! - Content whose checksum does not match is never returned to callers.

use super::error::{DocumentServiceError, ServiceResult};
use crate::checksum::{
    checksum_reader, content_checksum, ensure_supported_algorithm, CHECKSUM_ALGORITHM,
};
use crate::model::document::{Document, Version};
use crate::model::{now_epoch_ms, UserId};
use crate::repo::document_repo::{DocumentRepository, RepoError};
use crate::storage::ContentStore;
use log::{debug, error, info, warn};
use uuid::Uuid;

/// Couples the metadata repository with the content store for one operation.
pub struct VersionManager<'a, R, S> {
    repo: &'a R,
    store: &'a S,
}

impl<'a, R: DocumentRepository, S: ContentStore> VersionManager<'a, R, S> {
    pub fn new(repo: &'a R, store: &'a S) -> Self {
        Self { repo, store }
    }

    /// Stores `content` as a new version and makes it the document's latest.
    ///
    /// The caller owns the surrounding transaction when one is open; metadata
    /// writes here join it.
    pub fn create_version(
        &self,
        document: &mut Document,
        content: &[u8],
        created_by: UserId,
    ) -> ServiceResult<Version> {
        let version = Version {
            id: Uuid::new_v4(),
            document_id: document.id,
            checksum: content_checksum(content),
            checksum_algorithm: CHECKSUM_ALGORITHM.to_string(),
            created_at: now_epoch_ms(),
            created_by,
        };

        if let Err(err) = self.store.store(content, version.document_id, version.id) {
            error!(
                "event=version_create module=service status=error stage=content document_id={} version_id={} error={err}",
                version.document_id, version.id
            );
            return Err(DocumentServiceError::persistence(err));
        }

        self.repo
            .atomically(|repo| -> Result<(), RepoError> {
                repo.insert_version(&version)?;
                repo.set_latest_version(version.document_id, version.id)
            })
            .map_err(|err| {
                error!(
                    "event=version_create module=service status=error stage=metadata document_id={} version_id={} error={err}",
                    version.document_id, version.id
                );
                DocumentServiceError::persistence(err)
            })?;

        document.latest_version_id = Some(version.id);
        info!(
            "event=version_create module=service status=ok document_id={} version_id={} bytes={}",
            version.document_id,
            version.id,
            content.len()
        );
        Ok(version)
    }

    /// Loads the bytes of `version` and verifies them against its checksum.
    pub fn fetch_and_verify(&self, document: &Document, version: &Version) -> ServiceResult<Vec<u8>> {
        if version.document_id != document.id {
            return Err(DocumentServiceError::not_found(
                "document version",
                format!("{}/{}", document.id, version.id),
            ));
        }

        ensure_supported_algorithm(&version.checksum_algorithm)?;
        let reader = self.store.load(document.id, version.id).map_err(|err| {
            warn!(
                "event=content_read module=service status=error document_id={} version_id={} error={err}",
                document.id, version.id
            );
            DocumentServiceError::from(err)
        })?;
        let (content, actual) = checksum_reader(reader)?;

        if actual != version.checksum {
            error!(
                "event=content_verify module=service status=mismatch document_id={} version_id={} expected={} actual={actual}",
                document.id, version.id, version.checksum
            );
            return Err(DocumentServiceError::Integrity {
                document_id: document.id,
                version_id: version.id,
                expected: version.checksum.clone(),
                actual,
            });
        }

        debug!(
            "event=content_verify module=service status=ok document_id={} version_id={} bytes={}",
            document.id,
            version.id,
            content.len()
        );
        Ok(content)
    }
}
