//! Typed failures surfaced by the document services.
//!
//! Callers map variants to responses without inspecting messages:
//! `NotAuthorized` (may not do this), `NotFound` (does not exist) and
//! `Integrity` (stored content is corrupt) are always distinct.

use crate::checksum::ChecksumError;
use crate::model::permission::DocumentPermission;
use crate::model::{DocumentId, UserId, VersionId};
use crate::repo::document_repo::RepoError;
use crate::storage::StorageError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, DocumentServiceError>;

/// Service error for document lifecycle use-cases.
#[derive(Debug)]
pub enum DocumentServiceError {
    /// Entity absent (document, version, content, group membership, ...).
    NotFound { entity: &'static str, id: String },
    /// Acting user lacks a granted entry of the required permission kind.
    NotAuthorized {
        user_id: UserId,
        document_id: DocumentId,
        permission: DocumentPermission,
    },
    /// Stored content no longer matches its recorded checksum.
    Integrity {
        document_id: DocumentId,
        version_id: VersionId,
        expected: String,
        actual: String,
    },
    /// Checksum could not be computed.
    IntegrityComputation(ChecksumError),
    /// Caller-supplied value failed validation.
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
    /// Metadata or byte store failure.
    Persistence(PersistenceError),
}

/// Underlying store failure wrapped by `DocumentServiceError::Persistence`.
#[derive(Debug)]
pub enum PersistenceError {
    Repo(RepoError),
    Storage(StorageError),
    /// A committed write could not be read back.
    InconsistentState(&'static str),
}

impl DocumentServiceError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Wraps any store failure as `Persistence`, including repository
    /// not-found results that indicate a half-written state.
    pub(crate) fn persistence(err: impl Into<PersistenceError>) -> Self {
        Self::Persistence(err.into())
    }

    /// Stable machine-readable code for logs and transport mapping.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::NotAuthorized { .. } => "not_authorized",
            Self::Integrity { .. } => "integrity_failed",
            Self::IntegrityComputation(_) => "integrity_computation_failed",
            Self::InvalidValue { .. } => "invalid_value",
            Self::Persistence(_) => "persistence_failed",
        }
    }
}

impl Display for DocumentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::NotAuthorized {
                user_id,
                document_id,
                permission,
            } => write!(
                f,
                "user {user_id} lacks `{}` permission on document {document_id}",
                permission.as_str()
            ),
            Self::Integrity {
                document_id,
                version_id,
                expected,
                actual,
            } => write!(
                f,
                "content checksum mismatch for {document_id}/{version_id}: expected {expected}, computed {actual}"
            ),
            Self::IntegrityComputation(err) => write!(f, "{err}"),
            Self::InvalidValue {
                field,
                value,
                reason,
            } => write!(f, "invalid value `{value}` for {field}: expected {reason}"),
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DocumentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::IntegrityComputation(err) => Some(err),
            Self::Persistence(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "metadata store failure: {err}"),
            Self::Storage(err) => write!(f, "content store failure: {err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent document state: {details}"),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::InconsistentState(_) => None,
        }
    }
}

impl From<RepoError> for PersistenceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<StorageError> for PersistenceError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<RepoError> for DocumentServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Persistence(PersistenceError::Repo(other)),
        }
    }
}

impl From<StorageError> for DocumentServiceError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(key) => Self::not_found("content", key),
            other => Self::Persistence(PersistenceError::Storage(other)),
        }
    }
}

impl From<ChecksumError> for DocumentServiceError {
    fn from(value: ChecksumError) -> Self {
        Self::IntegrityComputation(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentServiceError, PersistenceError};
    use crate::repo::document_repo::RepoError;
    use crate::storage::{ContentKey, StorageError};
    use uuid::Uuid;

    #[test]
    fn repository_not_found_stays_not_found() {
        let err = DocumentServiceError::from(RepoError::NotFound {
            entity: "document",
            id: "x".to_string(),
        });
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn missing_content_maps_to_not_found_other_storage_failures_to_persistence() {
        let key = ContentKey::new(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(
            DocumentServiceError::from(StorageError::NotFound(key)).code(),
            "not_found"
        );

        let err = DocumentServiceError::from(StorageError::AlreadyExists(key));
        assert!(matches!(
            err,
            DocumentServiceError::Persistence(PersistenceError::Storage(_))
        ));
    }

    #[test]
    fn explicit_persistence_wraps_repository_not_found() {
        let err = DocumentServiceError::persistence(RepoError::NotFound {
            entity: "document",
            id: "x".to_string(),
        });
        assert_eq!(err.code(), "persistence_failed");
    }
}
