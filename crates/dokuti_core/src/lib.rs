//! Core domain logic for Dokuti versioned documents.
//! This crate is the single source of truth for document, version and
//! permission invariants.

pub mod checksum;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;
pub mod storage;

pub use checksum::{content_checksum, ChecksumError, CHECKSUM_ALGORITHM};
pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::attribute::{
    AllowedValues, AnyValue, AttributeAssociation, AttributeDefinition,
    AttributeDefinitionProvider, AttributeRegistry, AttributeValueRule, MaxLength, PatternRule,
};
pub use model::document::{Document, Group, Version};
pub use model::permission::{DocumentPermission, PermissionEntry};
pub use model::{DocumentId, GroupId, UserId, VersionId};
pub use query::{DocumentFilter, DocumentPredicate, Page, PageRequest, SortDirection, SortField};
pub use repo::document_repo::{
    DocumentRepository, RepoError, RepoResult, SqliteDocumentRepository,
};
pub use service::document_service::{
    ContentUpload, DocumentListQuery, DocumentService, SweepReport,
};
pub use service::error::{DocumentServiceError, PersistenceError, ServiceResult};
pub use storage::{ContentStore, FsContentStore, StorageError};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
