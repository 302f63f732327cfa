//! Byte store contract for version content.
//!
//! # Responsibility
//! - Define how version content is written, streamed back and enumerated.
//! - Keep the physical medium behind the `ContentStore` trait.
//!
//! # Invariants
//! - Content is keyed by `(document_id, version_id)` and written once.
//! - A missing key is reported as `StorageError::NotFound`, never as empty
//!   content.

use crate::model::{DocumentId, VersionId};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Read;
use std::path::PathBuf;

pub mod fs_store;

pub use fs_store::FsContentStore;

pub type StorageResult<T> = Result<T, StorageError>;

/// Location of one version's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentKey {
    pub document_id: DocumentId,
    pub version_id: VersionId,
}

impl ContentKey {
    pub fn new(document_id: DocumentId, version_id: VersionId) -> Self {
        Self {
            document_id,
            version_id,
        }
    }
}

impl Display for ContentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.document_id, self.version_id)
    }
}

/// One stored content entry as reported by `ContentStore::list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredContent {
    pub key: ContentKey,
    /// Last modification time in Unix epoch milliseconds, when known.
    pub modified_at_ms: Option<i64>,
}

/// Byte store error.
#[derive(Debug)]
pub enum StorageError {
    NotFound(ContentKey),
    AlreadyExists(ContentKey),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(key) => write!(f, "content not found: {key}"),
            Self::AlreadyExists(key) => write!(f, "content already stored: {key}"),
            Self::Io { path, source } => {
                write!(f, "content store I/O failure at `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::NotFound(_) | Self::AlreadyExists(_) => None,
        }
    }
}

/// Persistence backend for version content.
pub trait ContentStore {
    /// Writes `content` under `(document_id, version_id)`.
    fn store(
        &self,
        content: &[u8],
        document_id: DocumentId,
        version_id: VersionId,
    ) -> StorageResult<()>;

    /// Opens a stream over previously stored content.
    fn load(
        &self,
        document_id: DocumentId,
        version_id: VersionId,
    ) -> StorageResult<Box<dyn Read + '_>>;

    /// Removes stored content. Returns `false` when nothing was stored.
    fn remove(&self, document_id: DocumentId, version_id: VersionId) -> StorageResult<bool>;

    /// Enumerates all stored content entries.
    fn list(&self) -> StorageResult<Vec<StoredContent>>;
}
