//! Filesystem-backed content store.
//!
//! Layout: `<root>/<document_id>/<version_id>.bin`, with in-flight writes
//! staged under `<root>/.partial/` and moved into place by rename.
//!
//! # Invariants
//! - A content file either is absent or holds the complete bytes.
//! - Existing content is never overwritten.

use super::{ContentKey, ContentStore, StorageError, StorageResult, StoredContent};
use crate::model::{now_epoch_ms, DocumentId, VersionId};
use log::{debug, warn};
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use uuid::Uuid;

const PARTIAL_DIR: &str = ".partial";
const CONTENT_EXTENSION: &str = "bin";

/// Content store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Opens (and creates when missing) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        create_dir_all(&root.join(PARTIAL_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final location of one version's content.
    pub fn content_path(&self, document_id: DocumentId, version_id: VersionId) -> PathBuf {
        self.root
            .join(document_id.to_string())
            .join(format!("{version_id}.{CONTENT_EXTENSION}"))
    }

    /// Deletes staged files left behind by interrupted writes.
    ///
    /// Files modified within `min_age` may belong to a write still in flight
    /// and are kept.
    pub fn sweep_partials(&self, min_age: Duration) -> StorageResult<u64> {
        let partial_dir = self.root.join(PARTIAL_DIR);
        let entries = match fs::read_dir(&partial_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(io_error(&partial_dir, err)),
        };
        let grace_ms = i64::try_from(min_age.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now_epoch_ms().saturating_sub(grace_ms);

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|err| io_error(&partial_dir, err))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if modified_epoch_ms(&path).is_some_and(|modified| modified > cutoff) {
                debug!(
                    "event=partial_sweep module=storage status=skipped path={}",
                    path.display()
                );
                continue;
            }
            fs::remove_file(&path).map_err(|err| io_error(&path, err))?;
            removed += 1;
        }
        Ok(removed)
    }

    fn partial_path(&self, version_id: VersionId) -> PathBuf {
        self.root
            .join(PARTIAL_DIR)
            .join(format!("{version_id}.partial"))
    }
}

impl ContentStore for FsContentStore {
    fn store(
        &self,
        content: &[u8],
        document_id: DocumentId,
        version_id: VersionId,
    ) -> StorageResult<()> {
        let key = ContentKey::new(document_id, version_id);
        let dest = self.content_path(document_id, version_id);
        if dest.exists() {
            return Err(StorageError::AlreadyExists(key));
        }
        if let Some(parent) = dest.parent() {
            create_dir_all(parent)?;
        }

        let staged = self.partial_path(version_id);
        {
            let mut file = File::create(&staged).map_err(|err| io_error(&staged, err))?;
            file.write_all(content)
                .map_err(|err| io_error(&staged, err))?;
            file.sync_all().map_err(|err| io_error(&staged, err))?;
        }

        if let Err(err) = fs::rename(&staged, &dest) {
            let _ = fs::remove_file(&staged);
            return Err(io_error(&dest, err));
        }

        debug!(
            "event=content_store module=storage status=ok key={key} size_bytes={}",
            content.len()
        );
        Ok(())
    }

    fn load(
        &self,
        document_id: DocumentId,
        version_id: VersionId,
    ) -> StorageResult<Box<dyn Read + '_>> {
        let path = self.content_path(document_id, version_id);
        match File::open(&path) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(
                ContentKey::new(document_id, version_id),
            )),
            Err(err) => Err(io_error(&path, err)),
        }
    }

    fn remove(&self, document_id: DocumentId, version_id: VersionId) -> StorageResult<bool> {
        let path = self.content_path(document_id, version_id);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(io_error(&path, err)),
        }

        // Drop the document directory once its last version is gone.
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir(parent);
        }
        Ok(true)
    }

    fn list(&self) -> StorageResult<Vec<StoredContent>> {
        let mut stored = Vec::new();
        for document_dir in read_dir(&self.root)? {
            let Some(document_id) = uuid_file_name(&document_dir, None) else {
                if document_dir.file_name().and_then(|name| name.to_str()) != Some(PARTIAL_DIR) {
                    warn!(
                        "event=content_list module=storage status=skip reason=unexpected_entry path={}",
                        document_dir.display()
                    );
                }
                continue;
            };
            if !document_dir.is_dir() {
                continue;
            }

            for content_path in read_dir(&document_dir)? {
                let Some(version_id) = uuid_file_name(&content_path, Some(CONTENT_EXTENSION))
                else {
                    warn!(
                        "event=content_list module=storage status=skip reason=unexpected_entry path={}",
                        content_path.display()
                    );
                    continue;
                };
                stored.push(StoredContent {
                    key: ContentKey::new(document_id, version_id),
                    modified_at_ms: modified_epoch_ms(&content_path),
                });
            }
        }

        stored.sort_by_key(|entry| entry.key);
        Ok(stored)
    }
}

fn read_dir(dir: &Path) -> StorageResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|err| io_error(dir, err))?;
    let mut paths = Vec::new();
    for entry in entries {
        paths.push(entry.map_err(|err| io_error(dir, err))?.path());
    }
    Ok(paths)
}

fn uuid_file_name(path: &Path, extension: Option<&str>) -> Option<Uuid> {
    let stem = match extension {
        Some(expected) => {
            if path.extension().and_then(|ext| ext.to_str()) != Some(expected) {
                return None;
            }
            path.file_stem()?.to_str()?
        }
        None => path.file_name()?.to_str()?,
    };
    Uuid::parse_str(stem).ok()
}

fn modified_epoch_ms(path: &Path) -> Option<i64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let elapsed = modified.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(elapsed.as_millis()).ok()
}

fn create_dir_all(path: &Path) -> StorageResult<()> {
    fs::create_dir_all(path).map_err(|err| io_error(path, err))
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::FsContentStore;
    use crate::storage::{ContentKey, ContentStore, StorageError};
    use std::io::Read;
    use std::time::{Duration, SystemTime};
    use uuid::Uuid;

    #[test]
    fn store_then_load_returns_same_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();
        let (document_id, version_id) = (Uuid::new_v4(), Uuid::new_v4());

        store.store(b"hello", document_id, version_id).unwrap();

        let mut loaded = Vec::new();
        store
            .load(document_id, version_id)
            .unwrap()
            .read_to_end(&mut loaded)
            .unwrap();
        assert_eq!(loaded, b"hello");
    }

    #[test]
    fn load_missing_content_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();
        let key = ContentKey::new(Uuid::new_v4(), Uuid::new_v4());

        let err = store.load(key.document_id, key.version_id).err().unwrap();
        assert!(matches!(err, StorageError::NotFound(found) if found == key));
    }

    #[test]
    fn existing_content_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();
        let (document_id, version_id) = (Uuid::new_v4(), Uuid::new_v4());
        store.store(b"first", document_id, version_id).unwrap();

        let err = store.store(b"second", document_id, version_id).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
    }

    #[test]
    fn list_and_remove_track_stored_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();
        let document_id = Uuid::new_v4();
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        store.store(b"1", document_id, first).unwrap();
        store.store(b"2", document_id, second).unwrap();
        std::fs::write(dir.path().join("README"), b"not content").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|entry| entry.modified_at_ms.is_some()));

        assert!(store.remove(document_id, first).unwrap());
        assert!(!store.remove(document_id, first).unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn sweep_partials_removes_only_stale_staged_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();
        let stale = store.partial_path(Uuid::new_v4());
        let fresh = store.partial_path(Uuid::new_v4());
        std::fs::write(&stale, b"half").unwrap();
        std::fs::write(&fresh, b"in flight").unwrap();
        std::fs::OpenOptions::new()
            .write(true)
            .open(&stale)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(7200))
            .unwrap();

        assert_eq!(store.sweep_partials(Duration::from_secs(3600)).unwrap(), 1);
        assert!(!stale.exists());
        assert!(fresh.exists());

        assert_eq!(store.sweep_partials(Duration::ZERO).unwrap(), 1);
        assert!(!fresh.exists());
        assert_eq!(store.sweep_partials(Duration::ZERO).unwrap(), 0);
    }
}
