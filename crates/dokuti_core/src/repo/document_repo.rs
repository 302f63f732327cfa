//! Document metadata repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist documents, versions, permission entries and label associations.
//! - Answer indexed permission lookups without loading the document graph.
//! - Execute compiled listing filters with pagination.
//!
//! # Invariants
//! - Version rows are insert-only (enforced by schema triggers too).
//! - `latest_version_id` can only point at a version of the same document.
//! - Read paths reject malformed persisted data instead of masking it.

use crate::db::DbError;
use crate::model::attribute::AttributeAssociation;
use crate::model::document::{Document, Group, Version};
use crate::model::permission::{DocumentPermission, PermissionEntry};
use crate::model::{DocumentId, GroupId, UserId, VersionId};
use crate::query::{DocumentFilter, Page, PageRequest};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const DOCUMENT_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    content_type,
    updated_by,
    latest_version_id,
    created_at,
    updated_at
FROM documents";

const VERSION_SELECT_SQL: &str = "SELECT
    id,
    document_id,
    checksum,
    checksum_algorithm,
    created_at,
    created_by
FROM document_versions";

const REQUIRED_TABLES: &[&str] = &[
    "documents",
    "document_versions",
    "document_permissions",
    "attributes",
    "document_attributes",
    "tags",
    "document_tags",
    "group_definitions",
    "group_memberships",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for document metadata persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound { entity: &'static str, id: String },
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "metadata schema is missing table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound { .. } | Self::InvalidData(_) | Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Metadata store for documents and everything attached to them.
pub trait DocumentRepository {
    /// Runs `work` in one transaction scope, committing only when it succeeds.
    ///
    /// Calls nested inside an open scope join the outer transaction.
    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        Self: Sized,
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>;

    fn insert_document(&self, document: &Document) -> RepoResult<()>;
    /// Persists scalar document fields (name, description, content type,
    /// updater, timestamps). Relations have dedicated methods.
    fn save_document(&self, document: &Document) -> RepoResult<()>;
    /// Stamps the updater and update time without touching other fields.
    fn touch_document(&self, id: DocumentId, user: UserId, updated_at: i64) -> RepoResult<()>;
    fn get_document(&self, id: DocumentId) -> RepoResult<Option<Document>>;

    fn insert_version(&self, version: &Version) -> RepoResult<()>;
    fn set_latest_version(&self, document_id: DocumentId, version_id: VersionId)
        -> RepoResult<()>;
    fn get_version(&self, id: VersionId) -> RepoResult<Option<Version>>;
    /// Versions of one document, newest first.
    fn list_versions(&self, document_id: DocumentId) -> RepoResult<Vec<Version>>;
    fn version_exists(&self, document_id: DocumentId, version_id: VersionId) -> RepoResult<bool>;

    /// Inserts or replaces the entry for `(document, user, permission)`.
    fn upsert_permission(&self, entry: &PermissionEntry) -> RepoResult<()>;
    fn has_permission(
        &self,
        document_id: DocumentId,
        user_id: UserId,
        permission: DocumentPermission,
    ) -> RepoResult<bool>;
    /// Every entry of one document, including revoked ones.
    fn list_permissions(&self, document_id: DocumentId) -> RepoResult<Vec<PermissionEntry>>;

    /// Inserts or replaces the document's value for the association's attribute.
    fn upsert_attribute(&self, association: &AttributeAssociation) -> RepoResult<()>;
    fn delete_attribute(&self, document_id: DocumentId, attribute_name: &str) -> RepoResult<bool>;

    /// Adds already-normalized tags; existing links are kept.
    fn add_tags(&self, document_id: DocumentId, tags: &[String]) -> RepoResult<()>;
    fn delete_all_tags(&self, document_id: DocumentId) -> RepoResult<usize>;

    fn insert_group(&self, group: &Group) -> RepoResult<()>;
    fn get_group_by_name(&self, name: &str) -> RepoResult<Option<Group>>;
    fn add_group_member(&self, document_id: DocumentId, group_id: GroupId) -> RepoResult<()>;
    fn remove_group_member(&self, document_id: DocumentId, group_id: GroupId)
        -> RepoResult<bool>;

    /// Lists documents matching every predicate of `filter`.
    fn query_documents(
        &self,
        filter: &DocumentFilter,
        page: &PageRequest,
    ) -> RepoResult<Page<Document>>;
}

/// SQLite-backed document repository.
pub struct SqliteDocumentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        for &table in REQUIRED_TABLES {
            if !table_exists(conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }

    fn load_relations(&self, document: &mut Document) -> RepoResult<()> {
        let id = document.id.to_string();

        let mut stmt = self.conn.prepare(
            "SELECT user_id, permission
             FROM document_permissions
             WHERE document_id = ?1
               AND granted = 1
             ORDER BY user_id ASC, permission ASC;",
        )?;
        let mut rows = stmt.query([id.as_str()])?;
        while let Some(row) = rows.next()? {
            let user_id = parse_uuid(&row.get::<_, String>("user_id")?, "document_permissions.user_id")?;
            let permission = parse_permission(&row.get::<_, String>("permission")?)?;
            document
                .permissions
                .entry(user_id)
                .or_default()
                .insert(permission);
        }

        let mut stmt = self.conn.prepare(
            "SELECT a.name, da.value, da.set_by, da.is_valid
             FROM document_attributes da
             INNER JOIN attributes a ON a.id = da.attribute_id
             WHERE da.document_id = ?1
             ORDER BY a.name ASC;",
        )?;
        let mut rows = stmt.query([id.as_str()])?;
        while let Some(row) = rows.next()? {
            document.attributes.push(AttributeAssociation {
                document_id: document.id,
                attribute_name: row.get("name")?,
                value: row.get("value")?,
                set_by: parse_uuid(&row.get::<_, String>("set_by")?, "document_attributes.set_by")?,
                is_valid: int_to_bool(row.get("is_valid")?, "document_attributes.is_valid")?,
            });
        }

        let mut stmt = self.conn.prepare(
            "SELECT t.name
             FROM document_tags dt
             INNER JOIN tags t ON t.id = dt.tag_id
             WHERE dt.document_id = ?1
             ORDER BY t.name COLLATE NOCASE ASC;",
        )?;
        let mut rows = stmt.query([id.as_str()])?;
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            document.tags.push(value.to_lowercase());
        }

        let mut stmt = self.conn.prepare(
            "SELECT g.id, g.name
             FROM group_memberships gm
             INNER JOIN group_definitions g ON g.id = gm.group_id
             WHERE gm.document_id = ?1
             ORDER BY g.name COLLATE NOCASE ASC;",
        )?;
        let mut rows = stmt.query([id.as_str()])?;
        while let Some(row) = rows.next()? {
            document.groups.push(Group {
                id: parse_uuid(&row.get::<_, String>("id")?, "group_definitions.id")?,
                name: row.get("name")?,
            });
        }

        Ok(())
    }
}

impl DocumentRepository for SqliteDocumentRepository<'_> {
    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>,
    {
        if !self.conn.is_autocommit() {
            return work(self);
        }

        // Dropping an uncommitted transaction rolls it back.
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(RepoError::from)?;
        let value = work(self)?;
        tx.commit().map_err(RepoError::from)?;
        Ok(value)
    }

    fn insert_document(&self, document: &Document) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO documents (
                id,
                name,
                description,
                content_type,
                updated_by,
                latest_version_id,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                document.id.to_string(),
                document.name.as_str(),
                document.description.as_str(),
                document.content_type.as_str(),
                document.updated_by.to_string(),
                document.latest_version_id.map(|id| id.to_string()),
                document.created_at,
                document.updated_at,
            ],
        )?;
        Ok(())
    }

    fn save_document(&self, document: &Document) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE documents
             SET
                name = ?2,
                description = ?3,
                content_type = ?4,
                updated_by = ?5,
                updated_at = ?6
             WHERE id = ?1;",
            params![
                document.id.to_string(),
                document.name.as_str(),
                document.description.as_str(),
                document.content_type.as_str(),
                document.updated_by.to_string(),
                document.updated_at,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("document", document.id));
        }
        Ok(())
    }

    fn touch_document(&self, id: DocumentId, user: UserId, updated_at: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE documents SET updated_by = ?2, updated_at = ?3 WHERE id = ?1;",
            params![id.to_string(), user.to_string(), updated_at],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("document", id));
        }
        Ok(())
    }

    fn get_document(&self, id: DocumentId) -> RepoResult<Option<Document>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{DOCUMENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let mut document = parse_document_row(row)?;
        self.load_relations(&mut document)?;
        Ok(Some(document))
    }

    fn insert_version(&self, version: &Version) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO document_versions (
                id,
                document_id,
                checksum,
                checksum_algorithm,
                created_at,
                created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                version.id.to_string(),
                version.document_id.to_string(),
                version.checksum.as_str(),
                version.checksum_algorithm.as_str(),
                version.created_at,
                version.created_by.to_string(),
            ],
        )?;
        Ok(())
    }

    fn set_latest_version(
        &self,
        document_id: DocumentId,
        version_id: VersionId,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE documents
             SET latest_version_id = ?2
             WHERE id = ?1
               AND EXISTS (
                    SELECT 1
                    FROM document_versions
                    WHERE id = ?2 AND document_id = ?1
               );",
            params![document_id.to_string(), version_id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found(
                "document version",
                format!("{document_id}/{version_id}"),
            ));
        }
        Ok(())
    }

    fn get_version(&self, id: VersionId) -> RepoResult<Option<Version>> {
        self.conn
            .query_row(
                &format!("{VERSION_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_version_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_versions(&self, document_id: DocumentId) -> RepoResult<Vec<Version>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VERSION_SELECT_SQL}
             WHERE document_id = ?1
             ORDER BY created_at DESC, rowid DESC;"
        ))?;
        let mut rows = stmt.query([document_id.to_string()])?;
        let mut versions = Vec::new();
        while let Some(row) = rows.next()? {
            versions.push(parse_version_row(row)?);
        }
        Ok(versions)
    }

    fn version_exists(&self, document_id: DocumentId, version_id: VersionId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM document_versions
                WHERE id = ?1 AND document_id = ?2
            );",
            params![version_id.to_string(), document_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn upsert_permission(&self, entry: &PermissionEntry) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO document_permissions (
                document_id,
                user_id,
                permission,
                granted,
                granted_by
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (document_id, user_id, permission) DO UPDATE SET
                granted = excluded.granted,
                granted_by = excluded.granted_by;",
            params![
                entry.document_id.to_string(),
                entry.user_id.to_string(),
                entry.permission.as_str(),
                bool_to_int(entry.granted),
                entry.granted_by.to_string(),
            ],
        )?;
        Ok(())
    }

    fn has_permission(
        &self,
        document_id: DocumentId,
        user_id: UserId,
        permission: DocumentPermission,
    ) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM document_permissions
                WHERE document_id = ?1
                  AND user_id = ?2
                  AND permission = ?3
                  AND granted = 1
            );",
            params![
                document_id.to_string(),
                user_id.to_string(),
                permission.as_str()
            ],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_permissions(&self, document_id: DocumentId) -> RepoResult<Vec<PermissionEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, permission, granted, granted_by
             FROM document_permissions
             WHERE document_id = ?1
             ORDER BY user_id ASC, permission ASC;",
        )?;
        let mut rows = stmt.query([document_id.to_string()])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(PermissionEntry {
                document_id,
                user_id: parse_uuid(&row.get::<_, String>("user_id")?, "document_permissions.user_id")?,
                permission: parse_permission(&row.get::<_, String>("permission")?)?,
                granted: int_to_bool(row.get("granted")?, "document_permissions.granted")?,
                granted_by: parse_uuid(
                    &row.get::<_, String>("granted_by")?,
                    "document_permissions.granted_by",
                )?,
            });
        }
        Ok(entries)
    }

    fn upsert_attribute(&self, association: &AttributeAssociation) -> RepoResult<()> {
        self.atomically(|repo| {
            repo.conn.execute(
                "INSERT OR IGNORE INTO attributes (name) VALUES (?1);",
                [association.attribute_name.as_str()],
            )?;
            repo.conn.execute(
                "INSERT INTO document_attributes (
                    document_id,
                    attribute_id,
                    value,
                    set_by,
                    is_valid
                )
                SELECT ?1, id, ?3, ?4, ?5
                FROM attributes
                WHERE name = ?2
                ON CONFLICT (document_id, attribute_id) DO UPDATE SET
                    value = excluded.value,
                    set_by = excluded.set_by,
                    is_valid = excluded.is_valid;",
                params![
                    association.document_id.to_string(),
                    association.attribute_name.as_str(),
                    association.value.as_str(),
                    association.set_by.to_string(),
                    bool_to_int(association.is_valid),
                ],
            )?;
            Ok(())
        })
    }

    fn delete_attribute(&self, document_id: DocumentId, attribute_name: &str) -> RepoResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM document_attributes
             WHERE document_id = ?1
               AND attribute_id IN (SELECT id FROM attributes WHERE name = ?2);",
            params![document_id.to_string(), attribute_name],
        )?;
        Ok(removed > 0)
    }

    fn add_tags(&self, document_id: DocumentId, tags: &[String]) -> RepoResult<()> {
        let document_id = document_id.to_string();
        self.atomically(|repo| {
            for tag in tags {
                repo.conn
                    .execute("INSERT OR IGNORE INTO tags (name) VALUES (?1);", [tag.as_str()])?;
                repo.conn.execute(
                    "INSERT OR IGNORE INTO document_tags (document_id, tag_id)
                     SELECT ?1, id
                     FROM tags
                     WHERE name = ?2 COLLATE NOCASE;",
                    params![document_id.as_str(), tag.as_str()],
                )?;
            }
            Ok(())
        })
    }

    fn delete_all_tags(&self, document_id: DocumentId) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM document_tags WHERE document_id = ?1;",
            [document_id.to_string()],
        )?;
        Ok(removed)
    }

    fn insert_group(&self, group: &Group) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO group_definitions (id, name) VALUES (?1, ?2);",
            params![group.id.to_string(), group.name.as_str()],
        )?;
        Ok(())
    }

    fn get_group_by_name(&self, name: &str) -> RepoResult<Option<Group>> {
        self.conn
            .query_row(
                "SELECT id, name
                 FROM group_definitions
                 WHERE name = ?1 COLLATE NOCASE;",
                [name],
                |row| {
                    let id: String = row.get("id")?;
                    let name: String = row.get("name")?;
                    Ok((id, name))
                },
            )
            .optional()?
            .map(|(id, name)| -> RepoResult<Group> {
                Ok(Group {
                    id: parse_uuid(&id, "group_definitions.id")?,
                    name,
                })
            })
            .transpose()
    }

    fn add_group_member(&self, document_id: DocumentId, group_id: GroupId) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO group_memberships (document_id, group_id) VALUES (?1, ?2);",
            params![document_id.to_string(), group_id.to_string()],
        )?;
        Ok(())
    }

    fn remove_group_member(
        &self,
        document_id: DocumentId,
        group_id: GroupId,
    ) -> RepoResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM group_memberships WHERE document_id = ?1 AND group_id = ?2;",
            params![document_id.to_string(), group_id.to_string()],
        )?;
        Ok(removed > 0)
    }

    fn query_documents(
        &self,
        filter: &DocumentFilter,
        page: &PageRequest,
    ) -> RepoResult<Page<Document>> {
        let compiled = filter.compile();

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM documents WHERE {};", compiled.where_sql),
            params_from_iter(compiled.params.iter()),
            |row| row.get(0),
        )?;

        let size = page.applied_size();
        let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT id FROM documents WHERE {} ORDER BY {} LIMIT ? OFFSET ?;",
            compiled.where_sql,
            page.sort.order_by_sql()
        );
        let mut bind_values = compiled.params;
        bind_values.push(Value::Integer(i64::from(size)));
        bind_values.push(Value::Integer(offset));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(parse_uuid(&row.get::<_, String>(0)?, "documents.id")?);
        }

        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            let document = self
                .get_document(id)?
                .ok_or_else(|| RepoError::InvalidData(format!("document {id} vanished during listing")))?;
            items.push(document);
        }

        Ok(Page {
            items,
            page: page.page,
            size,
            total_elements: u64::try_from(total).unwrap_or(0),
        })
    }
}

fn parse_document_row(row: &Row<'_>) -> RepoResult<Document> {
    let latest_version_id = match row.get::<_, Option<String>>("latest_version_id")? {
        Some(value) => Some(parse_uuid(&value, "documents.latest_version_id")?),
        None => None,
    };

    Ok(Document {
        id: parse_uuid(&row.get::<_, String>("id")?, "documents.id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        content_type: row.get("content_type")?,
        updated_by: parse_uuid(&row.get::<_, String>("updated_by")?, "documents.updated_by")?,
        latest_version_id,
        permissions: Default::default(),
        attributes: Vec::new(),
        tags: Vec::new(),
        groups: Vec::new(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_version_row(row: &Row<'_>) -> RepoResult<Version> {
    Ok(Version {
        id: parse_uuid(&row.get::<_, String>("id")?, "document_versions.id")?,
        document_id: parse_uuid(
            &row.get::<_, String>("document_id")?,
            "document_versions.document_id",
        )?,
        checksum: row.get("checksum")?,
        checksum_algorithm: row.get("checksum_algorithm")?,
        created_at: row.get("created_at")?,
        created_by: parse_uuid(
            &row.get::<_, String>("created_by")?,
            "document_versions.created_by",
        )?,
    })
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn parse_permission(value: &str) -> RepoResult<DocumentPermission> {
    DocumentPermission::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid permission `{value}` in document_permissions.permission"
        ))
    })
}

fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

#[cfg(test)]
mod tests {
    use super::{DocumentRepository, RepoError, SqliteDocumentRepository};
    use crate::db::open_db_in_memory;
    use crate::model::document::{Document, Version};
    use crate::model::now_epoch_ms;
    use rusqlite::Connection;
    use uuid::Uuid;

    fn version_of(document: &Document) -> Version {
        Version {
            id: Uuid::new_v4(),
            document_id: document.id,
            checksum: "00".repeat(32),
            checksum_algorithm: "sha256".to_string(),
            created_at: now_epoch_ms(),
            created_by: document.updated_by,
        }
    }

    #[test]
    fn try_new_rejects_unmigrated_connection() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteDocumentRepository::try_new(&conn).err().unwrap();
        assert!(matches!(err, RepoError::MissingRequiredTable("documents")));
    }

    #[test]
    fn latest_version_cannot_point_at_another_documents_version() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteDocumentRepository::try_new(&conn).unwrap();
        let user = Uuid::new_v4();
        let first = Document::new("a.txt", "text/plain", "", user);
        let second = Document::new("b.txt", "text/plain", "", user);
        repo.insert_document(&first).unwrap();
        repo.insert_document(&second).unwrap();
        let version = version_of(&first);
        repo.insert_version(&version).unwrap();

        let err = repo.set_latest_version(second.id, version.id).unwrap_err();
        assert!(matches!(err, RepoError::NotFound { .. }));
        repo.set_latest_version(first.id, version.id).unwrap();
    }

    #[test]
    fn stored_versions_reject_updates() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteDocumentRepository::try_new(&conn).unwrap();
        let document = Document::new("a.txt", "text/plain", "", Uuid::new_v4());
        repo.insert_document(&document).unwrap();
        let version = version_of(&document);
        repo.insert_version(&version).unwrap();

        let result = conn.execute(
            "UPDATE document_versions SET checksum = 'tampered' WHERE id = ?1;",
            [version.id.to_string()],
        );
        assert!(result.is_err());
        assert_eq!(repo.get_version(version.id).unwrap().unwrap(), version);
    }

    #[test]
    fn atomically_rolls_back_every_write_on_error() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteDocumentRepository::try_new(&conn).unwrap();
        let document = Document::new("a.txt", "text/plain", "", Uuid::new_v4());

        let result: Result<(), RepoError> = repo.atomically(|repo| {
            repo.insert_document(&document)?;
            repo.add_tags(document.id, &["draft".to_string()])?;
            Err(RepoError::InvalidData("abort".to_string()))
        });

        assert!(result.is_err());
        assert!(repo.get_document(document.id).unwrap().is_none());
        assert!(conn.is_autocommit());
    }
}
