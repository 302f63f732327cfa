//! Document lifecycle use-case service.
//!
//! # Responsibility
//! - Create documents with their first version and creator permissions.
//! - Serve verified content, update documents and manage labels and groups.
//! - List documents visible to a user with composable filters.
//!
//! # Invariants
//! - Creation is all-or-nothing: document, first version, latest pointer and
//!   creator grants commit together or not at all.
//! - Content reads, updates, group changes and grants check permissions
//!   against the store before touching data.
//! - Listings never return documents the acting user cannot read.

use super::error::{DocumentServiceError, PersistenceError, ServiceResult};
use super::permission_gate::PermissionGate;
use super::version_manager::VersionManager;
use crate::logging::sanitize_for_log;
use crate::model::attribute::{
    AttributeAssociation, AttributeDefinition, AttributeDefinitionProvider,
};
use crate::model::document::{clean_file_name, normalize_tag, Document, Group, Version};
use crate::model::permission::{DocumentPermission, PermissionEntry};
use crate::model::{now_epoch_ms, DocumentId, UserId, VersionId};
use crate::query::{DocumentFilter, Page, PageRequest};
use crate::repo::document_repo::{DocumentRepository, RepoError};
use crate::storage::ContentStore;
use log::{info, warn};
use std::time::Duration;

/// New content supplied to `update_document`.
#[derive(Debug, Clone, Copy)]
pub struct ContentUpload<'a> {
    pub content: &'a [u8],
    /// File name of the upload. Renames the document when it differs.
    pub file_name: Option<&'a str>,
}

/// Optional listing filters. Empty fields do not restrict results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentListQuery {
    /// Case-insensitive substring of the document name.
    pub name: String,
    /// Documents must carry all of these tags.
    pub tags: Vec<String>,
    /// Documents must carry all of these attributes.
    pub attribute_names: Vec<String>,
    /// Documents must belong to all of these groups.
    pub group_names: Vec<String>,
}

/// Outcome of one orphaned content sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: u64,
    pub removed: u64,
    /// Orphans younger than the grace period, left in place.
    pub skipped_recent: u64,
}

/// Document service facade over a metadata repository and a content store.
pub struct DocumentService<R: DocumentRepository, S: ContentStore> {
    repo: R,
    store: S,
}

impl<R: DocumentRepository, S: ContentStore> DocumentService<R, S> {
    pub fn new(repo: R, store: S) -> Self {
        Self { repo, store }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn content_store(&self) -> &S {
        &self.store
    }

    fn gate(&self) -> PermissionGate<'_, R> {
        PermissionGate::new(&self.repo)
    }

    fn versions(&self) -> VersionManager<'_, R, S> {
        VersionManager::new(&self.repo, &self.store)
    }

    fn reload(&self, id: DocumentId, context: &'static str) -> ServiceResult<Document> {
        self.repo
            .get_document(id)
            .map_err(DocumentServiceError::persistence)?
            .ok_or(DocumentServiceError::Persistence(
                PersistenceError::InconsistentState(context),
            ))
    }

    /// Creates a document whose first version holds `content`.
    ///
    /// The acting user receives every permission kind on the new document.
    pub fn create_document(
        &self,
        acting_user: UserId,
        content: &[u8],
        file_name: &str,
        content_type: &str,
        description: &str,
    ) -> ServiceResult<Document> {
        let name = clean_file_name(file_name);
        if name.is_empty() {
            return Err(DocumentServiceError::invalid_value(
                "file_name",
                file_name,
                "a non-empty file name",
            ));
        }

        let mut document = Document::new(name, content_type.trim(), description, acting_user);
        let document_id = document.id;
        let created = self.repo.atomically(|repo| -> ServiceResult<()> {
            repo.insert_document(&document)
                .map_err(DocumentServiceError::persistence)?;
            VersionManager::new(repo, &self.store).create_version(
                &mut document,
                content,
                acting_user,
            )?;
            PermissionGate::new(repo)
                .grant_all_permissions(&document, acting_user, acting_user)
                .map_err(DocumentServiceError::persistence)?;
            Ok(())
        });

        if let Err(err) = created {
            warn!(
                "event=document_create module=service status=error error_code={} user_id={acting_user} name={}",
                err.code(),
                sanitize_for_log(&document.name)
            );
            return Err(err);
        }

        let document = self.reload(document_id, "created document not found in read-back")?;
        info!(
            "event=document_create module=service status=ok document_id={document_id} user_id={acting_user} name={} bytes={}",
            sanitize_for_log(&document.name),
            content.len()
        );
        Ok(document)
    }

    /// Loads one document the acting user can read.
    pub fn find_document(&self, id: DocumentId, acting_user: UserId) -> ServiceResult<Document> {
        let document = self
            .repo
            .get_document(id)?
            .ok_or_else(|| DocumentServiceError::not_found("document", id))?;
        self.gate()
            .require(&document, acting_user, DocumentPermission::Read)?;
        Ok(document)
    }

    /// Returns the verified content of the latest version.
    pub fn read_latest(&self, document: &Document, acting_user: UserId) -> ServiceResult<Vec<u8>> {
        self.gate()
            .require(document, acting_user, DocumentPermission::Read)?;
        let version_id = document.latest_version_id.ok_or_else(|| {
            DocumentServiceError::not_found("document version", format!("{}/latest", document.id))
        })?;
        let version = self
            .repo
            .get_version(version_id)?
            .ok_or_else(|| DocumentServiceError::not_found("document version", version_id))?;
        self.versions().fetch_and_verify(document, &version)
    }

    /// Returns the verified content of one specific version.
    pub fn read_version(
        &self,
        document: &Document,
        version: &Version,
        acting_user: UserId,
    ) -> ServiceResult<Vec<u8>> {
        self.gate()
            .require(document, acting_user, DocumentPermission::Read)?;
        self.versions().fetch_and_verify(document, version)
    }

    /// Loads one version record of `document`.
    pub fn find_version(
        &self,
        document: &Document,
        version_id: VersionId,
        acting_user: UserId,
    ) -> ServiceResult<Version> {
        self.gate()
            .require(document, acting_user, DocumentPermission::Read)?;
        self.repo
            .get_version(version_id)?
            .filter(|version| version.document_id == document.id)
            .ok_or_else(|| {
                DocumentServiceError::not_found(
                    "document version",
                    format!("{}/{version_id}", document.id),
                )
            })
    }

    /// Version history of `document`, newest first.
    pub fn list_versions(
        &self,
        document: &Document,
        acting_user: UserId,
    ) -> ServiceResult<Vec<Version>> {
        self.gate()
            .require(document, acting_user, DocumentPermission::Read)?;
        self.repo
            .list_versions(document.id)
            .map_err(DocumentServiceError::persistence)
    }

    /// Records a change by `acting_user`, optionally with new content.
    ///
    /// New content becomes a new latest version. Without content only the
    /// modifier and timestamp change.
    pub fn update_document(
        &self,
        acting_user: UserId,
        document: &Document,
        upload: Option<ContentUpload<'_>>,
    ) -> ServiceResult<Document> {
        self.gate()
            .require(document, acting_user, DocumentPermission::Write)?;

        let mut updated = document.clone();
        let result = self.repo.atomically(|repo| -> ServiceResult<()> {
            let mut renamed = false;
            if let Some(upload) = upload {
                VersionManager::new(repo, &self.store).create_version(
                    &mut updated,
                    upload.content,
                    acting_user,
                )?;
                if let Some(file_name) = upload.file_name {
                    let cleaned = clean_file_name(file_name);
                    if !cleaned.is_empty() && cleaned != updated.name {
                        updated.name = cleaned;
                        renamed = true;
                    }
                }
            }
            updated.touch(acting_user);
            // Only a rename writes the name; otherwise stamp audit fields.
            let saved = if renamed {
                repo.save_document(&updated)
            } else {
                repo.touch_document(updated.id, acting_user, updated.updated_at)
            };
            saved.map_err(DocumentServiceError::persistence)
        });

        if let Err(err) = result {
            warn!(
                "event=document_update module=service status=error error_code={} document_id={} user_id={acting_user}",
                err.code(),
                document.id
            );
            return Err(err);
        }

        info!(
            "event=document_update module=service status=ok document_id={} user_id={acting_user} new_version={}",
            document.id,
            upload.is_some()
        );
        self.reload(document.id, "updated document not found in read-back")
    }

    /// Sets `definition` on `document` to `value`, replacing any prior value.
    ///
    /// Values the definition rejects fail with `InvalidValue` and are not
    /// stored.
    pub fn add_attribute(
        &self,
        document: &Document,
        definition: &AttributeDefinition,
        value: &str,
        acting_user: UserId,
    ) -> ServiceResult<AttributeAssociation> {
        let association = AttributeAssociation::new(document.id, definition, value, acting_user);
        if !association.is_valid {
            return Err(DocumentServiceError::invalid_value(
                definition.name(),
                value,
                definition.rule_description(),
            ));
        }

        let touched_at = now_epoch_ms();
        self.repo
            .atomically(|repo| -> Result<(), RepoError> {
                repo.upsert_attribute(&association)?;
                repo.touch_document(document.id, acting_user, touched_at)
            })
            .map_err(DocumentServiceError::persistence)?;

        info!(
            "event=attribute_set module=service status=ok document_id={} attribute={}",
            document.id,
            sanitize_for_log(definition.name())
        );
        Ok(association)
    }

    /// Resolves `attribute_name` through `provider` and sets it.
    pub fn add_named_attribute<P: AttributeDefinitionProvider + ?Sized>(
        &self,
        provider: &P,
        document: &Document,
        attribute_name: &str,
        value: &str,
        acting_user: UserId,
    ) -> ServiceResult<AttributeAssociation> {
        let definition = provider.definition(attribute_name).ok_or_else(|| {
            DocumentServiceError::not_found("attribute definition", attribute_name)
        })?;
        self.add_attribute(document, &definition, value, acting_user)
    }

    /// Removes the document's value for `definition`. Returns `false` when
    /// none was set.
    pub fn remove_attribute(
        &self,
        document: &Document,
        definition: &AttributeDefinition,
    ) -> ServiceResult<bool> {
        self.repo
            .delete_attribute(document.id, definition.name())
            .map_err(DocumentServiceError::persistence)
    }

    /// Adds tags to `document`. Tags are lowercased and deduplicated.
    pub fn add_tags(
        &self,
        document: &Document,
        tags: &[String],
        acting_user: UserId,
    ) -> ServiceResult<Document> {
        self.gate()
            .require(document, acting_user, DocumentPermission::Write)?;

        let mut normalized = Vec::with_capacity(tags.len());
        for tag in tags {
            let Some(value) = normalize_tag(tag) else {
                return Err(DocumentServiceError::invalid_value(
                    "tag",
                    tag.as_str(),
                    "a non-blank tag",
                ));
            };
            if !normalized.contains(&value) {
                normalized.push(value);
            }
        }

        let touched_at = now_epoch_ms();
        self.repo
            .atomically(|repo| -> Result<(), RepoError> {
                repo.add_tags(document.id, &normalized)?;
                repo.touch_document(document.id, acting_user, touched_at)
            })
            .map_err(DocumentServiceError::persistence)?;

        self.reload(document.id, "tagged document not found in read-back")
    }

    /// Removes every tag from `document` and returns how many were removed.
    pub fn remove_all_tags(&self, document: &Document) -> ServiceResult<usize> {
        self.repo
            .delete_all_tags(document.id)
            .map_err(DocumentServiceError::persistence)
    }

    /// Creates a named group.
    pub fn create_group(&self, name: &str) -> ServiceResult<Group> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DocumentServiceError::invalid_value(
                "group_name",
                name,
                "a non-blank group name",
            ));
        }

        let group = Group::new(trimmed);
        self.repo
            .insert_group(&group)
            .map_err(DocumentServiceError::persistence)?;
        info!(
            "event=group_create module=service status=ok group_id={} name={}",
            group.id,
            sanitize_for_log(&group.name)
        );
        Ok(group)
    }

    pub fn find_group_by_name(&self, name: &str) -> ServiceResult<Group> {
        self.repo
            .get_group_by_name(name.trim())
            .map_err(DocumentServiceError::persistence)?
            .ok_or_else(|| DocumentServiceError::not_found("group", name.trim()))
    }

    /// Adds `document` to `group`. Adding an existing member is a no-op.
    pub fn add_to_group(
        &self,
        document: &Document,
        group: &Group,
        acting_user: UserId,
    ) -> ServiceResult<Document> {
        self.gate()
            .require(document, acting_user, DocumentPermission::Write)?;

        let touched_at = now_epoch_ms();
        self.repo.atomically(|repo| -> ServiceResult<()> {
            repo.add_group_member(document.id, group.id)?;
            repo.touch_document(document.id, acting_user, touched_at)
                .map_err(DocumentServiceError::persistence)
        })?;

        info!(
            "event=group_add module=service status=ok document_id={} group_id={} user_id={acting_user}",
            document.id, group.id
        );
        self.reload(document.id, "grouped document not found in read-back")
    }

    /// Removes `document` from `group`; fails with `NotFound` when it is not
    /// a member.
    pub fn remove_from_group(
        &self,
        document: &Document,
        group: &Group,
        acting_user: UserId,
    ) -> ServiceResult<Document> {
        self.gate()
            .require(document, acting_user, DocumentPermission::Write)?;

        let touched_at = now_epoch_ms();
        self.repo.atomically(|repo| -> ServiceResult<()> {
            if !repo
                .remove_group_member(document.id, group.id)
                .map_err(DocumentServiceError::persistence)?
            {
                return Err(DocumentServiceError::not_found(
                    "group membership",
                    format!("{}/{}", group.id, document.id),
                ));
            }
            repo.touch_document(document.id, acting_user, touched_at)
                .map_err(DocumentServiceError::persistence)
        })?;

        info!(
            "event=group_remove module=service status=ok document_id={} group_id={} user_id={acting_user}",
            document.id, group.id
        );
        self.reload(document.id, "ungrouped document not found in read-back")
    }

    /// Grants `permission` on `document` to `subject`. Requires `Admin`.
    pub fn grant_permission(
        &self,
        document: &Document,
        subject: UserId,
        permission: DocumentPermission,
        acting_user: UserId,
    ) -> ServiceResult<PermissionEntry> {
        let gate = self.gate();
        gate.require(document, acting_user, DocumentPermission::Admin)?;
        gate.grant(document, subject, permission, acting_user)
            .map_err(DocumentServiceError::persistence)
    }

    /// Revokes `permission` on `document` from `subject`. Requires `Admin`.
    pub fn revoke_permission(
        &self,
        document: &Document,
        subject: UserId,
        permission: DocumentPermission,
        acting_user: UserId,
    ) -> ServiceResult<PermissionEntry> {
        let gate = self.gate();
        gate.require(document, acting_user, DocumentPermission::Admin)?;
        gate.revoke(document, subject, permission, acting_user)
            .map_err(DocumentServiceError::persistence)
    }

    /// Lists documents `acting_user` can read that match every given filter.
    pub fn list_visible(
        &self,
        acting_user: UserId,
        page: &PageRequest,
        query: &DocumentListQuery,
    ) -> ServiceResult<Page<Document>> {
        let filter = DocumentFilter::new()
            .name_contains(&query.name)
            .with_all_tags(&query.tags)
            .with_all_attributes(&query.attribute_names)
            .in_all_groups(&query.group_names);
        self.list_matching(acting_user, page, filter)
    }

    /// Lists documents matching `filter`, restricted to those `acting_user`
    /// can read.
    pub fn list_matching(
        &self,
        acting_user: UserId,
        page: &PageRequest,
        filter: DocumentFilter,
    ) -> ServiceResult<Page<Document>> {
        let filter = filter.readable_by(acting_user);
        self.repo
            .query_documents(&filter, page)
            .map_err(DocumentServiceError::persistence)
    }

    /// Removes stored content that no version references.
    ///
    /// Entries modified within `min_age` are skipped so that content written
    /// by an in-flight create or update is not reclaimed before its metadata
    /// commits.
    pub fn sweep_orphaned_content(&self, min_age: Duration) -> ServiceResult<SweepReport> {
        let grace_ms = i64::try_from(min_age.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now_epoch_ms().saturating_sub(grace_ms);
        let mut report = SweepReport::default();

        for entry in self.store.list()? {
            report.examined += 1;
            let key = entry.key;
            if self
                .repo
                .version_exists(key.document_id, key.version_id)
                .map_err(DocumentServiceError::persistence)?
            {
                continue;
            }
            if entry.modified_at_ms.is_some_and(|modified| modified > cutoff) {
                report.skipped_recent += 1;
                continue;
            }
            if self.store.remove(key.document_id, key.version_id)? {
                report.removed += 1;
                info!("event=content_sweep module=service status=removed key={key}");
            }
        }

        info!(
            "event=content_sweep module=service status=ok examined={} removed={} skipped_recent={}",
            report.examined, report.removed, report.skipped_recent
        );
        Ok(report)
    }
}
