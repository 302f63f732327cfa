use dokuti_core::db::open_db_in_memory;
use dokuti_core::{
    content_checksum, AllowedValues, AttributeDefinition, AttributeRegistry, ContentUpload,
    DocumentPermission, DocumentRepository, DocumentService, DocumentServiceError,
    FsContentStore, SqliteDocumentRepository,
};
use dokuti_core::service::permission_gate::PermissionGate;
use rusqlite::Connection;
use std::collections::BTreeSet;
use tempfile::TempDir;
use uuid::Uuid;

struct Fixture {
    conn: Connection,
    content_dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            conn: open_db_in_memory().unwrap(),
            content_dir: tempfile::tempdir().unwrap(),
        }
    }

    fn service(&self) -> DocumentService<SqliteDocumentRepository<'_>, FsContentStore> {
        DocumentService::new(
            SqliteDocumentRepository::try_new(&self.conn).unwrap(),
            FsContentStore::open(self.content_dir.path()).unwrap(),
        )
    }
}

fn priority_definition() -> AttributeDefinition {
    AttributeDefinition::new("priority", AllowedValues::new(["low", "medium", "high"]))
}

#[test]
fn creator_receives_every_permission_and_reads_back_content() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let owner = Uuid::new_v4();

    let document = service
        .create_document(owner, b"first draft", "notes.txt", "text/plain", "draft")
        .unwrap();

    assert_eq!(document.name, "notes.txt");
    assert_eq!(document.updated_by, owner);
    assert_eq!(
        document.granted_permissions(owner),
        DocumentPermission::ALL.into_iter().collect::<BTreeSet<_>>()
    );

    let latest = document.latest_version_id.expect("latest version is set");
    let versions = service.list_versions(&document, owner).unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].id, latest);
    assert_eq!(versions[0].checksum, content_checksum(b"first draft"));

    assert_eq!(service.read_latest(&document, owner).unwrap(), b"first draft");
}

#[test]
fn create_cleans_file_name_and_rejects_empty_names() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let owner = Uuid::new_v4();

    let document = service
        .create_document(owner, b"x", "scans\\.\\invoice.pdf", "application/pdf", "")
        .unwrap();
    assert_eq!(document.name, "scans/invoice.pdf");

    let error = service
        .create_document(owner, b"x", " ./ ", "text/plain", "")
        .unwrap_err();
    assert!(matches!(
        error,
        DocumentServiceError::InvalidValue { ref field, .. } if field == "file_name"
    ));
}

#[test]
fn other_users_are_denied_and_unknown_documents_are_not_found() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    let document = service
        .create_document(owner, b"secret", "a.txt", "text/plain", "")
        .unwrap();

    let error = service.read_latest(&document, stranger).unwrap_err();
    assert!(matches!(
        error,
        DocumentServiceError::NotAuthorized {
            permission: DocumentPermission::Read,
            ..
        }
    ));

    let error = service.find_document(document.id, stranger).unwrap_err();
    assert_eq!(error.code(), "not_authorized");

    let error = service.find_document(Uuid::new_v4(), owner).unwrap_err();
    assert_eq!(error.code(), "not_found");
}

#[test]
fn update_with_content_adds_version_and_keeps_history_readable() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let owner = Uuid::new_v4();

    let document = service
        .create_document(owner, b"v1 content", "report.txt", "text/plain", "")
        .unwrap();
    let first_version = document.latest_version_id.unwrap();

    let updated = service
        .update_document(
            owner,
            &document,
            Some(ContentUpload {
                content: b"v2 content",
                file_name: Some("report-final.txt"),
            }),
        )
        .unwrap();

    assert_eq!(updated.name, "report-final.txt");
    assert_ne!(updated.latest_version_id, Some(first_version));
    assert_eq!(service.read_latest(&updated, owner).unwrap(), b"v2 content");

    let versions = service.list_versions(&updated, owner).unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(Some(versions[0].id), updated.latest_version_id);
    assert_eq!(versions[1].id, first_version);

    let old = service.find_version(&updated, first_version, owner).unwrap();
    assert_eq!(
        service.read_version(&updated, &old, owner).unwrap(),
        b"v1 content"
    );
}

#[test]
fn update_keeps_name_when_upload_has_same_or_no_file_name() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let owner = Uuid::new_v4();

    let document = service
        .create_document(owner, b"1", "keep.txt", "text/plain", "")
        .unwrap();
    let updated = service
        .update_document(
            owner,
            &document,
            Some(ContentUpload {
                content: b"2",
                file_name: None,
            }),
        )
        .unwrap();

    assert_eq!(updated.name, "keep.txt");
    assert_eq!(service.list_versions(&updated, owner).unwrap().len(), 2);
}

#[test]
fn metadata_only_update_records_modifier_without_new_version() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let owner = Uuid::new_v4();
    let editor = Uuid::new_v4();

    let document = service
        .create_document(owner, b"body", "a.txt", "text/plain", "")
        .unwrap();
    service
        .grant_permission(&document, editor, DocumentPermission::Write, owner)
        .unwrap();
    service
        .grant_permission(&document, editor, DocumentPermission::Read, owner)
        .unwrap();

    let updated = service.update_document(editor, &document, None).unwrap();

    assert_eq!(updated.updated_by, editor);
    assert_eq!(updated.latest_version_id, document.latest_version_id);
    assert_eq!(service.list_versions(&updated, editor).unwrap().len(), 1);
}

#[test]
fn label_changes_from_an_earlier_snapshot_keep_a_newer_name() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let owner = Uuid::new_v4();
    let priority = priority_definition();
    let archive = service.create_group("archive").unwrap();

    let snapshot = service
        .create_document(owner, b"v1", "a.txt", "text/plain", "")
        .unwrap();
    let renamed = service
        .update_document(
            owner,
            &snapshot,
            Some(ContentUpload {
                content: b"v2",
                file_name: Some("b.txt"),
            }),
        )
        .unwrap();
    assert_eq!(renamed.name, "b.txt");

    let tagged = service
        .add_tags(&snapshot, &["invoice".to_string()], owner)
        .unwrap();
    assert_eq!(tagged.name, "b.txt");
    assert_eq!(tagged.latest_version_id, renamed.latest_version_id);

    service
        .add_attribute(&snapshot, &priority, "high", owner)
        .unwrap();
    service.add_to_group(&snapshot, &archive, owner).unwrap();
    service.remove_from_group(&snapshot, &archive, owner).unwrap();
    let touched = service.update_document(owner, &snapshot, None).unwrap();

    let current = service.find_document(snapshot.id, owner).unwrap();
    assert_eq!(touched.name, "b.txt");
    assert_eq!(current.name, "b.txt");
    assert_eq!(current.tags, vec!["invoice".to_string()]);
    assert_eq!(current.latest_version_id, renamed.latest_version_id);
}

#[test]
fn update_without_write_permission_changes_nothing() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let owner = Uuid::new_v4();
    let reader = Uuid::new_v4();

    let document = service
        .create_document(owner, b"body", "a.txt", "text/plain", "")
        .unwrap();
    service
        .grant_permission(&document, reader, DocumentPermission::Read, owner)
        .unwrap();

    let error = service
        .update_document(
            reader,
            &document,
            Some(ContentUpload {
                content: b"overwrite",
                file_name: Some("b.txt"),
            }),
        )
        .unwrap_err();
    assert!(matches!(
        error,
        DocumentServiceError::NotAuthorized {
            permission: DocumentPermission::Write,
            ..
        }
    ));

    let reloaded = service.find_document(document.id, reader).unwrap();
    assert_eq!(reloaded.name, "a.txt");
    assert_eq!(service.read_latest(&reloaded, reader).unwrap(), b"body");
}

#[test]
fn attribute_values_are_validated_and_replaced() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let owner = Uuid::new_v4();
    let priority = priority_definition();

    let document = service
        .create_document(owner, b"body", "a.txt", "text/plain", "")
        .unwrap();

    let error = service
        .add_attribute(&document, &priority, "urgent", owner)
        .unwrap_err();
    match error {
        DocumentServiceError::InvalidValue {
            field,
            value,
            reason,
        } => {
            assert_eq!(field, "priority");
            assert_eq!(value, "urgent");
            assert!(reason.contains("high"));
        }
        other => panic!("unexpected error: {other}"),
    }
    let reloaded = service.find_document(document.id, owner).unwrap();
    assert!(reloaded.attribute("priority").is_none());

    service
        .add_attribute(&document, &priority, "high", owner)
        .unwrap();
    service
        .add_attribute(&document, &priority, "low", owner)
        .unwrap();
    let reloaded = service.find_document(document.id, owner).unwrap();
    assert_eq!(reloaded.attributes.len(), 1);
    assert_eq!(reloaded.attribute("priority").unwrap().value, "low");

    assert!(service.remove_attribute(&reloaded, &priority).unwrap());
    assert!(!service.remove_attribute(&reloaded, &priority).unwrap());
}

#[test]
fn named_attributes_resolve_through_a_registry() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let owner = Uuid::new_v4();
    let mut registry = AttributeRegistry::new();
    registry.register(priority_definition());

    let document = service
        .create_document(owner, b"body", "a.txt", "text/plain", "")
        .unwrap();

    let association = service
        .add_named_attribute(&registry, &document, "priority", "medium", owner)
        .unwrap();
    assert!(association.is_valid);

    let error = service
        .add_named_attribute(&registry, &document, "colour", "red", owner)
        .unwrap_err();
    assert_eq!(error.code(), "not_found");
}

#[test]
fn tags_are_normalized_and_removed_together() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let owner = Uuid::new_v4();

    let document = service
        .create_document(owner, b"body", "a.txt", "text/plain", "")
        .unwrap();
    let tagged = service
        .add_tags(
            &document,
            &["Invoice".to_string(), " 2024 ".to_string(), "invoice".to_string()],
            owner,
        )
        .unwrap();
    assert_eq!(tagged.tags, vec!["2024", "invoice"]);

    let error = service
        .add_tags(&tagged, &["  ".to_string()], owner)
        .unwrap_err();
    assert_eq!(error.code(), "invalid_value");

    assert_eq!(service.remove_all_tags(&tagged).unwrap(), 2);
    assert!(service
        .find_document(document.id, owner)
        .unwrap()
        .tags
        .is_empty());
}

#[test]
fn group_membership_requires_write_and_reports_missing_membership() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    let document = service
        .create_document(owner, b"body", "a.txt", "text/plain", "")
        .unwrap();
    let finance = service.create_group("Finance").unwrap();
    assert_eq!(service.find_group_by_name("finance").unwrap(), finance);

    let error = service
        .add_to_group(&document, &finance, stranger)
        .unwrap_err();
    assert_eq!(error.code(), "not_authorized");

    let grouped = service.add_to_group(&document, &finance, owner).unwrap();
    assert!(grouped.is_member_of(finance.id));
    let grouped = service.add_to_group(&grouped, &finance, owner).unwrap();
    assert_eq!(grouped.groups.len(), 1);

    let ungrouped = service
        .remove_from_group(&grouped, &finance, owner)
        .unwrap();
    assert!(!ungrouped.is_member_of(finance.id));

    let error = service
        .remove_from_group(&ungrouped, &finance, owner)
        .unwrap_err();
    assert!(matches!(
        error,
        DocumentServiceError::NotFound {
            entity: "group membership",
            ..
        }
    ));
}

#[test]
fn grants_require_admin_and_revocation_removes_access() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let owner = Uuid::new_v4();
    let colleague = Uuid::new_v4();

    let document = service
        .create_document(owner, b"shared", "a.txt", "text/plain", "")
        .unwrap();

    let error = service
        .grant_permission(&document, colleague, DocumentPermission::Read, colleague)
        .unwrap_err();
    assert!(matches!(
        error,
        DocumentServiceError::NotAuthorized {
            permission: DocumentPermission::Admin,
            ..
        }
    ));

    service
        .grant_permission(&document, colleague, DocumentPermission::Read, owner)
        .unwrap();
    assert_eq!(service.read_latest(&document, colleague).unwrap(), b"shared");

    let entry = service
        .revoke_permission(&document, colleague, DocumentPermission::Read, owner)
        .unwrap();
    assert!(!entry.granted);
    assert_eq!(
        service.read_latest(&document, colleague).unwrap_err().code(),
        "not_authorized"
    );

    let entries = service.repository().list_permissions(document.id).unwrap();
    assert!(entries
        .iter()
        .any(|entry| entry.user_id == colleague && !entry.granted));
}

#[test]
fn permission_kinds_do_not_imply_each_other() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let owner = Uuid::new_v4();
    let writer = Uuid::new_v4();

    let document = service
        .create_document(owner, b"body", "a.txt", "text/plain", "")
        .unwrap();
    service
        .grant_permission(&document, writer, DocumentPermission::Write, owner)
        .unwrap();

    assert_eq!(
        service.read_latest(&document, writer).unwrap_err().code(),
        "not_authorized"
    );
}

#[test]
fn permission_gate_reflects_grants_and_revocations() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    let document = service
        .create_document(owner, b"body", "a.txt", "text/plain", "")
        .unwrap();
    let gate = PermissionGate::new(service.repository());

    for permission in DocumentPermission::ALL {
        assert!(gate.has_permission(&document, owner, permission).unwrap());
        assert!(!gate.has_permission(&document, stranger, permission).unwrap());
    }
    assert!(gate.can_read(&document, owner).unwrap());
    assert!(gate.can_write(&document, owner).unwrap());
    assert!(!gate.can_read(&document, stranger).unwrap());
    assert!(!gate.can_write(&document, stranger).unwrap());

    service
        .grant_permission(&document, stranger, DocumentPermission::Read, owner)
        .unwrap();
    assert!(gate.can_read(&document, stranger).unwrap());
    assert!(!gate.can_write(&document, stranger).unwrap());

    service
        .revoke_permission(&document, stranger, DocumentPermission::Read, owner)
        .unwrap();
    assert!(!gate.can_read(&document, stranger).unwrap());

    service
        .revoke_permission(&document, owner, DocumentPermission::Write, owner)
        .unwrap();
    assert!(!gate.can_write(&document, owner).unwrap());
    assert!(gate.can_read(&document, owner).unwrap());
}
