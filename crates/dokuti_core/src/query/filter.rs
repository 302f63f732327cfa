//! Composable document predicates.

use crate::model::document::normalize_tag;
use crate::model::permission::DocumentPermission;
use crate::model::UserId;
use rusqlite::types::Value;

/// One condition a listed document must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentPredicate {
    /// Case-insensitive substring match on the document name.
    NameContains(String),
    /// Document carries the tag (case-insensitive).
    HasTag(String),
    /// Document has a value for the named attribute.
    HasAttribute(String),
    /// Document is a member of the named group (case-insensitive).
    InGroup(String),
    /// User holds a granted entry of the permission kind.
    PermissionGranted {
        user_id: UserId,
        permission: DocumentPermission,
    },
}

impl DocumentPredicate {
    fn to_sql(&self) -> (&'static str, Vec<Value>) {
        match self {
            Self::NameContains(fragment) => (
                "documents.name LIKE ? ESCAPE '\\'",
                vec![Value::Text(format!("%{}%", escape_like(fragment)))],
            ),
            Self::HasTag(tag) => (
                "EXISTS (
                    SELECT 1
                    FROM document_tags dt
                    INNER JOIN tags t ON t.id = dt.tag_id
                    WHERE dt.document_id = documents.id
                      AND t.name = ? COLLATE NOCASE
                )",
                vec![Value::Text(tag.clone())],
            ),
            Self::HasAttribute(name) => (
                "EXISTS (
                    SELECT 1
                    FROM document_attributes da
                    INNER JOIN attributes a ON a.id = da.attribute_id
                    WHERE da.document_id = documents.id
                      AND a.name = ?
                )",
                vec![Value::Text(name.clone())],
            ),
            Self::InGroup(name) => (
                "EXISTS (
                    SELECT 1
                    FROM group_memberships gm
                    INNER JOIN group_definitions g ON g.id = gm.group_id
                    WHERE gm.document_id = documents.id
                      AND g.name = ? COLLATE NOCASE
                )",
                vec![Value::Text(name.clone())],
            ),
            Self::PermissionGranted {
                user_id,
                permission,
            } => (
                "EXISTS (
                    SELECT 1
                    FROM document_permissions dp
                    WHERE dp.document_id = documents.id
                      AND dp.user_id = ?
                      AND dp.permission = ?
                      AND dp.granted = 1
                )",
                vec![
                    Value::Text(user_id.to_string()),
                    Value::Text(permission.as_str().to_string()),
                ],
            ),
        }
    }
}

/// SQL fragment and bind values for a filter over the `documents` table.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    pub where_sql: String,
    pub params: Vec<Value>,
}

/// Conjunction of document predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    predicates: Vec<DocumentPredicate>,
}

impl DocumentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one predicate, skipping exact duplicates.
    pub fn and(mut self, predicate: DocumentPredicate) -> Self {
        if !self.predicates.contains(&predicate) {
            self.predicates.push(predicate);
        }
        self
    }

    /// Blank fragments match every name and add nothing.
    pub fn name_contains(self, fragment: &str) -> Self {
        let trimmed = fragment.trim();
        if trimmed.is_empty() {
            return self;
        }
        self.and(DocumentPredicate::NameContains(trimmed.to_string()))
    }

    /// Requires every tag in `tags`; blank values are ignored.
    pub fn with_all_tags(self, tags: &[String]) -> Self {
        tags.iter()
            .filter_map(|tag| normalize_tag(tag))
            .fold(self, |filter, tag| filter.and(DocumentPredicate::HasTag(tag)))
    }

    /// Requires a value for every attribute in `names`.
    pub fn with_all_attributes(self, names: &[String]) -> Self {
        non_blank(names).fold(self, |filter, name| {
            filter.and(DocumentPredicate::HasAttribute(name))
        })
    }

    /// Requires membership in every group in `names`.
    pub fn in_all_groups(self, names: &[String]) -> Self {
        non_blank(names).fold(self, |filter, name| filter.and(DocumentPredicate::InGroup(name)))
    }

    /// Requires a granted `Read` entry for `user_id`.
    pub fn readable_by(self, user_id: UserId) -> Self {
        self.and(DocumentPredicate::PermissionGranted {
            user_id,
            permission: DocumentPermission::Read,
        })
    }

    pub fn predicates(&self) -> &[DocumentPredicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Compiles the conjunction into a `WHERE` body for `documents`.
    pub fn compile(&self) -> CompiledFilter {
        let mut where_sql = String::from("1 = 1");
        let mut params = Vec::new();

        for predicate in &self.predicates {
            let (clause, values) = predicate.to_sql();
            where_sql.push_str(" AND ");
            where_sql.push_str(clause);
            params.extend(values);
        }

        CompiledFilter { where_sql, params }
    }
}

fn non_blank(values: &[String]) -> impl Iterator<Item = String> + '_ {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
