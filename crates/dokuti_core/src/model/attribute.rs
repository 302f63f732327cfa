//! Attribute definitions, value rules and document associations.
//!
//! # Responsibility
//! - Model attribute definitions whose validation is a pluggable rule object.
//! - Provide a lookup contract for definitions by name.
//!
//! # Invariants
//! - An association's `is_valid` flag is computed from its definition's rule
//!   at construction time and never recomputed.
//! - Invalid associations are rejected by the service and never persisted.

use super::{DocumentId, UserId};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Validation strategy for attribute values.
pub trait AttributeValueRule: Send + Sync {
    fn is_valid(&self, value: &str) -> bool;

    /// Short human-readable rule summary used in error messages.
    fn describe(&self) -> String;
}

/// Accepts every value.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyValue;

impl AttributeValueRule for AnyValue {
    fn is_valid(&self, _value: &str) -> bool {
        true
    }

    fn describe(&self) -> String {
        "any value".to_string()
    }
}

/// Accepts only values from a fixed set (exact match).
#[derive(Debug, Clone)]
pub struct AllowedValues {
    values: BTreeSet<String>,
}

impl AllowedValues {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl AttributeValueRule for AllowedValues {
    fn is_valid(&self, value: &str) -> bool {
        self.values.contains(value)
    }

    fn describe(&self) -> String {
        let listed: Vec<&str> = self.values.iter().map(String::as_str).collect();
        format!("one of [{}]", listed.join(", "))
    }
}

/// Accepts values fully matching a regular expression.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pattern: Regex,
}

impl PatternRule {
    /// Compiles `pattern` anchored to the whole value.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(&format!("^(?:{pattern})$"))?,
        })
    }
}

impl AttributeValueRule for PatternRule {
    fn is_valid(&self, value: &str) -> bool {
        self.pattern.is_match(value)
    }

    fn describe(&self) -> String {
        format!("matching `{}`", self.pattern.as_str())
    }
}

/// Accepts non-empty values of at most `max_chars` characters.
#[derive(Debug, Clone, Copy)]
pub struct MaxLength {
    pub max_chars: usize,
}

impl AttributeValueRule for MaxLength {
    fn is_valid(&self, value: &str) -> bool {
        let count = value.chars().count();
        count > 0 && count <= self.max_chars
    }

    fn describe(&self) -> String {
        format!("1..={} characters", self.max_chars)
    }
}

/// Named attribute with its validation rule.
#[derive(Clone)]
pub struct AttributeDefinition {
    name: String,
    rule: Arc<dyn AttributeValueRule>,
}

impl AttributeDefinition {
    pub fn new(name: impl Into<String>, rule: impl AttributeValueRule + 'static) -> Self {
        Self {
            name: name.into(),
            rule: Arc::new(rule),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn validate(&self, value: &str) -> bool {
        self.rule.is_valid(value)
    }

    pub fn rule_description(&self) -> String {
        self.rule.describe()
    }
}

impl Debug for AttributeDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeDefinition")
            .field("name", &self.name)
            .field("rule", &self.rule.describe())
            .finish()
    }
}

/// Supplies attribute definitions by name.
pub trait AttributeDefinitionProvider {
    fn definition(&self, name: &str) -> Option<AttributeDefinition>;
}

/// In-memory attribute definition provider.
#[derive(Debug, Clone, Default)]
pub struct AttributeRegistry {
    definitions: BTreeMap<String, AttributeDefinition>,
}

impl AttributeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `definition`, replacing any definition with the same name.
    pub fn register(&mut self, definition: AttributeDefinition) {
        self.definitions
            .insert(definition.name().to_string(), definition);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }
}

impl AttributeDefinitionProvider for AttributeRegistry {
    fn definition(&self, name: &str) -> Option<AttributeDefinition> {
        self.definitions.get(name).cloned()
    }
}

/// Attribute value attached to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeAssociation {
    pub document_id: DocumentId,
    pub attribute_name: String,
    pub value: String,
    pub set_by: UserId,
    pub is_valid: bool,
}

impl AttributeAssociation {
    /// Builds an association and evaluates `definition`'s rule against `value`.
    pub fn new(
        document_id: DocumentId,
        definition: &AttributeDefinition,
        value: impl Into<String>,
        set_by: UserId,
    ) -> Self {
        let value = value.into();
        let is_valid = definition.validate(&value);
        Self {
            document_id,
            attribute_name: definition.name().to_string(),
            value,
            set_by,
            is_valid,
        }
    }
}
