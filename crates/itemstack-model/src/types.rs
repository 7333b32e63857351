//! Table schema, condition and request types.
//!
//! Structs use `#[serde(rename_all = "PascalCase")]` to match the field naming
//! of the generic item API. Enum variants map to `SCREAMING_SNAKE_CASE` tags.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attribute_value::{AttributeType, AttributeValue};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Declares a predefined attribute: one that gets its own physical column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeDefinition {
    /// The attribute name.
    pub attribute_name: String,
    /// The attribute type.
    pub attribute_type: AttributeType,
}

impl AttributeDefinition {
    /// Create a new attribute definition.
    #[must_use]
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            attribute_name: name.into(),
            attribute_type,
        }
    }
}

/// A secondary index over one predefined attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IndexDefinition {
    /// The index name, unique within its table.
    pub index_name: String,
    /// The indexed attribute.
    pub attribute_name: String,
}

impl IndexDefinition {
    /// Create a new index definition.
    #[must_use]
    pub fn new(index_name: impl Into<String>, attribute_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            attribute_name: attribute_name.into(),
        }
    }
}

/// The generic definition of a table.
///
/// `key_attributes` holds the hash attribute first and, optionally, the range
/// attribute second. Both must be declared in `attribute_definitions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableSchema {
    /// The table name.
    pub table_name: String,
    /// Predefined attributes, keys included.
    pub attribute_definitions: BTreeSet<AttributeDefinition>,
    /// Hash attribute name, then the optional range attribute name.
    pub key_attributes: Vec<String>,
    /// Secondary indexes.
    #[serde(default)]
    pub index_definitions: BTreeSet<IndexDefinition>,
}

impl TableSchema {
    /// Create a new table schema.
    #[must_use]
    pub fn new(
        table_name: impl Into<String>,
        attribute_definitions: impl IntoIterator<Item = AttributeDefinition>,
        key_attributes: impl IntoIterator<Item = impl Into<String>>,
        index_definitions: impl IntoIterator<Item = IndexDefinition>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            attribute_definitions: attribute_definitions.into_iter().collect(),
            key_attributes: key_attributes.into_iter().map(Into::into).collect(),
            index_definitions: index_definitions.into_iter().collect(),
        }
    }

    /// The hash attribute name.
    #[must_use]
    pub fn hash_key(&self) -> Option<&str> {
        self.key_attributes.first().map(String::as_str)
    }

    /// The range attribute name, if the table has one.
    #[must_use]
    pub fn range_key(&self) -> Option<&str> {
        self.key_attributes.get(1).map(String::as_str)
    }

    /// Returns `true` if `name` is one of the key attributes.
    #[must_use]
    pub fn is_key(&self, name: &str) -> bool {
        self.key_attributes.iter().any(|k| k == name)
    }

    /// The declared type of a predefined attribute.
    #[must_use]
    pub fn attribute_type(&self, name: &str) -> Option<AttributeType> {
        self.attribute_definitions
            .iter()
            .find(|d| d.attribute_name == name)
            .map(|d| d.attribute_type)
    }

    /// Returns `true` if `name` is declared in the schema (keys included).
    #[must_use]
    pub fn is_predefined(&self, name: &str) -> bool {
        self.attribute_type(name).is_some()
    }

    /// The index defined over `attribute_name`, if any.
    #[must_use]
    pub fn index_on(&self, attribute_name: &str) -> Option<&IndexDefinition> {
        self.index_definitions
            .iter()
            .find(|i| i.attribute_name == attribute_name)
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionOp {
    /// Equal.
    #[serde(rename = "EQ")]
    Eq,
    /// Less than.
    #[serde(rename = "LT")]
    Lt,
    /// Less than or equal.
    #[serde(rename = "LE")]
    Le,
    /// Greater than.
    #[serde(rename = "GT")]
    Gt,
    /// Greater than or equal.
    #[serde(rename = "GE")]
    Ge,
}

impl ConditionOp {
    /// Returns `true` for the non-equality operators.
    #[must_use]
    pub fn is_relational(&self) -> bool {
        !matches!(self, Self::Eq)
    }

    /// Returns the wire-format name of this operator.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "EQ",
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Gt => "GT",
            Self::Ge => "GE",
        }
    }
}

impl fmt::Display for ConditionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predicate over one attribute.
///
/// Relational operators are only accepted on the range attribute or on an
/// indexed predefined attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Condition {
    /// The comparison operator.
    pub comparison_operator: ConditionOp,
    /// The value compared against.
    pub attribute_value: AttributeValue,
}

impl Condition {
    /// Create a condition with an explicit operator.
    #[must_use]
    pub fn new(op: ConditionOp, value: impl Into<AttributeValue>) -> Self {
        Self {
            comparison_operator: op,
            attribute_value: value.into(),
        }
    }

    /// `attribute = value`.
    #[must_use]
    pub fn eq(value: impl Into<AttributeValue>) -> Self {
        Self::new(ConditionOp::Eq, value)
    }

    /// `attribute < value`.
    #[must_use]
    pub fn lt(value: impl Into<AttributeValue>) -> Self {
        Self::new(ConditionOp::Lt, value)
    }

    /// `attribute <= value`.
    #[must_use]
    pub fn le(value: impl Into<AttributeValue>) -> Self {
        Self::new(ConditionOp::Le, value)
    }

    /// `attribute > value`.
    #[must_use]
    pub fn gt(value: impl Into<AttributeValue>) -> Self {
        Self::new(ConditionOp::Gt, value)
    }

    /// `attribute >= value`.
    #[must_use]
    pub fn ge(value: impl Into<AttributeValue>) -> Self {
        Self::new(ConditionOp::Ge, value)
    }
}

/// A precondition on the current state of an item, checked before a write.
///
/// Accepted by the write requests but not evaluated yet: the column store's
/// conditional-write primitive is not wired in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpectedCondition {
    /// The attribute must exist.
    #[serde(rename = "EXISTS")]
    Exists,
    /// The attribute must not exist.
    #[serde(rename = "NOT_EXISTS")]
    NotExists,
    /// The attribute must hold exactly this value.
    #[serde(rename = "VALUE")]
    Value(AttributeValue),
}

impl ExpectedCondition {
    /// The attribute must exist.
    #[must_use]
    pub fn exists() -> Self {
        Self::Exists
    }

    /// The attribute must not exist.
    #[must_use]
    pub fn not_exists() -> Self {
        Self::NotExists
    }

    /// The attribute must equal `value`.
    #[must_use]
    pub fn value(value: impl Into<AttributeValue>) -> Self {
        Self::Value(value.into())
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A single attribute change applied by `update_item`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateItemAction {
    /// Set or replace the attribute.
    #[serde(rename = "PUT")]
    Put(AttributeValue),
    /// Remove the attribute.
    #[serde(rename = "DELETE")]
    Delete,
}

impl UpdateItemAction {
    /// Set or replace the attribute with `value`.
    #[must_use]
    pub fn put(value: impl Into<AttributeValue>) -> Self {
        Self::Put(value.into())
    }

    /// Remove the attribute.
    #[must_use]
    pub fn delete() -> Self {
        Self::Delete
    }
}

/// Request for `delete_item`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteItemRequest {
    /// The table holding the item.
    pub table_name: String,
    /// Equality conditions on every key attribute.
    pub keys: HashMap<String, Condition>,
    /// Preconditions on the stored item.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expected: HashMap<String, ExpectedCondition>,
}

impl DeleteItemRequest {
    /// Create a new unconditional delete request.
    #[must_use]
    pub fn new(table_name: impl Into<String>, keys: HashMap<String, Condition>) -> Self {
        Self {
            table_name: table_name.into(),
            keys,
            expected: HashMap::new(),
        }
    }

    /// Attach preconditions to this request.
    #[must_use]
    pub fn with_expected(mut self, expected: HashMap<String, ExpectedCondition>) -> Self {
        self.expected = expected;
        self
    }
}

/// Identifies the caller. The tenant owns a set of tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestContext {
    /// The tenant name.
    pub tenant: String,
}

impl RequestContext {
    /// Create a context for `tenant`.
    #[must_use]
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
        }
    }
}

/// One page of a table listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListTablesPage {
    /// Table names in this page, sorted.
    pub table_names: Vec<String>,
    /// Set when more names follow; pass it back to resume after this page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_evaluated_table_name: Option<String>,
}
