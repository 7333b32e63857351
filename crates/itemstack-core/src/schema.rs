//! Projection of generic table schemas onto the physical column layout.
//!
//! # Layout
//!
//! ```text
//! user_<hash>   <type>            partition key
//! user_<range>  <type>            clustering column (optional)
//! user_<attr>   <type>            one column per predefined attribute
//! system_hash        decimal          row marker, always 1
//! system_attrs       map<text, blob>  dynamic attribute values
//! system_attr_types  map<text, text>  type tag of every attribute present
//! system_attr_exist  set<text>        names of every attribute present
//! ```
//!
//! Every table gets an index on `system_hash`, plus one index per
//! [`IndexDefinition`]. The store scopes index names to the keyspace, so the
//! physical name is `<table>_idx_<index>` with every `_` of the table name
//! doubled: `a` + `b_c` gives `a_idx_b_c` while `a_b` + `c` gives `a__b_idx_c`.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use itemstack_model::types::{AttributeDefinition, IndexDefinition, TableSchema};
use itemstack_model::{AttributeType, StorageError};

use crate::codec::{to_generic_type, to_physical_type};
use crate::statement::system_schema as ss;
use crate::statement::{ColumnDef, ColumnType, CqlScalar, CqlValue, Row};

/// Prefix of key and predefined attribute columns.
pub const USER_PREFIX: &str = "user_";
/// Row marker column.
pub const SYSTEM_HASH: &str = "system_hash";
/// Dynamic attribute values.
pub const SYSTEM_ATTRS: &str = "system_attrs";
/// Type tags of every attribute present.
pub const SYSTEM_ATTR_TYPES: &str = "system_attr_types";
/// Names of every attribute present.
pub const SYSTEM_ATTR_EXIST: &str = "system_attr_exist";

const SYSTEM_PREFIX: &str = "system_";

const INDEX_SEPARATOR: &str = "_idx_";

/// Longest accepted table name.
pub const MAX_TABLE_NAME_LEN: usize = 48;

/// The overflow and marker columns every table carries.
pub const SYSTEM_COLUMNS: [(&str, ColumnType); 4] = [
    (SYSTEM_HASH, ColumnType::Scalar(CqlScalar::Decimal)),
    (SYSTEM_ATTRS, ColumnType::Map(CqlScalar::Text, CqlScalar::Blob)),
    (SYSTEM_ATTR_TYPES, ColumnType::Map(CqlScalar::Text, CqlScalar::Text)),
    (SYSTEM_ATTR_EXIST, ColumnType::Set(CqlScalar::Text)),
];

/// Column holding the attribute `name`.
#[must_use]
pub fn user_column(name: &str) -> String {
    format!("{USER_PREFIX}{name}")
}

/// Physical name of index `index_name` on `table`.
#[must_use]
pub fn physical_index_name(table: &str, index_name: &str) -> String {
    format!("{}{index_name}", index_name_prefix(table))
}

/// The part of every physical index name of `table` before the index name.
fn index_name_prefix(table: &str) -> String {
    format!("{}{INDEX_SEPARATOR}", table.replace('_', "__"))
}

/// The physical definition of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalTable {
    /// Table name.
    pub name: String,
    /// Every column: keys first, then predefined, then system columns.
    pub columns: Vec<ColumnDef>,
    /// Partition key column.
    pub partition_key: String,
    /// Clustering column.
    pub clustering_key: Option<String>,
    /// Physical index name and indexed column.
    pub indexes: Vec<(String, String)>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Check that `name` can be used as a table name.
pub fn validate_table_name(name: &str) -> Result<(), StorageError> {
    let starts_with_letter = name.bytes().next().is_some_and(|b| b.is_ascii_alphabetic());
    if !is_identifier(name) || !starts_with_letter || name.len() > MAX_TABLE_NAME_LEN {
        return Err(StorageError::schema(format!(
            "invalid table name '{name}': expected a letter followed by at most {} \
             letters, digits or underscores",
            MAX_TABLE_NAME_LEN - 1
        )));
    }
    Ok(())
}

/// Check that `tenant` can be used as a keyspace name.
pub fn validate_tenant(tenant: &str) -> Result<(), StorageError> {
    validate_table_name(tenant)
        .map_err(|_| StorageError::schema(format!("invalid tenant name '{tenant}'")))
}

/// Validate a table schema before projecting it.
pub fn validate(schema: &TableSchema) -> Result<(), StorageError> {
    validate_table_name(&schema.table_name)?;

    let mut names = HashSet::new();
    for def in &schema.attribute_definitions {
        if !is_identifier(&def.attribute_name) {
            return Err(StorageError::schema(format!(
                "invalid attribute name '{}'",
                def.attribute_name
            )));
        }
        if !names.insert(def.attribute_name.as_str()) {
            return Err(StorageError::schema(format!(
                "attribute '{}' is defined more than once",
                def.attribute_name
            )));
        }
    }

    match schema.key_attributes.len() {
        0 => return Err(StorageError::schema("a hash key attribute is required")),
        1 | 2 => {}
        n => {
            return Err(StorageError::schema(format!(
                "at most two key attributes are allowed, got {n}"
            )));
        }
    }
    if schema.range_key().is_some() && schema.hash_key() == schema.range_key() {
        return Err(StorageError::schema("hash and range key must differ"));
    }
    for key in &schema.key_attributes {
        match schema.attribute_type(key) {
            None => {
                return Err(StorageError::schema(format!(
                    "key attribute '{key}' is not defined"
                )));
            }
            Some(t) if t.is_set() => {
                return Err(StorageError::schema(format!(
                    "key attribute '{key}' cannot be of set type {t}"
                )));
            }
            Some(_) => {}
        }
    }

    let mut index_names = HashSet::new();
    for index in &schema.index_definitions {
        if !is_identifier(&index.index_name) {
            return Err(StorageError::schema(format!(
                "invalid index name '{}'",
                index.index_name
            )));
        }
        if index.index_name == SYSTEM_HASH {
            return Err(StorageError::schema(format!(
                "index name '{SYSTEM_HASH}' is reserved"
            )));
        }
        if !index_names.insert(index.index_name.as_str()) {
            return Err(StorageError::schema(format!(
                "index '{}' is defined more than once",
                index.index_name
            )));
        }
        match schema.attribute_type(&index.attribute_name) {
            None => {
                return Err(StorageError::schema(format!(
                    "index '{}' refers to undefined attribute '{}'",
                    index.index_name, index.attribute_name
                )));
            }
            Some(t) if t.is_set() => {
                return Err(StorageError::schema(format!(
                    "index '{}' cannot cover set attribute '{}'",
                    index.index_name, index.attribute_name
                )));
            }
            Some(_) => {}
        }
        if schema.hash_key() == Some(index.attribute_name.as_str()) {
            return Err(StorageError::schema(format!(
                "index '{}' cannot cover the hash key",
                index.index_name
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Derive the physical table for `schema`, validating it first.
pub fn project(schema: &TableSchema) -> Result<PhysicalTable, StorageError> {
    validate(schema)?;

    let column = |name: &str, t: AttributeType| ColumnDef::new(user_column(name), to_physical_type(t));

    let mut columns = Vec::with_capacity(schema.attribute_definitions.len() + SYSTEM_COLUMNS.len());
    for key in &schema.key_attributes {
        if let Some(t) = schema.attribute_type(key) {
            columns.push(column(key, t));
        }
    }
    columns.extend(
        schema
            .attribute_definitions
            .iter()
            .filter(|d| !schema.is_key(&d.attribute_name))
            .map(|d| column(&d.attribute_name, d.attribute_type)),
    );
    columns.extend(
        SYSTEM_COLUMNS
            .iter()
            .map(|(name, t)| ColumnDef::new(*name, *t)),
    );

    let mut indexes = vec![(
        physical_index_name(&schema.table_name, SYSTEM_HASH),
        SYSTEM_HASH.to_owned(),
    )];
    indexes.extend(schema.index_definitions.iter().map(|i| {
        (
            physical_index_name(&schema.table_name, &i.index_name),
            user_column(&i.attribute_name),
        )
    }));

    Ok(PhysicalTable {
        name: schema.table_name.clone(),
        columns,
        partition_key: schema
            .hash_key()
            .map(user_column)
            .unwrap_or_default(),
        clustering_key: schema.range_key().map(user_column),
        indexes,
    })
}

// ---------------------------------------------------------------------------
// Reconstruction
// ---------------------------------------------------------------------------

fn text_column<'a>(row: &'a Row, column: &str) -> Result<&'a str, StorageError> {
    row.get(column).and_then(CqlValue::as_text).ok_or_else(|| {
        StorageError::encoding(format!("metadata row is missing text column '{column}'"))
    })
}

/// Rebuild the schema of `table_name` from `system_schema` metadata rows.
///
/// Fails with `NotFound` when `column_rows` is empty.
pub fn reconstruct(
    table_name: &str,
    column_rows: &[Row],
    index_rows: &[Row],
) -> Result<TableSchema, StorageError> {
    if column_rows.is_empty() {
        return Err(StorageError::not_found(format!(
            "table '{table_name}' does not exist"
        )));
    }

    let mut definitions = BTreeSet::new();
    let mut keys: BTreeMap<u8, String> = BTreeMap::new();
    for row in column_rows {
        let column_name = text_column(row, ss::COLUMN_NAME)?;
        let Some(name) = column_name.strip_prefix(USER_PREFIX) else {
            continue;
        };
        let column_type = text_column(row, ss::TYPE)?
            .parse::<ColumnType>()
            .map_err(|e| StorageError::encoding(e.to_string()).with_source(e))?;
        definitions.insert(AttributeDefinition::new(name, to_generic_type(column_type)?));

        match text_column(row, ss::KIND)? {
            ss::KIND_PARTITION_KEY => {
                keys.insert(0, name.to_owned());
            }
            ss::KIND_CLUSTERING => {
                keys.insert(1, name.to_owned());
            }
            _ => {}
        }
    }
    if !keys.contains_key(&0) {
        return Err(StorageError::encoding(format!(
            "table '{table_name}' has no partition key attribute"
        )));
    }

    let prefix = index_name_prefix(table_name);
    let mut indexes = BTreeSet::new();
    for row in index_rows {
        let index_name = text_column(row, ss::INDEX_NAME)?;
        let target = row
            .get(ss::OPTIONS)
            .and_then(CqlValue::as_map)
            .and_then(|options| options.get(&CqlValue::from(ss::TARGET)))
            .and_then(CqlValue::as_text)
            .ok_or_else(|| {
                StorageError::encoding(format!("index '{index_name}' has no target column"))
            })?;
        if target.starts_with(SYSTEM_PREFIX) {
            continue;
        }
        let Some(attribute) = target.strip_prefix(USER_PREFIX) else {
            continue;
        };
        let name = index_name.strip_prefix(&prefix).unwrap_or(index_name);
        indexes.insert(IndexDefinition::new(name, attribute));
    }

    Ok(TableSchema {
        table_name: table_name.to_owned(),
        attribute_definitions: definitions,
        key_attributes: keys.into_values().collect(),
        index_definitions: indexes,
    })
}
