//! Compilation of generic operations into column-store statements.
//!
//! The compiler performs no I/O. Everything it rejects fails before a
//! statement reaches the store:
//!
//! - a select must fix the hash key by equality;
//! - besides the keys, a select may constrain at most one predefined attribute,
//!   and only one that is indexed;
//! - at most one condition may be relational, and a relational range condition
//!   cannot be combined with an indexed condition;
//! - writes must identify exactly one row by equality on every key attribute.
//!
//! The store only serves an index lookup on an equality. A relational indexed
//! condition is therefore paired with `system_hash = 1`, which every row holds,
//! and the store filters the indexed column with `ALLOW FILTERING`.

use std::collections::HashMap;

use itemstack_model::types::{Condition, DeleteItemRequest, TableSchema, UpdateItemAction};
use itemstack_model::{AttributeValue, Item, Number, StorageError};

use crate::marshal::{encode_predefined, put_assignments, update_assignments};
use crate::schema::{PhysicalTable, SYSTEM_HASH, user_column};
use crate::statement::{Relation, Selection, Statement};

// ---------------------------------------------------------------------------
// DDL
// ---------------------------------------------------------------------------

/// `CREATE TABLE` followed by one `CREATE INDEX` per index.
#[must_use]
pub fn create_table(keyspace: &str, table: &PhysicalTable) -> (Statement, Vec<Statement>) {
    let create = Statement::CreateTable {
        keyspace: keyspace.to_owned(),
        table: table.name.clone(),
        columns: table.columns.clone(),
        partition_key: table.partition_key.clone(),
        clustering_key: table.clustering_key.clone(),
    };
    let indexes = table
        .indexes
        .iter()
        .map(|(index_name, column)| Statement::CreateIndex {
            keyspace: keyspace.to_owned(),
            table: table.name.clone(),
            index_name: index_name.clone(),
            column: column.clone(),
        })
        .collect();
    (create, indexes)
}

/// `DROP TABLE`.
#[must_use]
pub fn drop_table(keyspace: &str, table: &str) -> Statement {
    Statement::DropTable {
        keyspace: keyspace.to_owned(),
        table: table.to_owned(),
    }
}

/// Table names of `keyspace`.
#[must_use]
pub fn list_tables(keyspace: &str) -> Statement {
    Statement::ListTables {
        keyspace: keyspace.to_owned(),
    }
}

/// Column and index metadata of `table`.
#[must_use]
pub fn describe_table(keyspace: &str, table: &str) -> (Statement, Statement) {
    (
        Statement::DescribeColumns {
            keyspace: keyspace.to_owned(),
            table: table.to_owned(),
        },
        Statement::DescribeIndexes {
            keyspace: keyspace.to_owned(),
            table: table.to_owned(),
        },
    )
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

fn relation(
    schema: &TableSchema,
    name: &str,
    condition: &Condition,
) -> Result<Relation, StorageError> {
    let declared = schema.attribute_type(name).ok_or_else(|| {
        StorageError::query(format!("attribute '{name}' cannot be used in a condition"))
    })?;
    Ok(Relation::new(
        user_column(name),
        condition.comparison_operator.into(),
        encode_predefined(name, declared, &condition.attribute_value)?,
    ))
}

/// Equality relations on every key attribute, hash first.
fn key_relations(
    schema: &TableSchema,
    keys: &HashMap<String, Condition>,
) -> Result<Vec<Relation>, StorageError> {
    if let Some(extra) = keys.keys().find(|name| !schema.is_key(name)) {
        return Err(StorageError::query(format!(
            "'{extra}' is not a key attribute of table '{}'",
            schema.table_name
        )));
    }
    schema
        .key_attributes
        .iter()
        .map(|name| match keys.get(name) {
            Some(condition) if !condition.comparison_operator.is_relational() => {
                relation(schema, name, condition)
            }
            Some(condition) => Err(StorageError::query(format!(
                "key attribute '{name}' requires an equality condition, got {}",
                condition.comparison_operator
            ))),
            None => Err(StorageError::query(format!(
                "key attribute '{name}' is missing"
            ))),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Select
// ---------------------------------------------------------------------------

/// Compile a select over `schema`'s table.
pub fn select(
    keyspace: &str,
    schema: &TableSchema,
    conditions: &HashMap<String, Condition>,
    limit: Option<usize>,
) -> Result<Statement, StorageError> {
    if limit == Some(0) {
        return Err(StorageError::query("limit must be positive"));
    }

    let hash_key = schema.hash_key().unwrap_or_default();
    let range_key = schema.range_key();

    let hash = match conditions.get(hash_key) {
        Some(c) if !c.comparison_operator.is_relational() => relation(schema, hash_key, c)?,
        Some(c) => {
            return Err(StorageError::query(format!(
                "hash key '{hash_key}' requires an equality condition, got {}",
                c.comparison_operator
            )));
        }
        None => {
            return Err(StorageError::query(format!(
                "an equality condition on hash key '{hash_key}' is required"
            )));
        }
    };

    let mut range = None;
    let mut indexed = None;
    for (name, condition) in conditions {
        if name == hash_key {
            continue;
        }
        if Some(name.as_str()) == range_key {
            range = Some((name, condition));
        } else if schema.index_on(name).is_some() {
            if let Some((other, _)) = indexed {
                return Err(StorageError::query(format!(
                    "at most one indexed condition is allowed, got '{other}' and '{name}'"
                )));
            }
            indexed = Some((name, condition));
        } else if schema.is_predefined(name) {
            return Err(StorageError::query(format!(
                "attribute '{name}' is not indexed"
            )));
        } else {
            return Err(StorageError::query(format!(
                "attribute '{name}' cannot be used in a condition"
            )));
        }
    }

    let relational = |c: Option<(&String, &Condition)>| {
        c.is_some_and(|(_, c)| c.comparison_operator.is_relational())
    };
    if relational(range) && relational(indexed) {
        return Err(StorageError::query(
            "at most one relational condition is allowed",
        ));
    }
    if relational(range) && indexed.is_some() {
        return Err(StorageError::query(
            "a relational range condition cannot be combined with an indexed condition",
        ));
    }

    let allow_filtering = relational(indexed);
    let mut relations = vec![hash];
    if allow_filtering {
        relations.push(Relation::eq(SYSTEM_HASH, Number::from(1_i64)));
    }
    for (name, condition) in range.into_iter().chain(indexed) {
        relations.push(relation(schema, name, condition)?);
    }

    Ok(Statement::Select {
        keyspace: keyspace.to_owned(),
        table: schema.table_name.clone(),
        selection: Selection::All,
        relations,
        limit,
        allow_filtering,
    })
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Compile `actions` on the row identified by `keys` into one `UPDATE`.
pub fn update(
    keyspace: &str,
    schema: &TableSchema,
    keys: &HashMap<String, Condition>,
    actions: &HashMap<String, UpdateItemAction>,
) -> Result<Statement, StorageError> {
    let relations = key_relations(schema, keys)?;
    Ok(Statement::Update {
        keyspace: keyspace.to_owned(),
        table: schema.table_name.clone(),
        assignments: update_assignments(schema, actions)?,
        relations,
    })
}

/// Compile a whole-row replace of `item` into one `UPDATE`.
pub fn put(keyspace: &str, schema: &TableSchema, item: &Item) -> Result<Statement, StorageError> {
    let keys = schema
        .key_attributes
        .iter()
        .map(|name| {
            item.get(name)
                .map(|v: &AttributeValue| (name.clone(), Condition::eq(v.clone())))
                .ok_or_else(|| StorageError::query(format!("item is missing key attribute '{name}'")))
        })
        .collect::<Result<HashMap<_, _>, _>>()?;

    Ok(Statement::Update {
        keyspace: keyspace.to_owned(),
        table: schema.table_name.clone(),
        relations: key_relations(schema, &keys)?,
        assignments: put_assignments(schema, item)?,
    })
}

/// Compile a single-row delete.
///
/// Expected conditions are not evaluated yet and fail with `Unsupported`.
pub fn delete(
    keyspace: &str,
    schema: &TableSchema,
    request: &DeleteItemRequest,
) -> Result<Statement, StorageError> {
    if !request.expected.is_empty() {
        return Err(StorageError::unsupported(
            "conditional delete is not supported",
        ));
    }
    Ok(Statement::Delete {
        keyspace: keyspace.to_owned(),
        table: schema.table_name.clone(),
        relations: key_relations(schema, &request.keys)?,
    })
}
