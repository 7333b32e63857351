//! Translation between physical rows and generic items.
//!
//! Reads go through [`decode_row`]; writes are expressed as the list of
//! [`Assignment`]s an `UPDATE` applies to one row. Key columns never appear in
//! assignments: they identify the row in the `WHERE` clause.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use itemstack_model::types::{TableSchema, UpdateItemAction};
use itemstack_model::{AttributeType, AttributeValue, Item, Number, StorageError};

use crate::codec::{decode, decode_overflow, encode, encode_overflow, parse_type_tag, type_tag};
use crate::schema::{SYSTEM_ATTR_EXIST, SYSTEM_ATTR_TYPES, SYSTEM_ATTRS, SYSTEM_HASH, user_column};
use crate::statement::{Assignment, CqlValue, Row};

/// Decode a row of `schema`'s table into an item.
///
/// The item holds every non-null key or predefined column plus every dynamic
/// attribute named in the presence set.
pub fn decode_row(schema: &TableSchema, row: &Row) -> Result<Item, StorageError> {
    let mut item = Item::new();
    for def in &schema.attribute_definitions {
        if let Some(value) = row.get(&user_column(&def.attribute_name)) {
            item.insert(def.attribute_name.clone(), decode(value, def.attribute_type)?);
        }
    }

    let Some(present) = row.get(SYSTEM_ATTR_EXIST).and_then(CqlValue::as_set) else {
        return Ok(item);
    };
    let values = row.get(SYSTEM_ATTRS).and_then(CqlValue::as_map);
    let types = row.get(SYSTEM_ATTR_TYPES).and_then(CqlValue::as_map);

    for name in present.iter().filter_map(CqlValue::as_text) {
        if schema.is_predefined(name) {
            continue;
        }
        let key = CqlValue::from(name);
        let bytes = match values.and_then(|m| m.get(&key)) {
            Some(CqlValue::Blob(b)) => b,
            _ => {
                return Err(StorageError::encoding(format!(
                    "attribute '{name}' is marked present but has no stored value"
                )));
            }
        };
        let tag = types
            .and_then(|m| m.get(&key))
            .and_then(CqlValue::as_text)
            .ok_or_else(|| {
                StorageError::encoding(format!("attribute '{name}' has no stored type"))
            })?;
        item.insert(name.to_owned(), decode_overflow(bytes, parse_type_tag(tag)?)?);
    }
    Ok(item)
}

/// Restrict `item` to the attributes in `names`. Absent names are skipped.
#[must_use]
pub fn project(mut item: Item, names: &[String]) -> Item {
    names
        .iter()
        .filter_map(|name| item.remove_entry(name))
        .collect()
}

/// Encode `value` for the column of a predefined attribute declared as
/// `declared`.
pub fn encode_predefined(
    name: &str,
    declared: AttributeType,
    value: &AttributeValue,
) -> Result<CqlValue, StorageError> {
    if value.attr_type() != declared {
        return Err(StorageError::encoding(format!(
            "attribute '{name}' is declared as {declared} but got {}",
            value.attr_type()
        )));
    }
    encode(value)
}

fn row_marker() -> Assignment {
    Assignment::Set {
        column: SYSTEM_HASH.to_owned(),
        value: Some(CqlValue::Decimal(Number::from(1_i64))),
    }
}

/// Pending changes to the three overflow columns.
#[derive(Debug, Default)]
struct OverflowChanges {
    values_put: BTreeMap<CqlValue, CqlValue>,
    values_remove: BTreeSet<CqlValue>,
    types_put: BTreeMap<CqlValue, CqlValue>,
    types_remove: BTreeSet<CqlValue>,
    exist_add: BTreeSet<CqlValue>,
    exist_remove: BTreeSet<CqlValue>,
}

impl OverflowChanges {
    fn mark_present(&mut self, name: &str, attr_type: AttributeType) {
        self.types_put
            .insert(CqlValue::from(name), CqlValue::from(type_tag(attr_type)));
        self.exist_add.insert(CqlValue::from(name));
    }

    fn mark_absent(&mut self, name: &str) {
        self.types_remove.insert(CqlValue::from(name));
        self.exist_remove.insert(CqlValue::from(name));
    }

    fn into_assignments(self, assignments: &mut Vec<Assignment>) {
        let column = |name: &str| name.to_owned();
        if !self.values_put.is_empty() {
            assignments.push(Assignment::MapPut {
                column: column(SYSTEM_ATTRS),
                entries: self.values_put,
            });
        }
        if !self.values_remove.is_empty() {
            assignments.push(Assignment::MapRemove {
                column: column(SYSTEM_ATTRS),
                keys: self.values_remove,
            });
        }
        if !self.types_put.is_empty() {
            assignments.push(Assignment::MapPut {
                column: column(SYSTEM_ATTR_TYPES),
                entries: self.types_put,
            });
        }
        if !self.types_remove.is_empty() {
            assignments.push(Assignment::MapRemove {
                column: column(SYSTEM_ATTR_TYPES),
                keys: self.types_remove,
            });
        }
        if !self.exist_add.is_empty() {
            assignments.push(Assignment::SetAdd {
                column: column(SYSTEM_ATTR_EXIST),
                elements: self.exist_add,
            });
        }
        if !self.exist_remove.is_empty() {
            assignments.push(Assignment::SetRemove {
                column: column(SYSTEM_ATTR_EXIST),
                elements: self.exist_remove,
            });
        }
    }
}

/// Column writes applying `actions` to one row.
///
/// Key attributes are recorded in the type map and presence set so that an
/// upserted row is self-describing. Actions on key attributes fail with
/// `QueryError`.
pub fn update_assignments(
    schema: &TableSchema,
    actions: &HashMap<String, UpdateItemAction>,
) -> Result<Vec<Assignment>, StorageError> {
    let mut assignments = vec![row_marker()];
    let mut overflow = OverflowChanges::default();

    for key in &schema.key_attributes {
        if let Some(t) = schema.attribute_type(key) {
            overflow.mark_present(key, t);
        }
    }

    let mut sorted: Vec<_> = actions.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    for (name, action) in sorted {
        if schema.is_key(name) {
            return Err(StorageError::query(format!(
                "key attribute '{name}' cannot be updated"
            )));
        }
        match (schema.attribute_type(name), action) {
            (Some(declared), UpdateItemAction::Put(value)) => {
                assignments.push(Assignment::Set {
                    column: user_column(name),
                    value: Some(encode_predefined(name, declared, value)?),
                });
                overflow.mark_present(name, declared);
            }
            (None, UpdateItemAction::Put(value)) => {
                overflow
                    .values_put
                    .insert(CqlValue::from(name.as_str()), CqlValue::Blob(encode_overflow(value)?));
                overflow.mark_present(name, value.attr_type());
            }
            (Some(_), UpdateItemAction::Delete) => {
                assignments.push(Assignment::Set {
                    column: user_column(name),
                    value: None,
                });
                overflow.mark_absent(name);
            }
            (None, UpdateItemAction::Delete) => {
                overflow.values_remove.insert(CqlValue::from(name.as_str()));
                overflow.mark_absent(name);
            }
        }
    }

    overflow.into_assignments(&mut assignments);
    Ok(assignments)
}

/// Column writes replacing a whole row with `item`.
///
/// Every predefined column is set or nulled and the overflow columns are
/// overwritten, so attributes absent from `item` disappear.
pub fn put_assignments(schema: &TableSchema, item: &Item) -> Result<Vec<Assignment>, StorageError> {
    let mut assignments = vec![row_marker()];

    for def in &schema.attribute_definitions {
        if schema.is_key(&def.attribute_name) {
            continue;
        }
        let value = item
            .get(&def.attribute_name)
            .map(|v| encode_predefined(&def.attribute_name, def.attribute_type, v))
            .transpose()?;
        assignments.push(Assignment::Set {
            column: user_column(&def.attribute_name),
            value,
        });
    }

    let mut values = BTreeMap::new();
    let mut types = BTreeMap::new();
    let mut present = BTreeSet::new();
    for (name, value) in item {
        let attr_type = match schema.attribute_type(name) {
            Some(declared) => declared,
            None => {
                values.insert(CqlValue::from(name.as_str()), CqlValue::Blob(encode_overflow(value)?));
                value.attr_type()
            }
        };
        types.insert(CqlValue::from(name.as_str()), CqlValue::from(type_tag(attr_type)));
        present.insert(CqlValue::from(name.as_str()));
    }

    let collection = |column: &str, value: CqlValue, empty: bool| Assignment::Set {
        column: column.to_owned(),
        value: (!empty).then_some(value),
    };
    assignments.push(collection(
        SYSTEM_ATTRS,
        CqlValue::Map(values.clone()),
        values.is_empty(),
    ));
    assignments.push(collection(
        SYSTEM_ATTR_TYPES,
        CqlValue::Map(types.clone()),
        types.is_empty(),
    ));
    assignments.push(collection(
        SYSTEM_ATTR_EXIST,
        CqlValue::Set(present.clone()),
        present.is_empty(),
    ));
    Ok(assignments)
}
