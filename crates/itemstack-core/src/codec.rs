//! Mapping between generic attribute values and native column values.
//!
//! Predefined attributes are stored in typed columns and go through
//! [`encode`]/[`decode`]. Dynamic attributes are stored as bytes in the
//! overflow map and go through [`encode_overflow`]/[`decode_overflow`]:
//! numbers as canonical decimal text, strings as UTF-8, blobs verbatim and
//! sets as a JSON array of strings (blob elements base64-encoded).

use std::collections::BTreeSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use itemstack_model::{AttributeType, AttributeValue, Number, StorageError};

use crate::statement::{ColumnType, CqlScalar, CqlValue};

/// Physical column type of every attribute type.
///
/// The mapping is a bijection; [`to_generic_type`] inverts it.
#[must_use]
pub const fn to_physical_type(attr_type: AttributeType) -> ColumnType {
    match attr_type {
        AttributeType::Number => ColumnType::Scalar(CqlScalar::Decimal),
        AttributeType::String => ColumnType::Scalar(CqlScalar::Text),
        AttributeType::Blob => ColumnType::Scalar(CqlScalar::Blob),
        AttributeType::NumberSet => ColumnType::Set(CqlScalar::Decimal),
        AttributeType::StringSet => ColumnType::Set(CqlScalar::Text),
        AttributeType::BlobSet => ColumnType::Set(CqlScalar::Blob),
    }
}

/// Generic attribute type of a physical column type.
///
/// Fails with `EncodingError` for column types outside the mapping.
pub fn to_generic_type(column_type: ColumnType) -> Result<AttributeType, StorageError> {
    AttributeType::ALL
        .into_iter()
        .find(|t| to_physical_type(*t) == column_type)
        .ok_or_else(|| {
            StorageError::encoding(format!("column type {column_type} has no attribute type"))
        })
}

/// The type tag recorded in the type-tracking map for `attr_type`.
#[must_use]
pub fn type_tag(attr_type: AttributeType) -> String {
    to_physical_type(attr_type).to_string()
}

/// Parse a type tag read back from the type-tracking map.
pub fn parse_type_tag(tag: &str) -> Result<AttributeType, StorageError> {
    let column_type = tag
        .parse::<ColumnType>()
        .map_err(|e| StorageError::encoding(e.to_string()).with_source(e))?;
    to_generic_type(column_type)
}

fn reject_empty(value: &AttributeValue) -> Result<(), StorageError> {
    if value.is_empty_set() {
        return Err(StorageError::encoding(format!(
            "empty {} cannot be stored",
            value.attr_type()
        )));
    }
    Ok(())
}

/// Encode a value for a typed column.
pub fn encode(value: &AttributeValue) -> Result<CqlValue, StorageError> {
    reject_empty(value)?;
    Ok(match value {
        AttributeValue::N(n) => CqlValue::Decimal(n.clone()),
        AttributeValue::S(s) => CqlValue::Text(s.clone()),
        AttributeValue::B(b) => CqlValue::Blob(b.clone()),
        AttributeValue::Ns(set) => {
            CqlValue::Set(set.iter().cloned().map(CqlValue::Decimal).collect())
        }
        AttributeValue::Ss(set) => CqlValue::Set(set.iter().cloned().map(CqlValue::Text).collect()),
        AttributeValue::Bs(set) => CqlValue::Set(set.iter().cloned().map(CqlValue::Blob).collect()),
    })
}

/// Decode a typed column value as `attr_type`.
pub fn decode(value: &CqlValue, attr_type: AttributeType) -> Result<AttributeValue, StorageError> {
    let mismatch = || {
        StorageError::encoding(format!(
            "column value {value} cannot be decoded as {attr_type}"
        ))
    };

    let decode_set = |element: CqlScalar| -> Result<BTreeSet<CqlValue>, StorageError> {
        match value {
            CqlValue::Set(set) if !set.is_empty() && set.iter().all(|e| e.is_scalar_of(element)) => {
                Ok(set.clone())
            }
            _ => Err(mismatch()),
        }
    };

    match (attr_type, value) {
        (AttributeType::Number, CqlValue::Decimal(n)) => Ok(AttributeValue::N(n.clone())),
        (AttributeType::String, CqlValue::Text(s)) => Ok(AttributeValue::S(s.clone())),
        (AttributeType::Blob, CqlValue::Blob(b)) => Ok(AttributeValue::B(b.clone())),
        (AttributeType::NumberSet, _) => Ok(AttributeValue::Ns(
            decode_set(CqlScalar::Decimal)?
                .into_iter()
                .filter_map(|e| match e {
                    CqlValue::Decimal(n) => Some(n),
                    _ => None,
                })
                .collect(),
        )),
        (AttributeType::StringSet, _) => Ok(AttributeValue::Ss(
            decode_set(CqlScalar::Text)?
                .into_iter()
                .filter_map(|e| match e {
                    CqlValue::Text(s) => Some(s),
                    _ => None,
                })
                .collect(),
        )),
        (AttributeType::BlobSet, _) => Ok(AttributeValue::Bs(
            decode_set(CqlScalar::Blob)?
                .into_iter()
                .filter_map(|e| match e {
                    CqlValue::Blob(b) => Some(b),
                    _ => None,
                })
                .collect(),
        )),
        _ => Err(mismatch()),
    }
}

/// Encode a value as overflow bytes.
pub fn encode_overflow(value: &AttributeValue) -> Result<Bytes, StorageError> {
    reject_empty(value)?;
    let elements: Vec<String> = match value {
        AttributeValue::N(n) => return Ok(Bytes::from(n.to_string())),
        AttributeValue::S(s) => return Ok(Bytes::from(s.clone())),
        AttributeValue::B(b) => return Ok(b.clone()),
        AttributeValue::Ns(set) => set.iter().map(ToString::to_string).collect(),
        AttributeValue::Ss(set) => set.iter().cloned().collect(),
        AttributeValue::Bs(set) => set.iter().map(|b| BASE64.encode(b)).collect(),
    };
    serde_json::to_vec(&elements)
        .map(Bytes::from)
        .map_err(|e| StorageError::encoding(format!("cannot encode set: {e}")).with_source(e))
}

/// Decode overflow bytes as `attr_type`.
pub fn decode_overflow(bytes: &[u8], attr_type: AttributeType) -> Result<AttributeValue, StorageError> {
    let invalid = |reason: String| {
        StorageError::encoding(format!("invalid stored {attr_type} value: {reason}"))
    };

    let text = || std::str::from_utf8(bytes).map_err(|e| invalid(e.to_string()));
    let parse_number = |s: &str| s.parse::<Number>().map_err(|e| invalid(e.to_string()));

    if !attr_type.is_set() {
        return Ok(match attr_type {
            AttributeType::Number => AttributeValue::N(parse_number(text()?)?),
            AttributeType::String => AttributeValue::S(text()?.to_owned()),
            _ => AttributeValue::B(Bytes::copy_from_slice(bytes)),
        });
    }

    let elements: Vec<String> =
        serde_json::from_slice(bytes).map_err(|e| invalid(e.to_string()))?;
    if elements.is_empty() {
        return Err(invalid("empty set".to_owned()));
    }

    Ok(match attr_type {
        AttributeType::NumberSet => AttributeValue::Ns(
            elements
                .iter()
                .map(|e| parse_number(e.as_str()))
                .collect::<Result<_, _>>()?,
        ),
        AttributeType::StringSet => AttributeValue::Ss(elements.into_iter().collect()),
        _ => AttributeValue::Bs(
            elements
                .iter()
                .map(|e| {
                    BASE64
                        .decode(e)
                        .map(Bytes::from)
                        .map_err(|err| invalid(err.to_string()))
                })
                .collect::<Result<_, _>>()?,
        ),
    })
}
