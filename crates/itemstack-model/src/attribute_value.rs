//! `AttributeType` and `AttributeValue` with custom serialization.
//!
//! `AttributeValue` is a closed tagged union over the six supported types.
//! The JSON wire format uses single-key objects like `{"S": "hello"}`.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use bytes::Bytes;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::StorageError;
use crate::number::Number;

/// An item: attribute name to typed value.
pub type Item = HashMap<String, AttributeValue>;

/// The generic attribute type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeType {
    /// Arbitrary-precision decimal.
    #[serde(rename = "N")]
    Number,
    /// UTF-8 string.
    #[serde(rename = "S")]
    String,
    /// Opaque byte string.
    #[serde(rename = "B")]
    Blob,
    /// Set of numbers.
    #[serde(rename = "NS")]
    NumberSet,
    /// Set of strings.
    #[serde(rename = "SS")]
    StringSet,
    /// Set of blobs.
    #[serde(rename = "BS")]
    BlobSet,
}

impl AttributeType {
    /// All attribute types.
    pub const ALL: [Self; 6] = [
        Self::Number,
        Self::String,
        Self::Blob,
        Self::NumberSet,
        Self::StringSet,
        Self::BlobSet,
    ];

    /// Returns the type descriptor string (e.g., "S", "NS").
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "N",
            Self::String => "S",
            Self::Blob => "B",
            Self::NumberSet => "NS",
            Self::StringSet => "SS",
            Self::BlobSet => "BS",
        }
    }

    /// Returns `true` for the three set types.
    #[must_use]
    pub fn is_set(&self) -> bool {
        matches!(self, Self::NumberSet | Self::StringSet | Self::BlobSet)
    }

    /// Returns the element type of a set type, or `None` for scalar types.
    #[must_use]
    pub fn element_type(&self) -> Option<Self> {
        match self {
            Self::NumberSet => Some(Self::Number),
            Self::StringSet => Some(Self::String),
            Self::BlobSet => Some(Self::Blob),
            Self::Number | Self::String | Self::Blob => None,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed attribute value.
///
/// Sets are kept in ordered sets, so they are duplicate-free and compare as
/// sets regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeValue {
    /// Number value.
    N(Number),
    /// String value.
    S(String),
    /// Binary value (base64-encoded in JSON).
    B(Bytes),
    /// Number set.
    Ns(BTreeSet<Number>),
    /// String set.
    Ss(BTreeSet<String>),
    /// Binary set (base64-encoded in JSON).
    Bs(BTreeSet<Bytes>),
}

impl AttributeValue {
    /// Returns the type of this value.
    #[must_use]
    pub fn attr_type(&self) -> AttributeType {
        match self {
            Self::N(_) => AttributeType::Number,
            Self::S(_) => AttributeType::String,
            Self::B(_) => AttributeType::Blob,
            Self::Ns(_) => AttributeType::NumberSet,
            Self::Ss(_) => AttributeType::StringSet,
            Self::Bs(_) => AttributeType::BlobSet,
        }
    }

    /// Returns the type descriptor string (e.g., "S", "N", "SS").
    #[must_use]
    pub fn type_descriptor(&self) -> &'static str {
        self.attr_type().as_str()
    }

    /// Returns the string value if this is an `S` variant.
    #[must_use]
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number if this is an `N` variant.
    #[must_use]
    pub fn as_n(&self) -> Option<&Number> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the bytes if this is a `B` variant.
    #[must_use]
    pub fn as_b(&self) -> Option<&Bytes> {
        match self {
            Self::B(b) => Some(b),
            _ => None,
        }
    }

    /// Returns `true` if this is an empty set.
    #[must_use]
    pub fn is_empty_set(&self) -> bool {
        match self {
            Self::Ns(v) => v.is_empty(),
            Self::Ss(v) => v.is_empty(),
            Self::Bs(v) => v.is_empty(),
            Self::N(_) | Self::S(_) | Self::B(_) => false,
        }
    }

    /// Build a set value of `set_type` from loose scalar elements.
    ///
    /// Every element must be a scalar of the set's element type; duplicates
    /// collapse.
    pub fn set_from(
        set_type: AttributeType,
        elements: impl IntoIterator<Item = AttributeValue>,
    ) -> Result<Self, StorageError> {
        let Some(element_type) = set_type.element_type() else {
            return Err(StorageError::encoding(format!(
                "{set_type} is not a set type"
            )));
        };

        let mismatch = |e: &AttributeValue| {
            StorageError::encoding(format!(
                "set of type {set_type} cannot hold an element of type {}",
                e.type_descriptor()
            ))
        };

        match element_type {
            AttributeType::Number => elements
                .into_iter()
                .map(|e| match e {
                    Self::N(n) => Ok(n),
                    other => Err(mismatch(&other)),
                })
                .collect::<Result<_, _>>()
                .map(Self::Ns),
            AttributeType::String => elements
                .into_iter()
                .map(|e| match e {
                    Self::S(s) => Ok(s),
                    other => Err(mismatch(&other)),
                })
                .collect::<Result<_, _>>()
                .map(Self::Ss),
            _ => elements
                .into_iter()
                .map(|e| match e {
                    Self::B(b) => Ok(b),
                    other => Err(mismatch(&other)),
                })
                .collect::<Result<_, _>>()
                .map(Self::Bs),
        }
    }

    /// Convenience constructor for a string set.
    #[must_use]
    pub fn string_set<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Ss(values.into_iter().map(Into::into).collect())
    }

    /// Convenience constructor for a number set.
    #[must_use]
    pub fn number_set<I, N>(values: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Number>,
    {
        Self::Ns(values.into_iter().map(Into::into).collect())
    }

    /// Convenience constructor for a binary set.
    #[must_use]
    pub fn blob_set<I, B>(values: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self::Bs(values.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::S(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::S(value)
    }
}

impl From<Number> for AttributeValue {
    fn from(value: Number) -> Self {
        Self::N(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::N(Number::from(value))
    }
}

impl From<Bytes> for AttributeValue {
    fn from(value: Bytes) -> Self {
        Self::B(value)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S(s) => write!(f, "{{S: {s}}}"),
            Self::N(n) => write!(f, "{{N: {n}}}"),
            Self::B(b) => write!(f, "{{B: {} bytes}}", b.len()),
            Self::Ss(v) => write!(f, "{{SS: {v:?}}}"),
            Self::Ns(v) => {
                let nums: Vec<String> = v.iter().map(ToString::to_string).collect();
                write!(f, "{{NS: {nums:?}}}")
            }
            Self::Bs(v) => write!(f, "{{BS: {} items}}", v.len()),
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use base64::Engine;

        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::S(s) => map.serialize_entry("S", s)?,
            Self::N(n) => map.serialize_entry("N", n)?,
            Self::B(b) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(b);
                map.serialize_entry("B", &encoded)?;
            }
            Self::Ss(v) => map.serialize_entry("SS", v)?,
            Self::Ns(v) => map.serialize_entry("NS", v)?,
            Self::Bs(v) => {
                let encoded: Vec<String> = v
                    .iter()
                    .map(|b| base64::engine::general_purpose::STANDARD.encode(b))
                    .collect();
                map.serialize_entry("BS", &encoded)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(AttributeValueVisitor)
    }
}

struct AttributeValueVisitor;

/// Collect set elements, rejecting duplicates.
fn unique<T: Ord, E: de::Error>(elements: Vec<T>) -> Result<BTreeSet<T>, E> {
    let len = elements.len();
    let set: BTreeSet<T> = elements.into_iter().collect();
    if set.len() == len {
        Ok(set)
    } else {
        Err(de::Error::custom("set contains duplicate elements"))
    }
}

fn decode_base64<E: de::Error>(encoded: &str) -> Result<Bytes, E> {
    use base64::Engine;

    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map(Bytes::from)
        .map_err(de::Error::custom)
}

impl<'de> Visitor<'de> for AttributeValueVisitor {
    type Value = AttributeValue;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an AttributeValue object with exactly one type key")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
        let Some(key) = map.next_key::<String>()? else {
            return Err(de::Error::custom(
                "AttributeValue must have exactly one key",
            ));
        };

        let value = match key.as_str() {
            "S" => AttributeValue::S(map.next_value()?),
            "N" => AttributeValue::N(map.next_value()?),
            "B" => {
                let encoded: String = map.next_value()?;
                AttributeValue::B(decode_base64::<M::Error>(&encoded)?)
            }
            "SS" => AttributeValue::Ss(unique::<_, M::Error>(map.next_value()?)?),
            "NS" => AttributeValue::Ns(unique::<_, M::Error>(map.next_value()?)?),
            "BS" => {
                let encoded: Vec<String> = map.next_value()?;
                let decoded = encoded
                    .iter()
                    .map(|e| decode_base64::<M::Error>(e))
                    .collect::<Result<Vec<_>, _>>()?;
                AttributeValue::Bs(unique::<_, M::Error>(decoded)?)
            }
            other => {
                return Err(de::Error::unknown_field(
                    other,
                    &["S", "N", "B", "SS", "NS", "BS"],
                ));
            }
        };

        if map.next_key::<String>()?.is_some() {
            return Err(de::Error::custom(
                "AttributeValue must have exactly one key",
            ));
        }

        Ok(value)
    }
}
