//! Item-store model types for ItemStack.
//!
//! This crate holds the generic, schemaless item model exposed by the storage
//! facade: attribute types and values, table schemas, query conditions, update
//! actions and the error type every operation reports. Nothing here knows about
//! the physical column layout used to persist items.
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;
pub mod error;
pub mod number;
pub mod types;

pub use attribute_value::{AttributeType, AttributeValue, Item};
pub use error::{StorageError, StorageErrorCode};
pub use number::Number;
