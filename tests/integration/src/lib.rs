//! Integration tests for the ItemStack storage provider.
//!
//! The tests drive [`StorageProvider`] end to end against the in-memory
//! column-family store, so they run with a plain `cargo test`:
//! ```text
//! cargo test -p itemstack-integration
//! ```

use std::collections::HashMap;
use std::sync::Once;

use bytes::Bytes;
use itemstack_core::memory::InMemoryCluster;
use itemstack_core::{StorageConfig, StorageProvider};
use itemstack_model::types::{
    AttributeDefinition, Condition, IndexDefinition, RequestContext, TableSchema,
};
use itemstack_model::{AttributeType, AttributeValue, Item, Number};

mod test_delete;
mod test_put;
mod test_table;
mod test_update;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Connect a provider to a fresh in-memory cluster.
pub async fn provider() -> StorageProvider {
    init_tracing();
    StorageProvider::connect(&InMemoryCluster::new(), StorageConfig::default())
        .await
        .unwrap_or_else(|e| panic!("failed to connect: {e}"))
}

/// Generate a unique table name for a test.
#[must_use]
pub fn test_table_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string()[..8].to_owned();
    format!("{prefix}_{id}")
}

/// A table keyed by `id` (number) and `range` (string) with one predefined
/// attribute of every type. `indexed` carries the secondary index `idx`.
#[must_use]
pub fn fixture_schema(table_name: &str) -> TableSchema {
    TableSchema::new(
        table_name,
        [
            AttributeDefinition::new("id", AttributeType::Number),
            AttributeDefinition::new("range", AttributeType::String),
            AttributeDefinition::new("indexed", AttributeType::Number),
            AttributeDefinition::new("str", AttributeType::String),
            AttributeDefinition::new("numbr", AttributeType::Number),
            AttributeDefinition::new("blb", AttributeType::Blob),
            AttributeDefinition::new("set_number", AttributeType::NumberSet),
            AttributeDefinition::new("set_string", AttributeType::StringSet),
            AttributeDefinition::new("set_blob", AttributeType::BlobSet),
        ],
        ["id", "range"],
        [IndexDefinition::new("idx", "indexed")],
    )
}

/// Create the fixture table in the default tenant and return its name.
pub async fn create_fixture_table(provider: &StorageProvider, prefix: &str) -> String {
    let table_name = test_table_name(prefix);
    provider
        .create_table(&provider.default_context(), &fixture_schema(&table_name))
        .await
        .unwrap_or_else(|e| panic!("failed to create table {table_name}: {e}"));
    table_name
}

/// Equality conditions on both key attributes.
#[must_use]
pub fn key(id: i64, range: &str) -> HashMap<String, Condition> {
    HashMap::from([
        ("id".to_owned(), Condition::eq(id)),
        ("range".to_owned(), Condition::eq(range)),
    ])
}

/// Parse a decimal literal.
#[must_use]
pub fn number(literal: &str) -> Number {
    literal
        .parse()
        .unwrap_or_else(|e| panic!("invalid number {literal}: {e}"))
}

/// An item holding every predefined attribute and one dynamic attribute of
/// every type.
#[must_use]
pub fn full_item(id: i64, range: &str) -> Item {
    Item::from([
        ("id".to_owned(), AttributeValue::from(id)),
        ("range".to_owned(), AttributeValue::from(range)),
        ("indexed".to_owned(), AttributeValue::from(10_i64)),
        ("str".to_owned(), AttributeValue::from("predefined")),
        ("numbr".to_owned(), AttributeValue::N(number("3.14"))),
        ("blb".to_owned(), AttributeValue::B(Bytes::from_static(b"\x00\x01\xff"))),
        (
            "set_number".to_owned(),
            AttributeValue::number_set([number("1"), number("-2.5")]),
        ),
        ("set_string".to_owned(), AttributeValue::string_set(["a", "b"])),
        (
            "set_blob".to_owned(),
            AttributeValue::blob_set([Bytes::from_static(b"x"), Bytes::from_static(b"yz")]),
        ),
        ("fnum".to_owned(), AttributeValue::N(number("1e10"))),
        ("fstr".to_owned(), AttributeValue::from("dynamic")),
        ("fblb".to_owned(), AttributeValue::B(Bytes::from_static(b"raw"))),
        ("fsnum".to_owned(), AttributeValue::number_set([number("7"), number("0.5")])),
        ("fsstr".to_owned(), AttributeValue::string_set(["x", "y", "z"])),
        (
            "fsblob".to_owned(),
            AttributeValue::blob_set([Bytes::from_static(b"\x01"), Bytes::from_static(b"\x02")]),
        ),
    ])
}

/// A key-only item.
#[must_use]
pub fn key_item(id: i64, range: &str) -> Item {
    Item::from([
        ("id".to_owned(), AttributeValue::from(id)),
        ("range".to_owned(), AttributeValue::from(range)),
    ])
}

/// Write `items` into `table_name` of the default tenant.
pub async fn seed(provider: &StorageProvider, table_name: &str, items: &[Item]) {
    let ctx: RequestContext = provider.default_context();
    for item in items {
        provider
            .put_item(&ctx, table_name, item)
            .await
            .unwrap_or_else(|e| panic!("failed to seed {table_name}: {e}"));
    }
    tracing::debug!(table = %table_name, items = items.len(), "seeded table");
}

/// The values of `attribute` across `items`, in order.
#[must_use]
pub fn column<'a>(items: &'a [Item], attribute: &str) -> Vec<&'a AttributeValue> {
    items.iter().filter_map(|item| item.get(attribute)).collect()
}
