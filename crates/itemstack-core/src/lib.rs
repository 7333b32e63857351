//! Storage core for ItemStack.
//!
//! Projects generic table schemas onto a typed column-family layout, compiles
//! item operations into column-store statements and decodes the returned rows
//! back into items. The column store itself sits behind the [`Executor`]
//! trait; [`memory::InMemoryCluster`] is a local implementation used by tests.
#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod codec;
pub mod compiler;
pub mod config;
pub mod error;
pub mod executor;
pub mod marshal;
pub mod memory;
pub mod provider;
pub mod schema;
pub mod statement;

pub use config::StorageConfig;
pub use executor::{Connector, Executor, ExecutorError};
pub use provider::StorageProvider;
