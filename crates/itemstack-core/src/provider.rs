//! Storage facade implementing the generic item-store operations.
//!
//! The provider keeps no schema or data between calls: every item operation
//! describes its table first and compiles against the fresh schema.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;
use itemstack_model::types::{
    Condition, DeleteItemRequest, ListTablesPage, RequestContext, TableSchema, UpdateItemAction,
};
use itemstack_model::{Item, StorageError};
use tracing::{debug, info, warn};

use crate::compiler;
use crate::config::StorageConfig;
use crate::error::executor_error_to_storage;
use crate::executor::{Connector, Executor};
use crate::marshal::{decode_row, project};
use crate::schema::{self, validate_table_name, validate_tenant};
use crate::statement::system_schema as ss;
use crate::statement::{CqlValue, Row, Statement};

/// The generic item store over a column-family store.
#[derive(Debug, Clone)]
pub struct StorageProvider {
    executor: Arc<dyn Executor>,
    config: Arc<StorageConfig>,
}

impl StorageProvider {
    /// Create a provider on top of an open executor session.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>, config: StorageConfig) -> Self {
        Self {
            executor,
            config: Arc::new(config),
        }
    }

    /// Connect through `connector` to the configured contact points.
    pub async fn connect<C: Connector>(
        connector: &C,
        config: StorageConfig,
    ) -> Result<Self, StorageError> {
        let session = connector
            .connect(&config.contact_points)
            .await
            .map_err(executor_error_to_storage)?;
        info!(contact_points = ?config.contact_points, "storage provider connected");
        Ok(Self::new(Arc::new(session), config))
    }

    /// The provider configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// A request context for the configured default tenant.
    #[must_use]
    pub fn default_context(&self) -> RequestContext {
        RequestContext::new(self.config.default_tenant.clone())
    }

    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>, StorageError> {
        self.executor
            .execute(statement)
            .await
            .map_err(executor_error_to_storage)
    }

    fn keyspace(ctx: &RequestContext) -> Result<&str, StorageError> {
        validate_tenant(&ctx.tenant)?;
        Ok(&ctx.tenant)
    }
}

// ---------------------------------------------------------------------------
// Table management
// ---------------------------------------------------------------------------

impl StorageProvider {
    /// Create a table and its indexes.
    ///
    /// Fails with `AlreadyExists` when the store already holds the name. If an
    /// index cannot be created the table is dropped again.
    pub async fn create_table(
        &self,
        ctx: &RequestContext,
        schema: &TableSchema,
    ) -> Result<(), StorageError> {
        let keyspace = Self::keyspace(ctx)?;
        let physical = schema::project(schema)?;
        let (create, indexes) = compiler::create_table(keyspace, &physical);

        self.execute(&create).await?;
        if let Err(e) = try_join_all(indexes.iter().map(|s| self.execute(s))).await {
            warn!(
                tenant = %ctx.tenant,
                table = %schema.table_name,
                error = %e,
                "index creation failed, dropping table"
            );
            if let Err(drop_err) = self
                .execute(&compiler::drop_table(keyspace, &schema.table_name))
                .await
            {
                warn!(error = %drop_err, "failed to drop partially created table");
            }
            return Err(e);
        }

        info!(
            tenant = %ctx.tenant,
            table = %schema.table_name,
            indexes = schema.index_definitions.len(),
            "table created"
        );
        Ok(())
    }

    /// Names of every table of the tenant, sorted.
    pub async fn list_tables(&self, ctx: &RequestContext) -> Result<Vec<String>, StorageError> {
        let keyspace = Self::keyspace(ctx)?;
        let rows = self.execute(&compiler::list_tables(keyspace)).await?;
        let mut names = rows
            .iter()
            .map(|row| {
                row.get(ss::TABLE_NAME)
                    .and_then(CqlValue::as_text)
                    .map(ToOwned::to_owned)
                    .ok_or_else(|| StorageError::encoding("table listing row has no table name"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        names.sort();
        Ok(names)
    }

    /// One page of the tenant's table names, starting after
    /// `exclusive_start_table_name`.
    ///
    /// `limit` defaults to the configured page size.
    pub async fn list_tables_page(
        &self,
        ctx: &RequestContext,
        exclusive_start_table_name: Option<&str>,
        limit: Option<usize>,
    ) -> Result<ListTablesPage, StorageError> {
        let limit = match limit {
            Some(0) => return Err(StorageError::query("limit must be positive")),
            Some(limit) => limit,
            None => self.config.list_tables_page_size,
        };

        let all_names = self.list_tables(ctx).await?;
        let start_idx = exclusive_start_table_name.map_or(0, |start| {
            all_names
                .iter()
                .position(|n| n.as_str() > start)
                .unwrap_or(all_names.len())
        });

        let mut page: Vec<String> = all_names
            .into_iter()
            .skip(start_idx)
            .take(limit + 1)
            .collect();

        let last_evaluated_table_name = if page.len() > limit {
            page.truncate(limit);
            page.last().cloned()
        } else {
            None
        };

        Ok(ListTablesPage {
            table_names: page,
            last_evaluated_table_name,
        })
    }

    /// Rebuild a table's schema from the store's metadata.
    pub async fn describe_table(
        &self,
        ctx: &RequestContext,
        table_name: &str,
    ) -> Result<TableSchema, StorageError> {
        let keyspace = Self::keyspace(ctx)?;
        validate_table_name(table_name)?;
        let (columns, indexes) = compiler::describe_table(keyspace, table_name);
        let (column_rows, index_rows) =
            futures::try_join!(self.execute(&columns), self.execute(&indexes))?;
        schema::reconstruct(table_name, &column_rows, &index_rows)
    }

    /// Drop a table with all its data.
    pub async fn delete_table(
        &self,
        ctx: &RequestContext,
        table_name: &str,
    ) -> Result<(), StorageError> {
        let keyspace = Self::keyspace(ctx)?;
        validate_table_name(table_name)?;
        self.execute(&compiler::drop_table(keyspace, table_name))
            .await?;
        info!(tenant = %ctx.tenant, table = %table_name, "table deleted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Item operations
// ---------------------------------------------------------------------------

impl StorageProvider {
    /// Items matching `conditions`, in the store's key order.
    ///
    /// With `projection`, every item is restricted to the named attributes.
    pub async fn select_item(
        &self,
        ctx: &RequestContext,
        table_name: &str,
        conditions: &HashMap<String, Condition>,
        projection: Option<&[String]>,
        limit: Option<usize>,
    ) -> Result<Vec<Item>, StorageError> {
        let schema = self.describe_table(ctx, table_name).await?;
        let statement = compiler::select(Self::keyspace(ctx)?, &schema, conditions, limit)?;
        let rows = self.execute(&statement).await?;
        debug!(table = %table_name, rows = rows.len(), "select_item");

        rows.iter()
            .map(|row| -> Result<Item, StorageError> {
                let item = decode_row(&schema, row)?;
                Ok(match projection {
                    Some(names) => project(item, names),
                    None => item,
                })
            })
            .collect()
    }

    /// Apply `actions` to the item identified by `keys`, creating it if absent.
    pub async fn update_item(
        &self,
        ctx: &RequestContext,
        table_name: &str,
        keys: &HashMap<String, Condition>,
        actions: &HashMap<String, UpdateItemAction>,
    ) -> Result<(), StorageError> {
        let schema = self.describe_table(ctx, table_name).await?;
        let statement = compiler::update(Self::keyspace(ctx)?, &schema, keys, actions)?;
        self.execute(&statement).await?;
        debug!(table = %table_name, actions = actions.len(), "update_item");
        Ok(())
    }

    /// Replace the item carrying `item`'s key attributes with `item`.
    pub async fn put_item(
        &self,
        ctx: &RequestContext,
        table_name: &str,
        item: &Item,
    ) -> Result<(), StorageError> {
        let schema = self.describe_table(ctx, table_name).await?;
        let statement = compiler::put(Self::keyspace(ctx)?, &schema, item)?;
        self.execute(&statement).await?;
        debug!(table = %table_name, attributes = item.len(), "put_item");
        Ok(())
    }

    /// Delete one item. Deleting an absent item succeeds.
    pub async fn delete_item(
        &self,
        ctx: &RequestContext,
        request: &DeleteItemRequest,
    ) -> Result<(), StorageError> {
        let schema = self.describe_table(ctx, &request.table_name).await?;
        let statement = compiler::delete(Self::keyspace(ctx)?, &schema, request)?;
        self.execute(&statement).await?;
        debug!(table = %request.table_name, "delete_item");
        Ok(())
    }
}
