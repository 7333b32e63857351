//! In-memory column store.
//!
//! Interprets [`Statement`]s over tables held in process memory, with the
//! semantics of a column-family store that matter to the storage facade:
//!
//! - typed columns, checked on every write and every relation;
//! - a partition key column and an optional clustering column, rows ordered
//!   by clustering value within a partition;
//! - relations on regular columns require a secondary index;
//! - `UPDATE` is an upsert and a row without any regular cell does not exist;
//! - empty collections are null;
//! - `system_schema` metadata queries.
//!
//! # Architecture
//!
//! ```text
//! DashMap<(keyspace, table), Arc<MemTable>>
//! MemTable: DashMap<PartitionValue, BTreeMap<Option<ClusteringValue>, Row>>
//! ```
//!
//! Tables without a clustering column use `None` as the single clustering
//! value of each partition. Writes to one row happen under the partition's
//! shard lock, so every statement is atomic per row. Keyspaces come into
//! existence with their first table.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use itemstack_model::Number;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::executor::{Connector, Executor, ExecutorError};
use crate::statement::system_schema as ss;
use crate::statement::{
    Assignment, ColumnDef, ColumnType, CompareOp, CqlValue, Relation, Row, Selection, Statement,
};

type TableId = (String, String);
type Partition = BTreeMap<Option<CqlValue>, Row>;

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct MemTable {
    columns: Vec<ColumnDef>,
    partition_key: String,
    clustering_key: Option<String>,
    /// Index name to indexed column.
    indexes: RwLock<BTreeMap<String, String>>,
    partitions: DashMap<CqlValue, Partition>,
}

fn invalid(message: impl Into<String>) -> ExecutorError {
    ExecutorError::InvalidQuery(message.into())
}

impl MemTable {
    fn new(
        columns: Vec<ColumnDef>,
        partition_key: String,
        clustering_key: Option<String>,
    ) -> Result<Self, ExecutorError> {
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(invalid(format!("multiple definition of column {}", column.name)));
            }
        }
        let table = Self {
            columns,
            partition_key,
            clustering_key,
            indexes: RwLock::new(BTreeMap::new()),
            partitions: DashMap::new(),
        };
        for key in std::iter::once(&table.partition_key).chain(&table.clustering_key) {
            match table.column_type(key) {
                None => return Err(invalid(format!("unknown primary key column {key}"))),
                Some(t) if t.is_collection() => {
                    return Err(invalid(format!("collection column {key} cannot be a key")));
                }
                Some(_) => {}
            }
        }
        Ok(table)
    }

    fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.column_type)
    }

    fn require_column(&self, name: &str) -> Result<ColumnType, ExecutorError> {
        self.column_type(name)
            .ok_or_else(|| invalid(format!("undefined column name {name}")))
    }

    fn is_key(&self, name: &str) -> bool {
        name == self.partition_key || self.clustering_key.as_deref() == Some(name)
    }

    fn is_indexed(&self, column: &str) -> bool {
        self.indexes.read().values().any(|c| c == column)
    }

    fn check_relation(&self, relation: &Relation) -> Result<(), ExecutorError> {
        let ty = self.require_column(&relation.column)?;
        if ty.is_collection() {
            return Err(invalid(format!(
                "relations on collection column {} are not supported",
                relation.column
            )));
        }
        if !relation.value.conforms_to(ty) {
            return Err(invalid(format!(
                "invalid value {} for column {} of type {ty}",
                relation.value, relation.column
            )));
        }
        Ok(())
    }

    /// Split the relations of a write into partition and clustering values.
    ///
    /// `require_clustering` demands a clustering equality when the table has
    /// a clustering column.
    fn row_key(
        &self,
        relations: &[Relation],
        require_clustering: bool,
    ) -> Result<(CqlValue, Option<Option<CqlValue>>), ExecutorError> {
        let mut partition = None;
        let mut clustering = None;
        for relation in relations {
            self.check_relation(relation)?;
            if relation.op != CompareOp::Eq || !self.is_key(&relation.column) {
                return Err(invalid(format!(
                    "invalid restriction on {}: only key equality is allowed",
                    relation.column
                )));
            }
            if relation.column == self.partition_key {
                partition = Some(relation.value.clone());
            } else {
                clustering = Some(relation.value.clone());
            }
        }
        let partition = partition.ok_or_else(|| {
            invalid(format!("missing partition key {}", self.partition_key))
        })?;
        let clustering = match (&self.clustering_key, clustering) {
            (None, _) => Some(None),
            (Some(_), Some(value)) => Some(Some(value)),
            (Some(column), None) if require_clustering => {
                return Err(invalid(format!("missing clustering column {column}")));
            }
            (Some(_), None) => None,
        };
        Ok((partition, clustering))
    }

    fn has_regular_cells(&self, row: &Row) -> bool {
        row.keys().any(|c| !self.is_key(c))
    }

    // -- Reads --

    fn select(
        &self,
        selection: &Selection,
        relations: &[Relation],
        limit: Option<usize>,
        allow_filtering: bool,
    ) -> Result<Vec<Row>, ExecutorError> {
        let mut partition = None;
        for relation in relations {
            self.check_relation(relation)?;
            if relation.column == self.partition_key {
                if relation.op != CompareOp::Eq {
                    return Err(invalid(
                        "only EQ relations are supported on the partition key",
                    ));
                }
                partition = Some(&relation.value);
            } else if self.clustering_key.as_deref() == Some(relation.column.as_str()) {
                if partition.is_none() && !relations.iter().any(|r| r.column == self.partition_key) {
                    return Err(invalid(format!(
                        "clustering column {} cannot be restricted without the partition key",
                        relation.column
                    )));
                }
            } else if !self.is_indexed(&relation.column) {
                return Err(invalid(format!(
                    "no secondary index on the restricted column {}",
                    relation.column
                )));
            }
        }

        // Indexes serve equality only; other regular relations are filters.
        let is_regular = |r: &&Relation| !self.is_key(&r.column);
        if let Some(filter) = relations
            .iter()
            .filter(is_regular)
            .find(|r| r.op != CompareOp::Eq)
        {
            if !relations.iter().filter(is_regular).any(|r| r.op == CompareOp::Eq) {
                return Err(invalid(format!(
                    "{} {} needs an equality on an indexed column",
                    filter.column, filter.op
                )));
            }
            if !allow_filtering {
                return Err(invalid(format!(
                    "filtering on {} requires ALLOW FILTERING",
                    filter.column
                )));
            }
        }

        let matches = |row: &&Row| {
            relations.iter().all(|r| {
                row.get(&r.column)
                    .is_some_and(|value| r.op.matches(value, &r.value))
            })
        };
        let take = limit.unwrap_or(usize::MAX);

        let rows: Vec<Row> = if let Some(value) = partition {
            self.partitions
                .get(value)
                .map(|p| p.values().filter(matches).take(take).cloned().collect())
                .unwrap_or_default()
        } else {
            let mut keys: Vec<CqlValue> = self.partitions.iter().map(|e| e.key().clone()).collect();
            keys.sort();
            let mut rows = Vec::new();
            for key in keys {
                if rows.len() >= take {
                    break;
                }
                if let Some(p) = self.partitions.get(&key) {
                    rows.extend(p.values().filter(matches).take(take - rows.len()).cloned());
                }
            }
            rows
        };

        Ok(match selection {
            Selection::All => rows,
            Selection::Columns(columns) => rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .filter(|(name, _)| columns.contains(name))
                        .collect()
                })
                .collect(),
        })
    }

    // -- Writes --

    fn check_assignment(&self, assignment: &Assignment) -> Result<(), ExecutorError> {
        let column = assignment.column();
        let ty = self.require_column(column)?;
        if self.is_key(column) {
            return Err(invalid(format!("PRIMARY KEY part {column} found in SET part")));
        }
        let conforms = match (assignment, ty) {
            (Assignment::Set { value: None, .. }, _) => true,
            (Assignment::Set { value: Some(v), .. }, _) => v.conforms_to(ty),
            (Assignment::MapPut { entries, .. }, ColumnType::Map(k, v)) => entries
                .iter()
                .all(|(key, value)| key.is_scalar_of(k) && value.is_scalar_of(v)),
            (Assignment::MapRemove { keys, .. }, ColumnType::Map(k, _)) => {
                keys.iter().all(|key| key.is_scalar_of(k))
            }
            (
                Assignment::SetAdd { elements, .. } | Assignment::SetRemove { elements, .. },
                ColumnType::Set(e),
            ) => elements.iter().all(|element| element.is_scalar_of(e)),
            _ => false,
        };
        if conforms {
            Ok(())
        } else {
            Err(invalid(format!(
                "invalid operation on column {column} of type {ty}"
            )))
        }
    }

    fn update(&self, assignments: &[Assignment], relations: &[Relation]) -> Result<(), ExecutorError> {
        let (partition_value, clustering) = self.row_key(relations, true)?;
        let clustering = clustering.unwrap_or_default();
        for assignment in assignments {
            self.check_assignment(assignment)?;
        }

        {
            let mut partition = self.partitions.entry(partition_value.clone()).or_default();
            let mut row = partition.get(&clustering).cloned().unwrap_or_else(|| {
                let mut row = Row::new();
                row.insert(self.partition_key.clone(), partition_value.clone());
                if let (Some(column), Some(value)) = (&self.clustering_key, &clustering) {
                    row.insert(column.clone(), value.clone());
                }
                row
            });
            for assignment in assignments {
                apply(&mut row, assignment);
            }
            if self.has_regular_cells(&row) {
                partition.insert(clustering, row);
            } else {
                partition.remove(&clustering);
            }
        }
        self.partitions.remove_if(&partition_value, |_, p| p.is_empty());
        Ok(())
    }

    fn delete(&self, relations: &[Relation]) -> Result<(), ExecutorError> {
        let (partition_value, clustering) = self.row_key(relations, false)?;
        match clustering {
            Some(clustering) => {
                if let Some(mut partition) = self.partitions.get_mut(&partition_value) {
                    partition.remove(&clustering);
                }
                self.partitions.remove_if(&partition_value, |_, p| p.is_empty());
            }
            None => {
                self.partitions.remove(&partition_value);
            }
        }
        Ok(())
    }

    // -- Metadata --

    fn column_rows(&self) -> Vec<Row> {
        self.columns
            .iter()
            .map(|column| {
                let (kind, position) = if column.name == self.partition_key {
                    (ss::KIND_PARTITION_KEY, 0_i64)
                } else if self.clustering_key.as_deref() == Some(column.name.as_str()) {
                    (ss::KIND_CLUSTERING, 0_i64)
                } else {
                    (ss::KIND_REGULAR, -1_i64)
                };
                Row::from([
                    (ss::COLUMN_NAME.to_owned(), CqlValue::from(column.name.as_str())),
                    (ss::KIND.to_owned(), CqlValue::from(kind)),
                    (ss::POSITION.to_owned(), CqlValue::Decimal(Number::from(position))),
                    (ss::TYPE.to_owned(), CqlValue::from(column.column_type.to_string())),
                ])
            })
            .collect()
    }

    fn index_rows(&self) -> Vec<Row> {
        self.indexes
            .read()
            .iter()
            .map(|(name, column)| {
                Row::from([
                    (ss::INDEX_NAME.to_owned(), CqlValue::from(name.as_str())),
                    (
                        ss::OPTIONS.to_owned(),
                        CqlValue::Map(BTreeMap::from([(
                            CqlValue::from(ss::TARGET),
                            CqlValue::from(column.as_str()),
                        )])),
                    ),
                ])
            })
            .collect()
    }
}

/// Apply one validated assignment to `row`. Emptied collections become null.
fn apply(row: &mut Row, assignment: &Assignment) {
    let column = assignment.column();
    match assignment {
        Assignment::Set { value: Some(v), .. } => {
            row.insert(column.to_owned(), v.clone());
        }
        Assignment::Set { value: None, .. } => {
            row.remove(column);
        }
        Assignment::MapPut { entries, .. } => {
            let cell = row
                .entry(column.to_owned())
                .or_insert_with(|| CqlValue::Map(BTreeMap::new()));
            if let CqlValue::Map(map) = cell {
                map.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        Assignment::SetAdd { elements, .. } => {
            let cell = row
                .entry(column.to_owned())
                .or_insert_with(|| CqlValue::Set(Default::default()));
            if let CqlValue::Set(set) = cell {
                set.extend(elements.iter().cloned());
            }
        }
        Assignment::MapRemove { keys, .. } => {
            if let Some(CqlValue::Map(map)) = row.get_mut(column) {
                map.retain(|k, _| !keys.contains(k));
            }
        }
        Assignment::SetRemove { elements, .. } => {
            if let Some(CqlValue::Set(set)) = row.get_mut(column) {
                set.retain(|e| !elements.contains(e));
            }
        }
    }
    let emptied = match row.get(column) {
        Some(CqlValue::Map(map)) => map.is_empty(),
        Some(CqlValue::Set(set)) => set.is_empty(),
        _ => false,
    };
    if emptied {
        row.remove(column);
    }
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ClusterState {
    tables: DashMap<TableId, Arc<MemTable>>,
}

impl ClusterState {
    fn table(&self, keyspace: &str, table: &str) -> Result<Arc<MemTable>, ExecutorError> {
        self.tables
            .get(&(keyspace.to_owned(), table.to_owned()))
            .map(|t| Arc::clone(t.value()))
            .ok_or_else(|| ExecutorError::NotFound(format!("table {keyspace}.{table}")))
    }

    fn execute(&self, statement: &Statement) -> Result<Vec<Row>, ExecutorError> {
        match statement {
            Statement::CreateTable {
                keyspace,
                table,
                columns,
                partition_key,
                clustering_key,
            } => {
                let definition =
                    MemTable::new(columns.clone(), partition_key.clone(), clustering_key.clone())?;
                match self.tables.entry((keyspace.clone(), table.clone())) {
                    Entry::Occupied(_) => {
                        return Err(ExecutorError::AlreadyExists(format!(
                            "table {keyspace}.{table}"
                        )));
                    }
                    Entry::Vacant(e) => {
                        e.insert(Arc::new(definition));
                    }
                }
            }
            Statement::DropTable { keyspace, table } => {
                self.tables
                    .remove(&(keyspace.clone(), table.clone()))
                    .ok_or_else(|| ExecutorError::NotFound(format!("table {keyspace}.{table}")))?;
            }
            Statement::CreateIndex {
                keyspace,
                table,
                index_name,
                column,
            } => self.create_index(keyspace, table, index_name, column)?,
            Statement::Select {
                keyspace,
                table,
                selection,
                relations,
                limit,
                allow_filtering,
            } => {
                return self
                    .table(keyspace, table)?
                    .select(selection, relations, *limit, *allow_filtering);
            }
            Statement::Update {
                keyspace,
                table,
                assignments,
                relations,
            } => self.table(keyspace, table)?.update(assignments, relations)?,
            Statement::Delete {
                keyspace,
                table,
                relations,
            } => self.table(keyspace, table)?.delete(relations)?,
            Statement::ListTables { keyspace } => {
                let mut names: Vec<String> = self
                    .tables
                    .iter()
                    .filter(|e| e.key().0 == *keyspace)
                    .map(|e| e.key().1.clone())
                    .collect();
                names.sort();
                return Ok(names
                    .into_iter()
                    .map(|name| Row::from([(ss::TABLE_NAME.to_owned(), CqlValue::from(name))]))
                    .collect());
            }
            Statement::DescribeColumns { keyspace, table } => {
                return Ok(self
                    .table(keyspace, table)
                    .map(|t| t.column_rows())
                    .unwrap_or_default());
            }
            Statement::DescribeIndexes { keyspace, table } => {
                return Ok(self
                    .table(keyspace, table)
                    .map(|t| t.index_rows())
                    .unwrap_or_default());
            }
        }
        Ok(Vec::new())
    }

    fn create_index(
        &self,
        keyspace: &str,
        table: &str,
        index_name: &str,
        column: &str,
    ) -> Result<(), ExecutorError> {
        let target = self.table(keyspace, table)?;
        target.require_column(column)?;
        if column == target.partition_key {
            return Err(invalid(format!(
                "cannot create secondary index on partition key column {column}"
            )));
        }

        let taken = self
            .tables
            .iter()
            .filter(|e| e.key().0 == keyspace && e.key().1 != table)
            .any(|e| e.value().indexes.read().contains_key(index_name));
        let mut indexes = target.indexes.write();
        if taken || indexes.contains_key(index_name) {
            return Err(ExecutorError::AlreadyExists(format!(
                "index {keyspace}.{index_name}"
            )));
        }
        indexes.insert(index_name.to_owned(), column.to_owned());
        Ok(())
    }
}

/// An in-process cluster. Sessions connected to the same cluster share data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCluster {
    state: Arc<ClusterState>,
}

impl InMemoryCluster {
    /// Create an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session without going through [`Connector::connect`].
    #[must_use]
    pub fn session(&self) -> InMemorySession {
        InMemorySession {
            state: Arc::clone(&self.state),
        }
    }
}

#[async_trait]
impl Connector for InMemoryCluster {
    type Session = InMemorySession;

    async fn connect(&self, contact_points: &[String]) -> Result<InMemorySession, ExecutorError> {
        if contact_points.is_empty() {
            return Err(ExecutorError::Unavailable(
                "no contact points given".to_owned(),
            ));
        }
        info!(?contact_points, "connected to in-memory cluster");
        Ok(self.session())
    }
}

/// A session on an [`InMemoryCluster`].
#[derive(Debug, Clone)]
pub struct InMemorySession {
    state: Arc<ClusterState>,
}

#[async_trait]
impl Executor for InMemorySession {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>, ExecutorError> {
        debug!(keyspace = statement.keyspace(), %statement, "executing statement");
        self.state.execute(statement)
    }
}
