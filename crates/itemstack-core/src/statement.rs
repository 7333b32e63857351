//! Column-store statement AST.
//!
//! Statements are built by the compiler, interpreted by an [`Executor`] and
//! rendered to CQL text through [`fmt::Display`] for logging and for executors
//! that speak the text protocol.
//!
//! [`Executor`]: crate::executor::Executor

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use itemstack_model::Number;
use thiserror::Error;

/// Names used by the `system_schema` metadata tables.
pub mod system_schema {
    /// Column holding a table name in `system_schema.tables`.
    pub const TABLE_NAME: &str = "table_name";
    /// Column holding a column name in `system_schema.columns`.
    pub const COLUMN_NAME: &str = "column_name";
    /// Column holding the role of a column in the primary key.
    pub const KIND: &str = "kind";
    /// Column holding the position of a key column.
    pub const POSITION: &str = "position";
    /// Column holding the rendered column type.
    pub const TYPE: &str = "type";
    /// Column holding an index name in `system_schema.indexes`.
    pub const INDEX_NAME: &str = "index_name";
    /// Column holding the index options map.
    pub const OPTIONS: &str = "options";
    /// Index option naming the indexed column.
    pub const TARGET: &str = "target";

    /// `kind` of a partition key column.
    pub const KIND_PARTITION_KEY: &str = "partition_key";
    /// `kind` of a clustering column.
    pub const KIND_CLUSTERING: &str = "clustering";
    /// `kind` of a regular column.
    pub const KIND_REGULAR: &str = "regular";
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Native scalar column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CqlScalar {
    /// Arbitrary-precision decimal.
    Decimal,
    /// UTF-8 text.
    Text,
    /// Opaque bytes.
    Blob,
}

impl CqlScalar {
    /// Returns the CQL type name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decimal => "decimal",
            Self::Text => "text",
            Self::Blob => "blob",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "decimal" => Some(Self::Decimal),
            "text" | "varchar" => Some(Self::Text),
            "blob" => Some(Self::Blob),
            _ => None,
        }
    }
}

/// A native column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnType {
    /// A scalar column.
    Scalar(CqlScalar),
    /// `set<elem>`.
    Set(CqlScalar),
    /// `map<key, value>`.
    Map(CqlScalar, CqlScalar),
}

impl ColumnType {
    /// `decimal`.
    pub const DECIMAL: Self = Self::Scalar(CqlScalar::Decimal);
    /// `text`.
    pub const TEXT: Self = Self::Scalar(CqlScalar::Text);
    /// `blob`.
    pub const BLOB: Self = Self::Scalar(CqlScalar::Blob);

    /// Returns `true` for set and map columns.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        !matches!(self, Self::Scalar(_))
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => f.write_str(s.as_str()),
            Self::Set(e) => write!(f, "set<{}>", e.as_str()),
            Self::Map(k, v) => write!(f, "map<{}, {}>", k.as_str(), v.as_str()),
        }
    }
}

/// Error returned for an unknown or unsupported column type name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported column type: {0}")]
pub struct ParseColumnTypeError(pub String);

impl FromStr for ColumnType {
    type Err = ParseColumnTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported = || ParseColumnTypeError(s.to_owned());
        let s = s.trim();

        let parameters = |prefix: &str| {
            s.strip_prefix(prefix)
                .and_then(|rest| rest.trim_start().strip_prefix('<'))
                .and_then(|rest| rest.strip_suffix('>'))
        };

        if let Some(inner) = parameters("set") {
            return CqlScalar::parse(inner).map(Self::Set).ok_or_else(unsupported);
        }
        if let Some(inner) = parameters("map") {
            let (k, v) = inner.split_once(',').ok_or_else(unsupported)?;
            return match (CqlScalar::parse(k), CqlScalar::parse(v)) {
                (Some(k), Some(v)) => Ok(Self::Map(k, v)),
                _ => Err(unsupported()),
            };
        }
        CqlScalar::parse(s).map(Self::Scalar).ok_or_else(unsupported)
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A native column value. Null is represented by absence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CqlValue {
    /// A `decimal` value.
    Decimal(Number),
    /// A `text` value.
    Text(String),
    /// A `blob` value.
    Blob(Bytes),
    /// A `set<...>` value.
    Set(BTreeSet<CqlValue>),
    /// A `map<...>` value.
    Map(BTreeMap<CqlValue, CqlValue>),
}

impl CqlValue {
    /// Returns `true` if this value can be stored in a column of type `ty`.
    #[must_use]
    pub fn conforms_to(&self, ty: ColumnType) -> bool {
        match (self, ty) {
            (Self::Set(elements), ColumnType::Set(e)) => {
                elements.iter().all(|v| v.is_scalar_of(e))
            }
            (Self::Map(entries), ColumnType::Map(k, v)) => entries
                .iter()
                .all(|(key, value)| key.is_scalar_of(k) && value.is_scalar_of(v)),
            (value, ColumnType::Scalar(s)) => value.is_scalar_of(s),
            _ => false,
        }
    }

    /// Returns `true` if this is a scalar of type `scalar`.
    #[must_use]
    pub fn is_scalar_of(&self, scalar: CqlScalar) -> bool {
        matches!(
            (self, scalar),
            (Self::Decimal(_), CqlScalar::Decimal)
                | (Self::Text(_), CqlScalar::Text)
                | (Self::Blob(_), CqlScalar::Blob)
        )
    }

    /// Returns the text if this is a `Text` value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the set elements if this is a `Set` value.
    #[must_use]
    pub fn as_set(&self) -> Option<&BTreeSet<CqlValue>> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the entries if this is a `Map` value.
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<CqlValue, CqlValue>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for CqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for CqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Number> for CqlValue {
    fn from(value: Number) -> Self {
        Self::Decimal(value)
    }
}

impl From<Bytes> for CqlValue {
    fn from(value: Bytes) -> Self {
        Self::Blob(value)
    }
}

impl fmt::Display for CqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decimal(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Blob(b) => write!(f, "0x{}", hex::encode(b)),
            Self::Set(elements) => {
                f.write_str("{")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{e}")?;
                }
                f.write_str("}")
            }
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// A result row: column name to value, holding non-null columns only.
pub type Row = BTreeMap<String, CqlValue>;

// ---------------------------------------------------------------------------
// Statement parts
// ---------------------------------------------------------------------------

/// Render an identifier, quoting it when it would not survive case folding.
fn ident(name: &str) -> Cow<'_, str> {
    let plain = name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        && name.bytes().next().is_some_and(|b| !b.is_ascii_digit());
    if plain {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}

/// Comparison operator of a [`Relation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// Equal (`=`).
    Eq,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    Le,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    Ge,
}

impl CompareOp {
    /// Evaluate `left op right`.
    #[must_use]
    pub fn matches<T: Ord + ?Sized>(&self, left: &T, right: &T) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Gt => left > right,
            Self::Ge => left >= right,
        }
    }
}

impl From<itemstack_model::types::ConditionOp> for CompareOp {
    fn from(op: itemstack_model::types::ConditionOp) -> Self {
        use itemstack_model::types::ConditionOp;
        match op {
            ConditionOp::Eq => Self::Eq,
            ConditionOp::Lt => Self::Lt,
            ConditionOp::Le => Self::Le,
            ConditionOp::Gt => Self::Gt,
            ConditionOp::Ge => Self::Ge,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Ge => write!(f, ">="),
        }
    }
}

/// A `WHERE` clause term: `column op value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Column name.
    pub column: String,
    /// Comparison operator.
    pub op: CompareOp,
    /// Right-hand value.
    pub value: CqlValue,
}

impl Relation {
    /// Create a new relation.
    #[must_use]
    pub fn new(column: impl Into<String>, op: CompareOp, value: impl Into<CqlValue>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// `column = value`.
    #[must_use]
    pub fn eq(column: impl Into<String>, value: impl Into<CqlValue>) -> Self {
        Self::new(column, CompareOp::Eq, value)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", ident(&self.column), self.op, self.value)
    }
}

/// A `SET` clause term of an `UPDATE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// `column = value`, or `column = null` when `value` is `None`.
    Set {
        /// Column name.
        column: String,
        /// New value.
        value: Option<CqlValue>,
    },
    /// `column = column + {k: v, ...}`.
    MapPut {
        /// Map column name.
        column: String,
        /// Entries to insert or replace.
        entries: BTreeMap<CqlValue, CqlValue>,
    },
    /// `column = column - {k, ...}`.
    MapRemove {
        /// Map column name.
        column: String,
        /// Keys to remove.
        keys: BTreeSet<CqlValue>,
    },
    /// `column = column + {e, ...}`.
    SetAdd {
        /// Set column name.
        column: String,
        /// Elements to add.
        elements: BTreeSet<CqlValue>,
    },
    /// `column = column - {e, ...}`.
    SetRemove {
        /// Set column name.
        column: String,
        /// Elements to remove.
        elements: BTreeSet<CqlValue>,
    },
}

impl Assignment {
    /// The assigned column.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Set { column, .. }
            | Self::MapPut { column, .. }
            | Self::MapRemove { column, .. }
            | Self::SetAdd { column, .. }
            | Self::SetRemove { column, .. } => column,
        }
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let column = ident(self.column());
        match self {
            Self::Set { value: Some(v), .. } => write!(f, "{column} = {v}"),
            Self::Set { value: None, .. } => write!(f, "{column} = null"),
            Self::MapPut { entries, .. } => {
                write!(f, "{column} = {column} + {}", CqlValue::Map(entries.clone()))
            }
            Self::MapRemove { keys: elements, .. } | Self::SetRemove { elements, .. } => {
                write!(f, "{column} = {column} - {}", CqlValue::Set(elements.clone()))
            }
            Self::SetAdd { elements, .. } => {
                write!(f, "{column} = {column} + {}", CqlValue::Set(elements.clone()))
            }
        }
    }
}

/// A column of a `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column type.
    pub column_type: ColumnType,
}

impl ColumnDef {
    /// Create a new column definition.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// The column list of a `SELECT`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// `*`.
    #[default]
    All,
    /// An explicit column list.
    Columns(Vec<String>),
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Columns(columns) => {
                let rendered: Vec<_> = columns.iter().map(|c| ident(c)).collect();
                f.write_str(&rendered.join(", "))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Statement
// ---------------------------------------------------------------------------

/// A column-store statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `CREATE TABLE keyspace.table (...)`.
    CreateTable {
        /// Keyspace name.
        keyspace: String,
        /// Table name.
        table: String,
        /// Column definitions, key columns first.
        columns: Vec<ColumnDef>,
        /// Partition key column.
        partition_key: String,
        /// Optional clustering column.
        clustering_key: Option<String>,
    },
    /// `DROP TABLE keyspace.table`.
    DropTable {
        /// Keyspace name.
        keyspace: String,
        /// Table name.
        table: String,
    },
    /// `CREATE INDEX name ON keyspace.table (column)`.
    CreateIndex {
        /// Keyspace name.
        keyspace: String,
        /// Table name.
        table: String,
        /// Index name.
        index_name: String,
        /// Indexed column.
        column: String,
    },
    /// `SELECT ... FROM keyspace.table WHERE ... LIMIT n [ALLOW FILTERING]`.
    Select {
        /// Keyspace name.
        keyspace: String,
        /// Table name.
        table: String,
        /// Selected columns.
        selection: Selection,
        /// `WHERE` terms, joined with `AND`.
        relations: Vec<Relation>,
        /// Maximum number of rows.
        limit: Option<usize>,
        /// Let the store filter on a non-key relation after an index lookup.
        allow_filtering: bool,
    },
    /// `UPDATE keyspace.table SET ... WHERE ...`.
    Update {
        /// Keyspace name.
        keyspace: String,
        /// Table name.
        table: String,
        /// `SET` terms, applied in order.
        assignments: Vec<Assignment>,
        /// `WHERE` terms identifying one row.
        relations: Vec<Relation>,
    },
    /// `DELETE FROM keyspace.table WHERE ...`.
    Delete {
        /// Keyspace name.
        keyspace: String,
        /// Table name.
        table: String,
        /// `WHERE` terms identifying the rows.
        relations: Vec<Relation>,
    },
    /// Table names of a keyspace, from `system_schema.tables`.
    ListTables {
        /// Keyspace name.
        keyspace: String,
    },
    /// Column metadata of a table, from `system_schema.columns`.
    DescribeColumns {
        /// Keyspace name.
        keyspace: String,
        /// Table name.
        table: String,
    },
    /// Index metadata of a table, from `system_schema.indexes`.
    DescribeIndexes {
        /// Keyspace name.
        keyspace: String,
        /// Table name.
        table: String,
    },
}

impl Statement {
    /// The keyspace the statement targets.
    #[must_use]
    pub fn keyspace(&self) -> &str {
        match self {
            Self::CreateTable { keyspace, .. }
            | Self::DropTable { keyspace, .. }
            | Self::CreateIndex { keyspace, .. }
            | Self::Select { keyspace, .. }
            | Self::Update { keyspace, .. }
            | Self::Delete { keyspace, .. }
            | Self::ListTables { keyspace }
            | Self::DescribeColumns { keyspace, .. }
            | Self::DescribeIndexes { keyspace, .. } => keyspace,
        }
    }
}

fn write_where(f: &mut fmt::Formatter<'_>, relations: &[Relation]) -> fmt::Result {
    for (i, relation) in relations.iter().enumerate() {
        f.write_str(if i == 0 { " WHERE " } else { " AND " })?;
        write!(f, "{relation}")?;
    }
    Ok(())
}

fn write_metadata_select(
    f: &mut fmt::Formatter<'_>,
    columns: &[&str],
    source: &str,
    keyspace: &str,
    table: Option<&str>,
) -> fmt::Result {
    write!(
        f,
        "SELECT {} FROM system_schema.{source} WHERE keyspace_name = {}",
        columns.join(", "),
        CqlValue::from(keyspace)
    )?;
    if let Some(table) = table {
        write!(f, " AND table_name = {}", CqlValue::from(table))?;
    }
    Ok(())
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use system_schema as ss;

        match self {
            Self::CreateTable {
                keyspace,
                table,
                columns,
                partition_key,
                clustering_key,
            } => {
                write!(f, "CREATE TABLE {}.{} (", ident(keyspace), ident(table))?;
                for column in columns {
                    write!(f, "{} {}, ", ident(&column.name), column.column_type)?;
                }
                write!(f, "PRIMARY KEY ({}", ident(partition_key))?;
                if let Some(clustering_key) = clustering_key {
                    write!(f, ", {}", ident(clustering_key))?;
                }
                f.write_str("))")
            }
            Self::DropTable { keyspace, table } => {
                write!(f, "DROP TABLE {}.{}", ident(keyspace), ident(table))
            }
            Self::CreateIndex {
                keyspace,
                table,
                index_name,
                column,
            } => write!(
                f,
                "CREATE INDEX {} ON {}.{} ({})",
                ident(index_name),
                ident(keyspace),
                ident(table),
                ident(column)
            ),
            Self::Select {
                keyspace,
                table,
                selection,
                relations,
                limit,
                allow_filtering,
            } => {
                write!(
                    f,
                    "SELECT {selection} FROM {}.{}",
                    ident(keyspace),
                    ident(table)
                )?;
                write_where(f, relations)?;
                if let Some(limit) = limit {
                    write!(f, " LIMIT {limit}")?;
                }
                if *allow_filtering {
                    f.write_str(" ALLOW FILTERING")?;
                }
                Ok(())
            }
            Self::Update {
                keyspace,
                table,
                assignments,
                relations,
            } => {
                write!(f, "UPDATE {}.{} SET ", ident(keyspace), ident(table))?;
                for (i, assignment) in assignments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{assignment}")?;
                }
                write_where(f, relations)
            }
            Self::Delete {
                keyspace,
                table,
                relations,
            } => {
                write!(f, "DELETE FROM {}.{}", ident(keyspace), ident(table))?;
                write_where(f, relations)
            }
            Self::ListTables { keyspace } => {
                write_metadata_select(f, &[ss::TABLE_NAME], "tables", keyspace, None)
            }
            Self::DescribeColumns { keyspace, table } => write_metadata_select(
                f,
                &[ss::COLUMN_NAME, ss::KIND, ss::POSITION, ss::TYPE],
                "columns",
                keyspace,
                Some(table),
            ),
            Self::DescribeIndexes { keyspace, table } => write_metadata_select(
                f,
                &[ss::INDEX_NAME, ss::OPTIONS],
                "indexes",
                keyspace,
                Some(table),
            ),
        }
    }
}
