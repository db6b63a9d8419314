//! Relational engines that submitted queries run on.
//!
//! An engine materializes a dataset's [`Projection`] into a fresh database and
//! runs query text against it. [`SqliteEngine`] is the only implementation;
//! tests substitute their own engines through the [`QueryEngine`] trait.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::Connection;

use crate::model::Dataset;
use crate::projection::{Projection, ProjectionError};
use crate::value::{Row, Value};

/// Schema the projection is inserted into.
pub const DEFAULT_SCHEMA: &str = include_str!("schema.sql");

/// Errors that can occur in engines
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Executes query text over a dataset.
pub trait QueryEngine {
    /// Name of this engine (for logs).
    fn name(&self) -> &str;

    /// Load `dataset` into a fresh, isolated database and run `sql` on it.
    fn execute(&self, dataset: &Dataset, sql: &str) -> Result<Vec<Row>, EngineError>;

    /// Persist `dataset` as a database at `path`, replacing any existing file.
    fn dump(&self, dataset: &Dataset, path: &Path) -> Result<(), EngineError>;
}

/// SQLite through rusqlite.
#[derive(Debug, Clone)]
pub struct SqliteEngine {
    schema: String,
}

impl Default for SqliteEngine {
    fn default() -> Self {
        Self::with_schema(DEFAULT_SCHEMA)
    }
}

impl SqliteEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `schema` instead of the built-in schema script.
    pub fn with_schema(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    /// Load the schema script from a file.
    pub fn from_schema_file(path: &Path) -> Result<Self, EngineError> {
        let schema = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::with_schema(schema))
    }

    /// Create the tables and insert every projected row in one transaction.
    ///
    /// Foreign keys are declared by the schema but not enforced, so a
    /// submitted statement may delete or update any table.
    fn populate(&self, conn: &mut Connection, dataset: &Dataset) -> Result<(), EngineError> {
        let projection = Projection::of(dataset)?;
        conn.pragma_update(None, "foreign_keys", false)?;
        conn.execute_batch(&self.schema)?;

        let tx = conn.transaction()?;
        for table in &projection.tables {
            let mut stmt = tx.prepare(&table.insert_sql())?;
            for row in &table.rows {
                stmt.execute(rusqlite::params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;

        tracing::debug!(
            rows = projection.row_count(),
            tables = projection.tables.len(),
            "materialized dataset"
        );
        Ok(())
    }

    fn query(conn: &Connection, sql: &str) -> Result<Vec<Row>, EngineError> {
        let mut stmt = conn.prepare(sql)?;
        let column_count = stmt.column_count();
        if column_count == 0 {
            // Statement doesn't return rows
            stmt.execute([])?;
            return Ok(Vec::new());
        }

        let mut query_rows = stmt.query([])?;
        let mut rows = Vec::new();
        while let Some(row) = query_rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(convert_sqlite_value(row.get_ref(i)?));
            }
            rows.push(Row(values));
        }
        Ok(rows)
    }
}

impl QueryEngine for SqliteEngine {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn execute(&self, dataset: &Dataset, sql: &str) -> Result<Vec<Row>, EngineError> {
        let mut conn = Connection::open_in_memory()?;
        self.populate(&mut conn, dataset)?;
        Self::query(&conn, sql)
    }

    fn dump(&self, dataset: &Dataset, path: &Path) -> Result<(), EngineError> {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(EngineError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
        let mut conn = Connection::open(path)?;
        self.populate(&mut conn, dataset)?;
        tracing::info!("Wrote dataset to {}", path.display());
        Ok(())
    }
}

fn convert_sqlite_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(s) => Value::Text(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b.as_slice())),
        })
    }
}
