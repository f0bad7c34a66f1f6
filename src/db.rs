//! # Relational Client
//!
//! The database client behind the `database` host binding.
//!
//! ## Responsibilities
//! - **Connection lifecycle**: `init`, `open` (with bounded ping), `close`.
//! - **Transactions**: depth-counted `begin`/`commit`/`rollback` where only
//!   the outermost call touches the real transaction.
//! - **Queries**: `execute` returning affected rows, `query` returning a
//!   [`ResultSet`] with canonical column names and typed nullable fields.
//!
//! One client belongs to one engine and must only be driven from the
//! script-executing thread.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::debug;

use crate::config::DbConfig;
use crate::engine::Deadline;
use crate::errors::ScriptError;

/// Identifiers of the installed SQL drivers, in registration order.
static DRIVERS: &[&str] = &["sqlite3"];

/// Enumerate the installed SQL driver names.
pub fn drivers() -> Vec<String> {
    DRIVERS.iter().map(|d| d.to_string()).collect()
}

/// Logical column types a [`ResultSet`] can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalType {
    Bool,
    Byte,
    Float64,
    Int16,
    Int32,
    Int64,
    Time,
    String,
}

impl LogicalType {
    /// The zero value of this type, used for null cells.
    pub fn zero(self) -> SqlValue {
        match self {
            LogicalType::Bool => SqlValue::Bool(false),
            LogicalType::Byte => SqlValue::Byte(0),
            LogicalType::Float64 => SqlValue::Float64(0.0),
            LogicalType::Int16 => SqlValue::Int16(0),
            LogicalType::Int32 => SqlValue::Int32(0),
            LogicalType::Int64 => SqlValue::Int64(0),
            LogicalType::Time => SqlValue::Time(String::new()),
            LogicalType::String => SqlValue::Text(String::new()),
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogicalType::Bool => "Bool",
            LogicalType::Byte => "Byte",
            LogicalType::Float64 => "Float64",
            LogicalType::Int16 => "Int16",
            LogicalType::Int32 => "Int32",
            LogicalType::Int64 => "Int64",
            LogicalType::Time => "Time",
            LogicalType::String => "String",
        };
        f.write_str(name)
    }
}

/// A typed cell value.
///
/// Time values carry the driver's textual representation; their zero value is
/// the empty string.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Bool(bool),
    Byte(u8),
    Float64(f64),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Time(String),
    Text(String),
}

/// One cell: a value plus an explicit null flag.
///
/// When `is_null` holds, `value` is the column type's zero value, never
/// whatever the driver left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub value: SqlValue,
    pub is_null: bool,
}

impl Field {
    fn null(ty: LogicalType) -> Self {
        Self {
            value: ty.zero(),
            is_null: true,
        }
    }
}

/// Structured response of a relational query.
#[derive(Debug, Clone)]
pub struct ResultSet {
    /// Canonical (uppercased, identifier-only) column names, in query order.
    pub column_names: Vec<String>,
    pub column_types: Vec<LogicalType>,
    pub row_count: usize,
    /// One mapping per row, keyed by canonical column name.
    pub rows: Vec<BTreeMap<String, Field>>,
}

/// Database client owned by a single engine.
pub struct SqlClient {
    driver: Option<String>,
    dsn: String,
    conn: Option<Connection>,
    tx_depth: u32,
    config: DbConfig,
    run_deadline: Deadline,
    io_deadline: Deadline,
}

impl SqlClient {
    pub fn new(config: DbConfig, run_deadline: Deadline) -> Self {
        Self {
            driver: None,
            dsn: String::new(),
            conn: None,
            tx_depth: 0,
            config,
            run_deadline,
            io_deadline: Deadline::default(),
        }
    }

    /// Store connection parameters; no connection is opened yet.
    pub fn init(&mut self, driver: &str, dsn: &str) -> Result<(), ScriptError> {
        if !DRIVERS.contains(&driver) {
            return Err(ScriptError::Sql(format!("unknown driver: {driver}")));
        }
        self.driver = Some(driver.to_string());
        self.dsn = dsn.to_string();
        Ok(())
    }

    /// Open the connection and verify it with a bounded ping.
    pub fn open(&mut self) -> Result<(), ScriptError> {
        if self.driver.is_none() {
            return Err(ScriptError::Sql("database is not initialized".into()));
        }
        let conn = if self.dsn.is_empty() || self.dsn == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(&self.dsn)
        }
        .map_err(sql_err)?;

        conn.busy_timeout(self.config.busy_timeout).map_err(sql_err)?;
        let io = self.io_deadline.clone();
        conn.progress_handler(100, Some(move || io.expired()));

        self.conn = Some(conn);
        self.tx_depth = 0;
        self.ping()
    }

    fn ping(&mut self) -> Result<(), ScriptError> {
        self.arm_io(self.config.ping_timeout);
        let result = self
            .conn()?
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0));
        self.io_deadline.clear();
        result.map_err(sql_err).map(|_| ())
    }

    /// Close and discard the connection.
    pub fn close(&mut self) -> Result<(), ScriptError> {
        if self.conn.take().is_none() {
            return Err(ScriptError::Sql("database is not open".into()));
        }
        self.tx_depth = 0;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Current transaction nesting depth. Zero means no transaction.
    pub fn tx_depth(&self) -> u32 {
        self.tx_depth
    }

    /// Begin a transaction, or just deepen the nesting counter.
    pub fn begin(&mut self) -> Result<(), ScriptError> {
        if self.tx_depth == 0 {
            self.conn()?.execute_batch("BEGIN").map_err(sql_err)?;
        }
        self.tx_depth += 1;
        Ok(())
    }

    /// Commit the outermost transaction, or just unwind one nesting level.
    pub fn commit(&mut self) -> Result<(), ScriptError> {
        if self.tx_depth == 0 {
            return Err(ScriptError::TransactionMisuse("commit without begin".into()));
        }
        self.tx_depth -= 1;
        if self.tx_depth == 0 {
            self.conn()?.execute_batch("COMMIT").map_err(sql_err)?;
        }
        Ok(())
    }

    /// Roll back the outermost transaction, or just unwind one nesting level.
    pub fn rollback(&mut self) -> Result<(), ScriptError> {
        if self.tx_depth == 0 {
            return Err(ScriptError::TransactionMisuse(
                "rollback without begin".into(),
            ));
        }
        self.tx_depth -= 1;
        if self.tx_depth == 0 {
            self.conn()?.execute_batch("ROLLBACK").map_err(sql_err)?;
        }
        Ok(())
    }

    /// Run a statement and return the number of affected rows.
    pub fn execute(
        &mut self,
        sql: &str,
        params: Vec<rusqlite::types::Value>,
    ) -> Result<i64, ScriptError> {
        self.arm_io(self.config.query_timeout);
        let result = self
            .conn()?
            .execute(sql, rusqlite::params_from_iter(params))
            .map_err(sql_err);
        self.io_deadline.clear();
        Ok(result? as i64)
    }

    /// Run a query and collect the full result set.
    pub fn query(
        &mut self,
        sql: &str,
        params: Vec<rusqlite::types::Value>,
    ) -> Result<ResultSet, ScriptError> {
        self.arm_io(self.config.query_timeout);
        let result = self.query_inner(sql, params);
        self.io_deadline.clear();
        result
    }

    fn query_inner(
        &mut self,
        sql: &str,
        params: Vec<rusqlite::types::Value>,
    ) -> Result<ResultSet, ScriptError> {
        let conn = match &self.conn {
            Some(conn) => conn,
            None => return Err(ScriptError::Sql("database is not open".into())),
        };
        let mut stmt = conn.prepare(sql).map_err(sql_err)?;

        let mut column_names = Vec::with_capacity(stmt.column_count());
        let mut column_types = Vec::with_capacity(stmt.column_count());
        for column in stmt.columns() {
            let name = canonical_column_name(column.name());
            if column_names.contains(&name) {
                return Err(ScriptError::Sql(format!(
                    "duplicate column name in result set: {name}"
                )));
            }
            column_names.push(name);
            column_types.push(logical_type(column.decl_type()));
        }

        let col_count = column_names.len();
        let mut rows = stmt
            .query(rusqlite::params_from_iter(params))
            .map_err(sql_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(sql_err)? {
            let mut record = BTreeMap::new();
            for i in 0..col_count {
                let cell = row.get_ref(i).map_err(sql_err)?;
                record.insert(column_names[i].clone(), field_from(cell, column_types[i]));
            }
            out.push(record);
        }

        Ok(ResultSet {
            column_names,
            column_types,
            row_count: out.len(),
            rows: out,
        })
    }

    fn conn(&self) -> Result<&Connection, ScriptError> {
        self.conn
            .as_ref()
            .ok_or_else(|| ScriptError::Sql("database is not open".into()))
    }

    /// Arm the per-call I/O deadline: the statement timeout capped by
    /// whatever remains of the run deadline.
    fn arm_io(&self, statement_timeout: Duration) {
        let effective = match self.run_deadline.remaining() {
            Some(remaining) => remaining.min(statement_timeout),
            None => statement_timeout,
        };
        self.io_deadline.arm(effective);
    }
}

/// Uppercased first run of identifier characters of a driver-reported name.
pub fn canonical_column_name(raw: &str) -> String {
    raw.chars()
        .skip_while(|c| !c.is_ascii_alphanumeric() && *c != '_')
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Map a declared column type to a logical type; unknown declarations fall
/// back to String (logged at debug level).
fn logical_type(decl: Option<&str>) -> LogicalType {
    let Some(decl) = decl else {
        return LogicalType::String;
    };
    let head: String = decl
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_ascii_uppercase();
    match head.as_str() {
        "BOOL" | "BOOLEAN" => LogicalType::Bool,
        "TINYINT" => LogicalType::Byte,
        "SMALLINT" | "INT2" => LogicalType::Int16,
        "MEDIUMINT" | "INT4" => LogicalType::Int32,
        "INT" | "INTEGER" | "BIGINT" | "INT8" => LogicalType::Int64,
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" | "DECIMAL" => LogicalType::Float64,
        "DATE" | "TIME" | "DATETIME" | "TIMESTAMP" => LogicalType::Time,
        "TEXT" | "VARCHAR" | "NVARCHAR" | "CHAR" | "CLOB" | "STRING" => LogicalType::String,
        other => {
            debug!("unknown column type {other:?}, defaulting to String");
            LogicalType::String
        }
    }
}

fn field_from(cell: ValueRef<'_>, ty: LogicalType) -> Field {
    if matches!(cell, ValueRef::Null) {
        return Field::null(ty);
    }
    let value = match ty {
        LogicalType::Bool => SqlValue::Bool(cell_i64(cell) != 0),
        LogicalType::Byte => SqlValue::Byte(cell_i64(cell) as u8),
        LogicalType::Int16 => SqlValue::Int16(cell_i64(cell) as i16),
        LogicalType::Int32 => SqlValue::Int32(cell_i64(cell) as i32),
        LogicalType::Int64 => SqlValue::Int64(cell_i64(cell)),
        LogicalType::Float64 => SqlValue::Float64(cell_f64(cell)),
        LogicalType::Time => SqlValue::Time(cell_text(cell)),
        LogicalType::String => SqlValue::Text(cell_text(cell)),
    };
    Field {
        value,
        is_null: false,
    }
}

fn cell_i64(cell: ValueRef<'_>) -> i64 {
    match cell {
        ValueRef::Integer(i) => i,
        ValueRef::Real(f) => f as i64,
        ValueRef::Text(t) => String::from_utf8_lossy(t).trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn cell_f64(cell: ValueRef<'_>) -> f64 {
    match cell {
        ValueRef::Real(f) => f,
        ValueRef::Integer(i) => i as f64,
        ValueRef::Text(t) => String::from_utf8_lossy(t).trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn cell_text(cell: ValueRef<'_>) -> String {
    match cell {
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Null => String::new(),
    }
}

fn sql_err(err: rusqlite::Error) -> ScriptError {
    ScriptError::Sql(err.to_string())
}
