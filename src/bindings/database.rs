//! # Database Binding
//!
//! The `database` top-level object, registered only for engines built with
//! `enable_database`. Methods delegate to [`SqlClient`]; positional SQL
//! arguments go through the value bridge and query results come back as the
//! bridge's ResultSet map shape.

use std::sync::{Arc, Mutex};

use rhai::{Dynamic, Engine, EvalAltResult, Scope};

use crate::config::DbConfig;
use crate::db::{self, SqlClient};
use crate::engine::Deadline;
use crate::value::{result_set_to_dynamic, to_sql_params};

use super::throw;

/// The `database` top-level object.
#[derive(Clone)]
pub struct Database {
    client: Arc<Mutex<SqlClient>>,
}

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

impl Database {
    fn execute(&self, sql: &str, args: &[Dynamic]) -> ScriptResult<i64> {
        let params = to_sql_params(args).map_err(throw)?;
        self.client
            .lock()
            .unwrap()
            .execute(sql, params)
            .map_err(throw)
    }

    fn query(&self, sql: &str, args: &[Dynamic]) -> ScriptResult<Dynamic> {
        let params = to_sql_params(args).map_err(throw)?;
        let rs = self
            .client
            .lock()
            .unwrap()
            .query(sql, params)
            .map_err(throw)?;
        Ok(result_set_to_dynamic(&rs))
    }
}

/// Register `execute` and `query` for arities 0 through 4 positional args.
macro_rules! register_statement {
    ($engine:expr, $name:literal, $method:ident, $ret:ty) => {
        $engine.register_fn($name, |d: &mut Database, sql: &str| -> ScriptResult<$ret> {
            d.$method(sql, &[])
        });
        $engine.register_fn(
            $name,
            |d: &mut Database, sql: &str, a: Dynamic| -> ScriptResult<$ret> {
                d.$method(sql, &[a])
            },
        );
        $engine.register_fn(
            $name,
            |d: &mut Database, sql: &str, a: Dynamic, b: Dynamic| -> ScriptResult<$ret> {
                d.$method(sql, &[a, b])
            },
        );
        $engine.register_fn(
            $name,
            |d: &mut Database, sql: &str, a: Dynamic, b: Dynamic, c: Dynamic| -> ScriptResult<$ret> {
                d.$method(sql, &[a, b, c])
            },
        );
        $engine.register_fn(
            $name,
            |d: &mut Database,
             sql: &str,
             a: Dynamic,
             b: Dynamic,
             c: Dynamic,
             e: Dynamic|
             -> ScriptResult<$ret> { d.$method(sql, &[a, b, c, e]) },
        );
    };
}

/// Register the `database` binding.
pub fn register(
    engine: &mut Engine,
    scope: &mut Scope<'static>,
    config: &DbConfig,
    deadline: &Deadline,
) {
    engine.register_type_with_name::<Database>("Database");

    engine.register_fn("drivers", |_: &mut Database| {
        db::drivers()
            .into_iter()
            .map(Dynamic::from)
            .collect::<rhai::Array>()
    });
    engine.register_fn(
        "init",
        |d: &mut Database, driver: &str, dsn: &str| -> ScriptResult<()> {
            d.client.lock().unwrap().init(driver, dsn).map_err(throw)
        },
    );
    engine.register_fn("open", |d: &mut Database| -> ScriptResult<()> {
        d.client.lock().unwrap().open().map_err(throw)
    });
    engine.register_fn("close", |d: &mut Database| -> ScriptResult<()> {
        d.client.lock().unwrap().close().map_err(throw)
    });
    engine.register_fn("begin", |d: &mut Database| -> ScriptResult<()> {
        d.client.lock().unwrap().begin().map_err(throw)
    });
    engine.register_fn("commit", |d: &mut Database| -> ScriptResult<()> {
        d.client.lock().unwrap().commit().map_err(throw)
    });
    engine.register_fn("rollback", |d: &mut Database| -> ScriptResult<()> {
        d.client.lock().unwrap().rollback().map_err(throw)
    });

    register_statement!(engine, "execute", execute, i64);
    register_statement!(engine, "query", query, Dynamic);

    scope.push(
        "database",
        Database {
            client: Arc::new(Mutex::new(SqlClient::new(config.clone(), deadline.clone()))),
        },
    );
}
