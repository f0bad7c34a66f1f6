//! # Console Binding
//!
//! Leveled logging for scripts, routed to the host `tracing` facility.
//!
//! Methods take one to five printable arguments which are space-joined.
//! `log` routes at debug level by convention; `table` renders arrays and
//! maps as a two-column field/value table.

use rhai::{Dynamic, Engine, Scope};
use tracing::{debug, error, info, warn};

/// The `console` top-level object.
#[derive(Clone)]
pub struct Console;

fn join(parts: &[Dynamic]) -> String {
    parts
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn emit_error(msg: &str) {
    error!("{msg}");
}

fn emit_warn(msg: &str) {
    warn!("{msg}");
}

fn emit_info(msg: &str) {
    info!("{msg}");
}

fn emit_debug(msg: &str) {
    debug!("{msg}");
}

/// Register one console method for arities 1 through 5.
macro_rules! register_level {
    ($engine:expr, $name:literal, $emit:path) => {
        $engine.register_fn($name, |_: &mut Console, a: Dynamic| $emit(&join(&[a])));
        $engine.register_fn($name, |_: &mut Console, a: Dynamic, b: Dynamic| {
            $emit(&join(&[a, b]))
        });
        $engine.register_fn(
            $name,
            |_: &mut Console, a: Dynamic, b: Dynamic, c: Dynamic| $emit(&join(&[a, b, c])),
        );
        $engine.register_fn(
            $name,
            |_: &mut Console, a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic| {
                $emit(&join(&[a, b, c, d]))
            },
        );
        $engine.register_fn(
            $name,
            |_: &mut Console, a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic, e: Dynamic| {
                $emit(&join(&[a, b, c, d, e]))
            },
        );
    };
}

/// Register the `console` binding.
pub fn register(engine: &mut Engine, scope: &mut Scope<'static>) {
    engine.register_type_with_name::<Console>("Console");

    register_level!(engine, "error", emit_error);
    register_level!(engine, "warn", emit_warn);
    register_level!(engine, "info", emit_info);
    register_level!(engine, "debug", emit_debug);
    // log routes at debug level by convention
    register_level!(engine, "log", emit_debug);

    engine.register_fn("table", |_: &mut Console, value: Dynamic| {
        match render_table(&value) {
            Some(table) => debug!("\n{table}"),
            None => error!("console.table: unsupported type {}", value.type_name()),
        }
    });

    scope.push("console", Console);
}

/// Two-column field/value table with sized columns.
struct StringTable {
    rows: Vec<[String; 2]>,
}

impl StringTable {
    fn new() -> Self {
        Self {
            rows: vec![["field".to_string(), "value".to_string()]],
        }
    }

    fn add(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.rows.push([field.into(), value.into()]);
    }

    fn render(&self) -> String {
        let width = |col: usize| {
            self.rows
                .iter()
                .map(|row| row[col].chars().count())
                .max()
                .unwrap_or(0)
        };
        let (w0, w1) = (width(0), width(1));
        let mut out = String::new();
        for (i, row) in self.rows.iter().enumerate() {
            out.push_str(&format!("| {:<w0$} | {:<w1$} |\n", row[0], row[1]));
            if i == 0 {
                out.push_str(&format!("|{}|{}|\n", "-".repeat(w0 + 2), "-".repeat(w1 + 2)));
            }
        }
        out
    }
}

fn render_table(value: &Dynamic) -> Option<String> {
    let value = value.clone().flatten();
    let mut table = StringTable::new();
    if value.is_map() {
        let map = value.try_cast::<rhai::Map>()?;
        for (key, item) in &map {
            table.add(key.as_str(), item.to_string());
        }
    } else if value.is_array() {
        let array = value.try_cast::<rhai::Array>()?;
        for (i, item) in array.iter().enumerate() {
            table.add(i.to_string(), item.to_string());
        }
    } else {
        return None;
    }
    Some(table.render())
}
