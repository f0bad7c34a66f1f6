//! # Scriptbox
//!
//! An embedded scripting runtime built on [rhai]. A host application hands
//! over source text once; the engine compiles it, wires in a curated set of
//! host bindings and a module resolver, and can then execute the program
//! repeatedly under a wall-clock timeout.
//!
//! ## Architecture
//! - [`engine`]: the compile-once factory and the supervised execution
//!   controller.
//! - [`resolver`]: `import` resolution across a filesystem search path and
//!   the embedded resource set, with caching.
//! - [`bindings`]: the `console`, `http`, `etree` and `database` objects
//!   scripts see.
//! - [`value`]: conversions between host values, script values and SQL
//!   parameters.
//! - [`db`] / [`etree`]: the host-side machinery behind the corresponding
//!   bindings.
//!
//! ## Quick start
//! ```no_run
//! use scriptbox::{EngineConfig, ScriptEngine};
//! use std::time::Duration;
//!
//! let engine = ScriptEngine::new(
//!     r#"fn main(args) { "hello " + args.who }"#,
//!     "",
//!     EngineConfig::default(),
//! )?;
//!
//! let mut args = rhai::Map::new();
//! args.insert("who".into(), "world".into());
//! let out = engine.run(
//!     Duration::from_secs(5),
//!     "main",
//!     vec![scriptbox::value::shared_map(args)],
//! )?;
//! assert_eq!(out.to_string(), "hello world");
//! # Ok::<(), scriptbox::ScriptError>(())
//! ```

pub mod bindings;
pub mod config;
pub mod db;
pub mod engine;
pub mod errors;
pub mod etree;
pub mod resolver;
pub mod resources;
pub mod value;

pub use config::{DbConfig, EngineConfig, HttpConfig};
pub use db::{Field, LogicalType, ResultSet, SqlValue};
pub use engine::{format_script, Deadline, ScriptEngine};
pub use errors::ScriptError;
pub use resolver::ScriptModuleResolver;
