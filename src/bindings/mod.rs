//! # Host Bindings
//!
//! The curated capabilities a script can reach, exposed as named top-level
//! objects with a fixed set of methods.
//!
//! ## Sub-modules
//! - **console**: leveled logging plus `table` rendering.
//! - **http**: outbound requests and single-consume response bodies.
//! - **etree**: XML element-tree construction.
//! - **database**: relational client (registered only when enabled).
//!
//! ## Pattern
//! Each binding is a `Clone` handle type whose methods are registered with
//! `engine.register_fn(...)`; the handle itself is pushed into the engine's
//! base scope under its binding name. Binding failures are thrown into the
//! script as [`ScriptError`] values, so script code can catch them; whatever
//! stays uncaught is recovered at the run boundary.

pub mod console;
pub mod database;
pub mod etree;
pub mod http;

use rhai::{Dynamic, Engine, EvalAltResult, Position, Scope};

use crate::config::EngineConfig;
use crate::engine::Deadline;
use crate::errors::ScriptError;

/// Register all bindings in their fixed, documented order.
pub fn register_all(
    engine: &mut Engine,
    scope: &mut Scope<'static>,
    config: &EngineConfig,
    deadline: &Deadline,
) {
    register_error_type(engine);
    console::register(engine, scope);
    http::register(engine, scope, &config.http, deadline);
    etree::register(engine, scope);
    if config.enable_database {
        database::register(engine, scope, &config.db, deadline);
    }
}

/// Convert a binding failure into a script-catchable thrown value.
pub(crate) fn throw(err: ScriptError) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        Dynamic::from(err),
        Position::NONE,
    ))
}

/// Make [`ScriptError`] printable and inspectable from script code.
fn register_error_type(engine: &mut Engine) {
    engine.register_type_with_name::<ScriptError>("ScriptError");
    engine.register_fn("to_string", |err: &mut ScriptError| err.to_string());
    engine.register_fn("to_debug", |err: &mut ScriptError| format!("{err:?}"));
}
