//! # Script Engine
//!
//! Compile-once script execution with wall-clock supervision.
//!
//! ## Responsibilities
//! - **Engine Factory**: build a runtime, install the module resolver and
//!   host bindings in a fixed order, compile the source once.
//! - **Execution Controller**: run the compiled program (optionally invoking
//!   a named entry function), enforce the timeout, guarantee that the
//!   supervisor thread is reaped on every exit path.
//!
//! One engine owns one compiled script and may run it any number of times.
//! Concurrent runs on the same engine are not supported; callers serialize.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rhai::{CallFnOptions, Dynamic, EvalAltResult, Scope, AST};
use tracing::debug;

use crate::bindings;
use crate::config::EngineConfig;
use crate::errors::ScriptError;
use crate::resolver::ScriptModuleResolver;
use crate::resources;

/// Shared wall-clock deadline handed to blocking host bindings.
///
/// Armed by the execution controller for the duration of one run; bindings
/// derive their I/O timeouts from [`Deadline::remaining`] so an in-flight
/// request or statement cannot outlive the supervisor.
#[derive(Clone, Debug, Default)]
pub struct Deadline {
    inner: Arc<Mutex<Option<Instant>>>,
}

impl Deadline {
    /// Arm the deadline `timeout` from now. A zero timeout disarms instead.
    pub fn arm(&self, timeout: Duration) {
        let mut slot = self.inner.lock().unwrap();
        *slot = if timeout.is_zero() {
            None
        } else {
            Some(Instant::now() + timeout)
        };
    }

    /// Disarm the deadline.
    pub fn clear(&self) {
        *self.inner.lock().unwrap() = None;
    }

    /// Time left until expiry; `None` when unarmed.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .lock()
            .unwrap()
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// True when armed and elapsed.
    pub fn expired(&self) -> bool {
        matches!(self.remaining(), Some(left) if left.is_zero())
    }
}

/// A compiled script plus its host bindings and module resolver.
#[derive(Debug)]
pub struct ScriptEngine {
    engine: rhai::Engine,
    ast: AST,
    base_scope: Scope<'static>,
    interrupt: Arc<AtomicBool>,
    deadline: Deadline,
}

impl ScriptEngine {
    /// Compile `source` and attach the host bindings.
    ///
    /// `module_search_path` may be empty; scripts can then only import
    /// embedded modules. A compile failure reports [`ScriptError::Compile`]
    /// and retains nothing.
    pub fn new(
        source: &str,
        module_search_path: &str,
        config: EngineConfig,
    ) -> Result<Self, ScriptError> {
        let mut engine = rhai::Engine::new();
        engine.set_max_expr_depths(0, 0);

        let interrupt = Arc::new(AtomicBool::new(false));
        let flag = interrupt.clone();
        engine.on_progress(move |_| {
            if flag.load(Ordering::Relaxed) {
                Some(Dynamic::from("interrupted"))
            } else {
                None
            }
        });

        engine.set_module_resolver(ScriptModuleResolver::new(module_search_path));

        let deadline = Deadline::default();
        let mut base_scope = Scope::new();
        bindings::register_all(&mut engine, &mut base_scope, &config, &deadline);

        let ast = engine
            .compile(source)
            .map_err(|e| ScriptError::Compile(e.to_string()))?;

        Ok(Self {
            engine,
            ast,
            base_scope,
            interrupt,
            deadline,
        })
    }

    /// Execute the program, then optionally invoke `entry_name` with `args`.
    ///
    /// A zero `timeout` means no timeout. The returned value is the final
    /// expression of the program, or the entry function's result when
    /// `entry_name` is non-empty. When the supervisor trips, the run reports
    /// [`ScriptError::Timeout`] regardless of any collateral error.
    pub fn run(
        &self,
        timeout: Duration,
        entry_name: &str,
        args: Vec<Dynamic>,
    ) -> Result<Dynamic, ScriptError> {
        // A new run always starts from a cleared interrupt.
        self.interrupt.store(false, Ordering::SeqCst);
        self.deadline.arm(timeout);

        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let supervisor = if timeout.is_zero() {
            None
        } else {
            let flag = self.interrupt.clone();
            Some(thread::spawn(move || {
                if done_rx.recv_timeout(timeout).is_err() {
                    debug!("script supervisor fired after {timeout:?}");
                    flag.store(true, Ordering::SeqCst);
                }
            }))
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.eval(entry_name, &args)));

        // Reap the supervisor on every exit path.
        let _ = done_tx.send(());
        if let Some(handle) = supervisor {
            let _ = handle.join();
        }
        self.deadline.clear();

        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(ScriptError::Script(panic_message(payload))),
        };

        // Timeout shadows whatever the interrupted evaluation reported.
        if self.interrupt.load(Ordering::SeqCst) {
            return Err(ScriptError::Timeout(timeout));
        }
        result
    }

    fn eval(&self, entry_name: &str, args: &[Dynamic]) -> Result<Dynamic, ScriptError> {
        let mut scope = self.base_scope.clone();

        // Run all top-level statements; this also registers any functions
        // the script defines.
        let value = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &self.ast)
            .map_err(map_eval_error)?;

        if entry_name.is_empty() {
            return Ok(value);
        }

        let options = CallFnOptions::new().eval_ast(false);
        match self.engine.call_fn_with_options::<Dynamic>(
            options,
            &mut scope,
            &self.ast,
            entry_name,
            args.to_vec(),
        ) {
            Ok(value) => Ok(value),
            Err(err) => {
                if let EvalAltResult::ErrorFunctionNotFound(signature, _) = err.as_ref() {
                    if signature.split(' ').next() == Some(entry_name)
                        || signature.split('(').next() == Some(entry_name)
                    {
                        return Err(ScriptError::Script(format!(
                            "undefined function {entry_name}"
                        )));
                    }
                }
                Err(map_eval_error(err))
            }
        }
    }
}

/// Translate an evaluation failure into the crate's error model, recovering
/// binding errors that were thrown as [`ScriptError`] values.
fn map_eval_error(err: Box<EvalAltResult>) -> ScriptError {
    let message = err.to_string();
    match *err {
        EvalAltResult::ErrorTerminated(_, _) => {
            ScriptError::Script("script execution interrupted".into())
        }
        EvalAltResult::ErrorModuleNotFound(path, _) => ScriptError::ModuleNotFound(path),
        EvalAltResult::ErrorInModule(_, inner, _) => map_eval_error(inner),
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => map_eval_error(inner),
        EvalAltResult::ErrorRuntime(token, _) => token
            .try_cast::<ScriptError>()
            .unwrap_or(ScriptError::Script(message)),
        _ => ScriptError::Script(message),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("host binding panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("host binding panicked: {msg}")
    } else {
        "host binding panicked".to_string()
    }
}

/// Normalize a script's layout: line endings, indentation and blank-line
/// runs. The heavy lifting is done by the embedded `node/format.rhai`
/// module, run through the engine itself; the input is compiled first so a
/// malformed script fails loudly instead of being reformatted.
pub fn format_script(source: &str) -> Result<String, ScriptError> {
    rhai::Engine::new()
        .compile(source)
        .map_err(|e| ScriptError::Compile(e.to_string()))?;

    let formatter = resources::lookup("node/format.rhai")
        .ok_or_else(|| ScriptError::ModuleNotFound("node/format.rhai".into()))?;
    let formatter = std::str::from_utf8(formatter)
        .map_err(|e| ScriptError::ValueConversion(e.to_string()))?;

    let engine = ScriptEngine::new(formatter, "", EngineConfig::default())?;
    let value = engine.run(
        Duration::from_secs(5),
        "format",
        vec![Dynamic::from(source.to_string())],
    )?;
    Ok(value.to_string())
}
