//! # Module Resolver
//!
//! Resolves `import` targets against the filesystem search path first, then
//! the embedded resource map. Results are cached per engine: the bytes of a
//! logical name are looked up at most once, and repeated imports of the same
//! name share one compiled module.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rhai::{Engine, EvalAltResult, Module, ModuleResolver, Position, Scope, Shared};
use tracing::debug;

use crate::resources;

/// File extension tried when a logical name has none.
const MODULE_EXTENSION: &str = "rhai";

pub struct ScriptModuleResolver {
    search_paths: Vec<PathBuf>,
    bytes_cache: Mutex<HashMap<String, Option<Arc<[u8]>>>>,
    module_cache: Mutex<HashMap<String, Shared<Module>>>,
    lookups: AtomicUsize,
}

impl ScriptModuleResolver {
    /// Build a resolver over an ordered list of search directories. An empty
    /// search path skips the filesystem tier entirely.
    pub fn new(module_search_path: &str) -> Self {
        let search_paths = if module_search_path.is_empty() {
            Vec::new()
        } else {
            vec![PathBuf::from(module_search_path)]
        };
        Self {
            search_paths,
            bytes_cache: Mutex::new(HashMap::new()),
            module_cache: Mutex::new(HashMap::new()),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Resolve a logical name to module source bytes, consulting the cache
    /// first. `None` is cached too, so a missing module is searched once.
    pub fn resolve_bytes(&self, path: &str) -> Option<Arc<[u8]>> {
        let mut cache = self.bytes_cache.lock().unwrap();
        if let Some(hit) = cache.get(path) {
            return hit.clone();
        }
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let resolved = self.lookup(path);
        cache.insert(path.to_string(), resolved.clone());
        resolved
    }

    fn lookup(&self, path: &str) -> Option<Arc<[u8]>> {
        for dir in &self.search_paths {
            for candidate in candidates(dir.join(path)) {
                if let Ok(bytes) = std::fs::read(&candidate) {
                    debug!("load script module as file: {}", candidate.display());
                    return Some(bytes.into());
                }
            }
        }

        let key = embedded_key(path);
        for candidate in [key.clone(), format!("{key}.{MODULE_EXTENSION}")] {
            if let Some(bytes) = resources::lookup(&candidate) {
                debug!("load script module as embedded resource: {path} -> {candidate}");
                return Some(bytes.into());
            }
        }
        None
    }

    /// Number of uncached byte lookups performed so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

/// Filesystem candidates for a logical name: verbatim, then with the module
/// extension appended (unless one is already present).
fn candidates(base: PathBuf) -> Vec<PathBuf> {
    if base.extension().is_some() {
        vec![base]
    } else {
        let with_ext = base.with_extension(MODULE_EXTENSION);
        vec![base, with_ext]
    }
}

/// Compute the embedded-resource key of a logical path: truncate at a
/// `node_modules` segment when present, normalize separators to `/` and
/// prefix `node/`.
fn embedded_key(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let tail = match normalized.find("node_modules") {
        Some(at) => &normalized[at..],
        None => normalized.as_str(),
    };
    format!("node/{tail}")
}

impl ModuleResolver for ScriptModuleResolver {
    fn resolve(
        &self,
        engine: &Engine,
        _source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> Result<Shared<Module>, Box<EvalAltResult>> {
        if let Some(module) = self.module_cache.lock().unwrap().get(path) {
            return Ok(module.clone());
        }

        let bytes = self
            .resolve_bytes(path)
            .ok_or_else(|| EvalAltResult::ErrorModuleNotFound(path.to_string(), pos))?;
        let source = std::str::from_utf8(&bytes).map_err(|e| {
            Box::new(EvalAltResult::ErrorInModule(
                path.to_string(),
                Box::new(EvalAltResult::ErrorRuntime(
                    format!("module is not valid utf-8: {e}").into(),
                    pos,
                )),
                pos,
            ))
        })?;

        let ast = engine.compile(source).map_err(|e| {
            let parse_error: EvalAltResult = e.into();
            Box::new(EvalAltResult::ErrorInModule(
                path.to_string(),
                Box::new(parse_error),
                pos,
            ))
        })?;
        let module = Module::eval_ast_as_new(Scope::new(), &ast, engine).map_err(|e| {
            Box::new(EvalAltResult::ErrorInModule(path.to_string(), e, pos))
        })?;

        let module: Shared<Module> = Shared::new(module);
        self.module_cache
            .lock()
            .unwrap()
            .insert(path.to_string(), module.clone());
        Ok(module)
    }
}
