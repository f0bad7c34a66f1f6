use std::time::Duration;

use thiserror::Error;

/// Errors emitted or surfaced by the scripting runtime.
///
/// The enum is `Clone` so binding failures can travel through the script
/// runtime as thrown values and be caught by script code; whatever is left
/// uncaught is recovered intact at the run boundary.
#[derive(Error, Debug, Clone)]
pub enum ScriptError {
    #[error("compile error: {0}")]
    Compile(String),
    #[error("module not found: {0}")]
    ModuleNotFound(String),
    #[error("script execution timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Script(String),
    #[error("transaction misuse: {0}")]
    TransactionMisuse(String),
    #[error("value conversion error: {0}")]
    ValueConversion(String),
    #[error("response body already consumed")]
    ResponseConsumed,
    #[error("http error: {0}")]
    Http(String),
    #[error("sql error: {0}")]
    Sql(String),
}

impl ScriptError {
    /// True when this error is the wall-clock supervisor tripping.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ScriptError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_human_readable() {
        let err = ScriptError::Compile("unexpected token".into());
        assert_eq!(err.to_string(), "compile error: unexpected token");

        let err = ScriptError::Timeout(Duration::from_secs(1));
        assert!(err.to_string().contains("1s"));
        assert!(err.is_timeout());

        let err = ScriptError::TransactionMisuse("commit without begin".into());
        assert!(err.to_string().contains("commit without begin"));
    }
}
