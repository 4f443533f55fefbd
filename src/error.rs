//! Error handling: configuration errors are ordinary `Result`s; invariant
//! violations `panic!` and are converted into `AnalysisError::Internal` at
//! the top-level `catch_unwind` boundary in `lib.rs`; soundness warnings
//! are logged and never become an `Err`.

use std::fmt;

#[derive(Debug)]
pub enum AnalysisError {
    /// Missing entry packages, empty entry list, or any other malformed
    /// configuration — never a panic.
    Config(String),
    /// A solver bug surfaced as a panic and caught at the top-level
    /// boundary; no partial result is available.
    Internal(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::Config(msg) => write!(f, "configuration error: {}", msg),
            AnalysisError::Internal(_) => write!(f, "internal error in pointer analysis"),
        }
    }
}

impl std::error::Error for AnalysisError {}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Runs `f` under `catch_unwind`, converting any panic into
/// `AnalysisError::Internal` and logging the panic message at `error`
/// before doing so.
pub fn catch_fatal<T>(f: impl FnOnce() -> Result<T> + std::panic::UnwindSafe) -> Result<T> {
    match std::panic::catch_unwind(f) {
        Ok(result) => result,
        Err(payload) => {
            let msg = panic_message(&payload);
            log::error!("internal error in pointer analysis: {}", msg);
            Err(AnalysisError::Internal(msg))
        }
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
