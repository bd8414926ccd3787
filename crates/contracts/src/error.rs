//! Error taxonomy: configuration errors halt the run, hook errors are
//! contained per invocation.

use thiserror::Error;

/// Errors that halt a run and surface to the caller.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("malformed world manifest: {0}")]
    Manifest(String),
    #[error("no runnable modules resolved from the world manifest")]
    EmptyWorld,
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        SimError::Io(err.to_string())
    }
}

pub type SimResult<T> = Result<T, SimError>;

/// Failure raised inside a module hook (a disease `step`, an attribute
/// `update`, a watcher `react`, a transition `on_fire`, an eligibility
/// check). Logged by the simulator; never aborts the patient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{module}: {message}")]
pub struct HookError {
    pub module: String,
    pub message: String,
}

impl HookError {
    pub fn new(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            message: message.into(),
        }
    }
}

pub type HookResult<T> = Result<T, HookError>;
