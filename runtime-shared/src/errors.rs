//! Shared error type returned by every process (runtime, shim, cli).
//!
//! Grounded on the teacher's `BoxliteError` enum, expanded with the error
//! kinds spec.md §7 names so every subcommand can map a failure to a single
//! exit code and a single logged critical message.

use std::path::PathBuf;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("configuration invalid: {0}")]
    ConfigInvalid(String),

    #[error("container already exists: {0}")]
    AlreadyExists(String),

    #[error("container not found: {0}")]
    NotFound(String),

    #[error("state missing or unreadable for {id}: {reason}")]
    StateMissing { id: String, reason: String },

    #[error("invalid state transition: {0}")]
    InvalidState(String),

    #[error("proxy rpc failed: {0}")]
    ProxyRpc(String),

    #[error("shim setup failed: {0}")]
    ShimSetup(String),

    #[error("hook failed: {0}")]
    HookFailed(String),

    #[error("unmount failed: {0}")]
    Unmount(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Exit code this error should cause the process to return.
    ///
    /// Every kind maps to a generic failure (1) except the ones §7 calls
    /// out as "not found" style conditions, which runc-style tooling
    /// conventionally reports as 1 as well — there is no differentiated
    /// exit-code table in spec.md beyond "0 success, non-zero failure".
    pub fn exit_code(&self) -> i32 {
        1
    }
}
