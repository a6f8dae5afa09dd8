//! Wire protocol constants, error types and logging setup shared by the
//! runtime CLI, the shim binary and the proxy client.

pub mod constants;
pub mod errors;
pub mod logging;

pub use errors::{RuntimeError, RuntimeResult};
pub use logging::{LogFormat, LoggingGuard, init_logging};
