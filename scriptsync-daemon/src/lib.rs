//! Watch service: pushes script files to their site as they change.

mod error;
pub mod paths;
mod runtime;

pub use error::DaemonError;
pub use paths::WatchTarget;
pub use runtime::{init_tracing, run, start_blocking};
