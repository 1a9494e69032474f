pub mod system;
pub mod types;

use crate::cancel::CancelToken;
use std::time::Duration;
use thiserror::Error;

pub use system::SystemRunner;
pub use types::{ToolCommand, ToolOutput};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exceeded timeout ({timeout:?})")]
    TimedOut { program: String, timeout: Duration },
    #[error("{program} terminated by cancellation")]
    Cancelled { program: String },
}

/// Executes external tools. Implementations must stop the child and return
/// `RunError::Cancelled` once `cancel` trips.
pub trait Runner: Sync {
    fn run(&self, cmd: &ToolCommand, cancel: &CancelToken) -> Result<ToolOutput, RunError>;
}

impl<T: Runner + ?Sized> Runner for &T {
    fn run(&self, cmd: &ToolCommand, cancel: &CancelToken) -> Result<ToolOutput, RunError> {
        (**self).run(cmd, cancel)
    }
}
