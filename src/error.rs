use std::path::PathBuf;
use thiserror::Error;

/// Failures the preprocessing core distinguishes.
///
/// Engine errors are fatal and stop the run before any page is touched.
/// `FilterToolFailed` is only ever logged; the page degrades to its input.
#[derive(Debug, Error)]
pub enum PrepError {
    #[error(
        "could not execute {binary}: {reason}\nPlease make sure you have Tesseract installed correctly"
    )]
    EngineNotInvocable { binary: String, reason: String },

    #[error("Tesseract version is too old: found {found}, need at least {required}")]
    EngineTooOld { found: String, required: String },

    #[error("filter tool failed for {}: {reason}", .input.display())]
    FilterToolFailed { input: PathBuf, reason: String },

    #[error("batch cancelled")]
    BatchCancelled,
}

impl PrepError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PrepError::BatchCancelled)
    }
}
