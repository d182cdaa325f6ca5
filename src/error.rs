//! Error types.
//!
//! Library code returns [`FitError`]. The binary converts those into [`AppError`],
//! which carries the process exit code.

use thiserror::Error;

/// Errors raised by the fitting engine.
///
/// Only `Configuration`, `InvalidInput` and `Pool` ever escape a batch run.
/// The per-spectrum kinds (`Convergence`, `WorkerCrash`, `Timeout`) are caught
/// inside the worker and recorded on the failed `FitResult` as a message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// The fit configuration cannot produce a model.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The spectral series violates its shape invariants.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The optimizer did not reach a usable solution.
    #[error("fit did not converge: {0}")]
    Convergence(String),

    /// The worker panicked while fitting.
    #[error("worker crashed: {0}")]
    WorkerCrash(String),

    /// The per-task deadline elapsed before the optimizer finished.
    #[error("fit timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u128 },

    /// The worker pool could not be created.
    #[error("worker pool error: {0}")]
    Pool(String),
}

impl FitError {
    /// Process exit code used when this error reaches the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            FitError::Configuration(_) | FitError::InvalidInput(_) => 2,
            _ => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_map_to_usage_exit_code() {
        let app: AppError = FitError::Configuration("no peaks".into()).into();
        assert_eq!(app.exit_code(), 2);
        assert!(app.to_string().contains("no peaks"));

        let app: AppError = FitError::Pool("boom".into()).into();
        assert_eq!(app.exit_code(), 4);
    }
}
