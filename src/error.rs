//! Error types.
//!
//! Two layers:
//!
//! - [`EstimateError`]: the library taxonomy raised by the estimator and the
//!   analysis pipeline (pure, in-memory computation).
//! - [`AppError`]: what the `gasdemand` binary reports, carrying a process exit
//!   code alongside a human-readable message.

/// Minimum number of usable rows for a regression.
pub const MIN_REGRESSION_ROWS: usize = 10;

/// Failures of the estimator and the analysis pipeline.
///
/// All variants are terminal for the call that raised them. The caller decides
/// whether to retry with a different configuration (e.g. without the tax rate).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EstimateError {
    /// A value required for log transformation is non-positive or missing, a
    /// required column is absent, or periods are out of order.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Fewer usable rows than a stable regression needs.
    #[error("insufficient data: {found} usable rows (need at least {needed}) {range}")]
    InsufficientData {
        needed: usize,
        found: usize,
        /// Human-readable description of the period range that was available.
        range: String,
    },

    /// The design matrix is not of full column rank.
    #[error("singular design matrix: {0}")]
    SingularDesign(String),
}

impl EstimateError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Exit code used when this error terminates the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            EstimateError::InvalidInput(_) => 2,
            EstimateError::InsufficientData { .. } => 3,
            EstimateError::SingularDesign(_) => 4,
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

impl From<EstimateError> for AppError {
    fn from(err: EstimateError) -> Self {
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
