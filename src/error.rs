//! Error types.
//!
//! Library code returns the typed errors below (derived with `thiserror`).
//! The binary boundary folds all of them into [`AppError`], which only carries
//! a message and a process exit code.

use thiserror::Error;

use crate::math::expr::ExprError;

/// Top-level error surfaced by the `cfit` binary.
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

/// Errors raised by the model library.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Combining two components would produce duplicate parameter names.
    #[error("parameter name collision: '{name}' is already defined in the composite model")]
    NameCollision { name: String },

    /// Every component in a composite needs its own prefix.
    #[error("prefix '{prefix}' is already used in the composite model")]
    DuplicatePrefix { prefix: String },

    #[error("parameter '{name}' is missing from the parameter set")]
    MissingParameter { name: String },
}

/// Errors raised by an optimizer run.
#[derive(Debug, Clone, Error)]
pub enum OptimizerError {
    #[error("no parameters are allowed to vary")]
    NoVaryingParameters,

    #[error("too few data points ({ndata}) for {nvarys} varying parameters")]
    TooFewPoints { ndata: usize, nvarys: usize },

    #[error("parameter '{name}' has invalid bounds (min must be below max)")]
    InvalidBounds { name: String },

    #[error("model produced non-finite residuals at the initial parameter values")]
    NonFinite,

    #[error("fit was cancelled")]
    Cancelled,

    #[error("fit exceeded its time limit")]
    TimedOut,

    #[error("numerical failure: {0}")]
    Numerical(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Expression(#[from] ExprError),
}

/// Errors raised by session operations.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("no completed fit; run a fit first")]
    NotFitted,

    #[error("no free prefix for '{base}' after {probes} probes")]
    PrefixExhausted { base: String, probes: usize },

    #[error("fit failed: {0}")]
    Optimizer(#[from] OptimizerError),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("a fit is already running")]
    FitInProgress,

    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("unknown model '{0}'")]
    UnknownModel(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Expression(#[from] ExprError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl SessionError {
    fn exit_code(&self) -> u8 {
        match self {
            SessionError::InvalidData(_)
            | SessionError::UnknownModel(_)
            | SessionError::UnknownParameter(_)
            | SessionError::Expression(_) => 2,
            SessionError::Optimizer(_) | SessionError::Model(_) => 4,
            _ => 3,
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}
