//! Domain error types.

/// Top-level error type for stockscope.
#[derive(Debug, thiserror::Error)]
pub enum StockscopeError {
    #[error("insufficient data for {metric}: have {have} observations, need {need}")]
    InsufficientData {
        metric: String,
        have: usize,
        need: usize,
    },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error(
        "solver did not converge after {iterations} iterations \
         (last estimate {last_estimate}, residual {residual})"
    )]
    Convergence {
        iterations: usize,
        last_estimate: f64,
        residual: f64,
    },

    #[error("price series {code} is empty")]
    EmptySeries { code: String },

    #[error("price series {code} has non-increasing dates at bar {index}")]
    NonMonotonicDates { code: String, index: usize },

    #[error("price series {code} has an invalid bar at {index}: {reason}")]
    InvalidBar {
        code: String,
        index: usize,
        reason: String,
    },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StockscopeError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        StockscopeError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn insufficient(metric: &str, have: usize, need: usize) -> Self {
        StockscopeError::InsufficientData {
            metric: metric.to_string(),
            have,
            need,
        }
    }
}

impl From<&StockscopeError> for std::process::ExitCode {
    fn from(err: &StockscopeError) -> Self {
        let code: u8 = match err {
            StockscopeError::Io(_) => 1,
            StockscopeError::ConfigParse { .. }
            | StockscopeError::ConfigMissing { .. }
            | StockscopeError::ConfigInvalid { .. } => 2,
            StockscopeError::Data { .. } => 3,
            StockscopeError::InvalidParameter { .. }
            | StockscopeError::EmptySeries { .. }
            | StockscopeError::NonMonotonicDates { .. }
            | StockscopeError::InvalidBar { .. } => 4,
            StockscopeError::InsufficientData { .. } | StockscopeError::Convergence { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
