use thiserror::Error;

/// Errors raised at the model's parameter boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A parameter that must be strictly positive (or finite) was not.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    /// A bounded parameter fell outside its closed range.
    #[error("Parameter out of range: {name} = {value} (expected {min}..={max})")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Result type using ModelError
pub type Result<T> = std::result::Result<T, ModelError>;
