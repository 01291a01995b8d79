//! Error types for Context operations.

use thiserror::Error;

/// Errors that can occur while reading, mutating or (de)serializing a Context.
#[derive(Error, Debug)]
pub enum ContextError {
    /// A typed read asked for a different type than the one stored.
    #[error("Context type mismatch: {requested} was requested, {stored} is stored")]
    TypeMismatch {
        requested: &'static str,
        stored: &'static str,
    },

    /// Strict key lookup on a node that has no such child.
    #[error("no item: {0}")]
    MissingKey(String),

    /// Strict index lookup outside of the array bounds.
    #[error("no index: {0}")]
    IndexOutOfRange(i64),

    /// The operation is not applicable to the node's current variant.
    #[error("{0}")]
    InvalidOperation(String),

    /// No step of the coercion ladder matched, or the value does not fit.
    #[error("bad conversion: {0}")]
    BadConversion(String),

    /// Buffer or string allocation failed.
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// The input was not valid JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Strict serialization met a scalar with no JSON form.
    #[error("not serializable: {0}")]
    NotSerializable(&'static str),

    /// The C ABI was called with arguments that violate its contract.
    #[error("ABI misuse: {0}")]
    AbiMisuse(String),

    /// A processing block could not be created or failed while processing.
    #[error("processing block error: {0}")]
    Block(String),
}

impl ContextError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// Stable numeric code of the error kind.
    pub fn code(&self) -> u32 {
        match self {
            Self::TypeMismatch { .. } => 1,
            Self::MissingKey(_) => 2,
            Self::IndexOutOfRange(_) => 3,
            Self::InvalidOperation(_) => 4,
            Self::BadConversion(_) => 5,
            Self::Allocation(_) => 6,
            Self::Parse(_) => 7,
            Self::NotSerializable(_) => 8,
            Self::AbiMisuse(_) => 9,
            Self::Block(_) => 10,
        }
    }
}

/// Convenience alias used throughout context-core.
pub type Result<T> = std::result::Result<T, ContextError>;
