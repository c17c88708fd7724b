//! # Error Types

/// Errors from textvae operations.
#[derive(Debug, thiserror::Error)]
pub enum TextVaeError {
    /// A hyperparameter has an invalid value or range.
    ///
    /// Detected eagerly, before any computation.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The training or inference data is unusable.
    ///
    /// Empty corpora, mismatched input/target lengths, and unusable
    /// validation splits land here.
    #[error("data error: {0}")]
    Data(String),

    /// An inference call was made before a successful fit.
    #[error("the estimator is not fitted")]
    NotFitted,

    /// Persisted state is malformed.
    #[error("state error: {0}")]
    State(String),

    /// Error from the numeric backend.
    #[error(transparent)]
    Tensor(#[from] candle_core::Error),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Parse error (embedding text formats, numbers, etc.)
    #[error("parse error: {0}")]
    Parse(String),
}

impl TextVaeError {
    /// Build a [`TextVaeError::Configuration`].
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    /// Build a [`TextVaeError::Data`].
    pub fn data<S: Into<String>>(message: S) -> Self {
        Self::Data(message.into())
    }

    /// Build a [`TextVaeError::State`].
    pub fn state<S: Into<String>>(message: S) -> Self {
        Self::State(message.into())
    }
}

impl From<serde_json::Error> for TextVaeError {
    fn from(err: serde_json::Error) -> Self {
        Self::State(err.to_string())
    }
}

/// Result type for textvae operations.
pub type TVResult<T> = core::result::Result<T, TextVaeError>;
