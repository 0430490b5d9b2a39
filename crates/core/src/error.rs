/// Result alias that carries the custom [`DashboardError`] type.
pub type Result<T> = std::result::Result<T, DashboardError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// A cache lookup or deletion referenced an id that was never created.
    #[error("no resource registered under `{0}`")]
    NotFound(String),
    /// Cubic interpolation was asked to sample an empty history buffer.
    #[error("interpolation requires at least one history sample")]
    EmptyHistory,
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Free-form message, mostly used for poisoned shared state.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON in a config file or feed payload.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Network failure while fetching a feed.
    #[error("{0}")]
    Http(#[from] reqwest::Error),
}

impl DashboardError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for DashboardError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for DashboardError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
