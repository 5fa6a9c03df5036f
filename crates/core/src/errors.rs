use thiserror::Error;

/// Failures crossing an external boundary, in the shape the HTTP surface
/// reports them. Frame-level relay errors never reach this type; they are
/// answered in-band on the stream.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("model invocation failed: {0}")]
    Model(String),
    #[error("voice gateway request failed: {0}")]
    Gateway(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Human-readable detail for HTTP error bodies.
    pub fn detail(&self) -> String {
        self.to_string()
    }
}
