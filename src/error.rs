//! Defines the terminal error of an invocation, annotated with the
//! pipeline stage that produced it.

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// The first error raised while handling a trigger. Every stage fails
/// fast, so there is never more than one.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The trigger payload couldn't be decoded
    #[error("Failed to decode trigger payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// An image couldn't be read from object storage
    #[error("Fetch stage failed: {0:#}")]
    Fetch(anyhow::Error),

    /// The vision service failed or returned something unusable
    #[error("Vision stage failed: {0:#}")]
    Vision(anyhow::Error),

    /// A summary couldn't be serialized or sent to the queue
    #[error("Publish stage failed: {0:#}")]
    Publish(anyhow::Error),

    /// Settings or service endpoints are unusable
    #[error("Configuration error: {0:#}")]
    Config(anyhow::Error),
}

impl Error {
    /// The name of the stage that failed, for logging.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Decode(_) => "decode",
            Error::Fetch(_) => "fetch",
            Error::Vision(_) => "vision",
            Error::Publish(_) => "publish",
            Error::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn test_display_includes_context_chain() {
        let inner: anyhow::Result<()> = Err(anyhow!("NoSuchKey"));
        let err = Error::Fetch(
            inner
                .context("Failed to download object \"a.jpg\" from bucket \"b\"")
                .unwrap_err(),
        );
        let message = err.to_string();
        assert!(message.starts_with("Fetch stage failed"));
        assert!(message.contains("a.jpg"));
        assert!(message.contains("NoSuchKey"));
        assert_eq!(err.stage(), "fetch");
    }
}
