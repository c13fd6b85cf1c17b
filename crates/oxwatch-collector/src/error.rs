/// Errors raised while building or reading a value source.
///
/// # Examples
///
/// ```rust
/// use oxwatch_collector::error::SourceError;
///
/// let err = SourceError::UnknownCounter("hw.nothing".to_string());
/// assert!(err.to_string().contains("hw.nothing"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The counter name matches neither a known counter nor a kernel file.
    #[error("Source: unknown counter '{0}'")]
    UnknownCounter(String),

    /// The counter exists but could not be read.
    #[error("Source: failed to read counter '{name}': {reason}")]
    Counter { name: String, reason: String },

    /// The shell could not be spawned for a command source.
    #[error("Source: failed to run command '{command}': {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The variable specification does not describe a usable source.
    #[error("Source: invalid variable spec: {0}")]
    InvalidSpec(String),
}

/// Convenience `Result` alias for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
