/// Errors that can occur in connection operations.
#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] wispwire_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] wispwire_frame::FrameError),

    /// The link failed underneath a running connection.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The connection was stopped by the application.
    #[error("connection stopped")]
    Stopped,

    /// A queue or connection setting is out of range.
    #[error("invalid connection configuration: {0}")]
    InvalidConfig(String),

    /// No frame arrived in time.
    #[error("receive timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A pump thread could not be started.
    #[error("failed to spawn {name} pump: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },

    /// A pump thread panicked.
    #[error("{0} pump panicked")]
    PumpPanicked(&'static str),
}

pub type Result<T> = std::result::Result<T, ConnError>;
