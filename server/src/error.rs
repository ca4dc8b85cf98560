use thiserror::Error;

/// Failures scoped to a single session. None of these may affect other
/// sessions or the tick loop.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The registry was full at connect time; the connection is closed
    /// without ever receiving a player id.
    #[error("server full: {max} players already connected")]
    Capacity { max: usize },

    /// Socket-level failure; terminal for this connection only.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
}
