use std::fmt;

/// Reasons a push into the hub can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushFailure {
    /// No socket with this id is registered on this hub. The socket may be
    /// held open by another process sharing the registry.
    UnknownConnection,
    /// The socket was registered but its writer has shut down.
    Closed,
    /// The socket's outbound queue is full; the payload was not enqueued.
    QueueFull,
}

impl PushFailure {
    /// Whether the target id can never be delivered to again. Only a socket
    /// this hub held and saw close qualifies.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for PushFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownConnection => write!(f, "connection is not registered"),
            Self::Closed => write!(f, "connection writer has closed"),
            Self::QueueFull => write!(f, "connection outbound queue is full"),
        }
    }
}

impl std::error::Error for PushFailure {}
