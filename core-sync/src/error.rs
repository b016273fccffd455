use bridge_traits::error::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Unknown library source: {source_id}")]
    UnknownSource { source_id: String },

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Source error: {0}")]
    Source(#[from] BridgeError),

    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    #[error("Scan cancelled")]
    Cancelled,

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Scan queue is closed")]
    QueueClosed,
}

pub type Result<T> = std::result::Result<T, SyncError>;
