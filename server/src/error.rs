//! Error types for the room server.

use std::net::SocketAddr;

use thiserror::Error;

/// A client sent something inconsistent.
///
/// Drawing is lossy-tolerant, so none of these end the connection or touch
/// other rooms: they are logged and the offending message is dropped.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("invalid stroke id {0:?}")]
    InvalidStrokeId(String),

    #[error("stroke {0} already exists in this room")]
    DuplicateStroke(String),

    #[error("message addressed to room {claimed} but session is in {current}")]
    RoomMismatch { claimed: String, current: String },

    #[error("no stroke {0} in this room")]
    UnknownStroke(String),

    #[error("stroke {0} ended without any points")]
    EmptyStroke(String),

    #[error("point for stroke {0} after it ended")]
    StrokeFinished(String),

    #[error("stroke {0} reached the point limit")]
    StrokeFull(String),

    #[error("non-finite point for stroke {0}")]
    NonFinitePoint(String),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid listen address {0}")]
    Address(String),

    #[error("server stopped: {0}")]
    Serve(#[from] std::io::Error),
}
