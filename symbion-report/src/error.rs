use thiserror::Error;

/// A producer broke the topology encoding contract.
///
/// Not a recoverable input error: whoever receives one must abort the current
/// operation and propagate it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("malformed adjacency id: {0:?}")]
    MalformedAdjacencyId(String),
    #[error("malformed edge id: {0:?}")]
    MalformedEdgeId(String),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("msgpack encode: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("msgpack decode: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported wire version {0}")]
    UnsupportedVersion(u8),
    #[error("empty payload")]
    Empty,
    #[error("frame of {0} bytes exceeds limit")]
    FrameTooLarge(usize),
}
