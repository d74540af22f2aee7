use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame truncated")]
    Truncated,
    #[error("malformed varint")]
    MalformedVarint,
    #[error("unsupported wire type {0}")]
    UnsupportedWireType(u64),
    #[error("unknown frame kind byte {0}")]
    UnknownKind(u8),
    #[error("method field missing from envelope")]
    MissingMethod,
    #[error("method name has unexpected shape: {0}")]
    MalformedMethod(String),
    #[error("no descriptor registered for method {0}")]
    UnknownMethod(String),
    #[error("cannot build frame: {0}")]
    BuildFailure(String),
}
