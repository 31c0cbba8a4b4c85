use thiserror::Error;

/// Error type for population encode/decode operations.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("no codec registered for mutation payload tag {0}")]
    UnregisteredCodec(u8),
    #[error("unexpected end of stream: needed {needed} more bytes, {remaining} available")]
    Truncated { needed: usize, remaining: usize },
    #[error("malformed record: {0}")]
    Malformed(String),
}
