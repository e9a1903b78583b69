/// Errors that can occur while decoding JSON values or persisting them.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The input ended before the value was complete.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEnd { offset: usize },

    /// A byte that cannot start or continue the expected token.
    #[error("unexpected byte {found:#04x} at offset {offset} (expected {expected})")]
    UnexpectedByte {
        offset: usize,
        found: u8,
        expected: &'static str,
    },

    /// A number token is malformed or does not fit the target type.
    #[error("invalid number at offset {offset}")]
    InvalidNumber { offset: usize },

    /// A string contains a malformed escape sequence.
    #[error("invalid string escape at offset {offset}")]
    InvalidEscape { offset: usize },

    /// Something other than whitespace follows a complete value.
    #[error("trailing data after value at offset {offset}")]
    TrailingData { offset: usize },

    /// Arrays or objects are nested deeper than the parser allows.
    #[error("value nested deeper than {max} levels at offset {offset}")]
    NestingTooDeep { offset: usize, max: usize },

    /// An I/O error occurred while reading or writing a persisted value.
    #[error("value I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;
