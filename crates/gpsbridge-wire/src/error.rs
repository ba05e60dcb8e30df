/// Errors that can occur while packing, unpacking or moving frames.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// A pack operation would write past the payload capacity.
    #[error("payload overflow (need {need} bytes, {remaining} remaining)")]
    Overflow { need: usize, remaining: usize },

    /// An unpack operation would read past the payload capacity.
    #[error("payload underrun (need {need} bytes, {remaining} remaining)")]
    Underrun { need: usize, remaining: usize },

    /// A string field was not terminated within the payload.
    #[error("unterminated string in payload")]
    UnterminatedString,

    /// A string field was not valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    /// A field carried a value outside its defined range.
    ///
    /// Both ends must agree on every field's encoding; this surfaces schema
    /// skew as an error instead of a silent misread.
    #[error("invalid value {value} for {field}")]
    InvalidField { field: &'static str, value: i64 },

    /// An operation code outside the known set.
    #[error("unknown operation code {0:#x}")]
    UnknownCode(u32),

    /// The connection closed in the middle of a frame.
    #[error("connection closed mid-frame ({got} of {need} bytes)")]
    Truncated { got: usize, need: usize },

    /// The connection was closed on a frame boundary.
    #[error("connection closed")]
    ConnectionClosed,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WireError>;
