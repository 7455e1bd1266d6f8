//! Error kinds for every phase of the toolchain, per the error handling
//! design: the parser and schema validator fail eagerly, the encoder
//! records its first error and keeps returning it, and the decoder
//! returns `None`/`DecodeCorrupt` rather than panicking.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("parse error at {line}:{col}: {message}")]
    ParseError {
        line: usize,
        col: usize,
        message: String,
    },

    #[error("invalid schema: {reason}")]
    SchemaInvalid { reason: String },

    #[error("encoder misuse: expected {expected}, got {actual}")]
    EncoderMisuse { expected: String, actual: String },

    #[error("out of memory")]
    OutOfMemory,

    #[error("scalar vector length would exceed u64")]
    VectorOverflow,

    #[error("buffer grew past the representable offset range")]
    OffsetOverflow,

    #[error("corrupt buffer: {reason}")]
    DecodeCorrupt { reason: String },

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("bad argument: {message}")]
    BadArgument { message: String },
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Build an `Error::SchemaInvalid` with a formatted reason, in the
/// teacher's `error!`-macro style.
macro_rules! schema_invalid {
    ($($e:tt)*) => {
        $crate::error::Error::SchemaInvalid { reason: format!($($e)*) }
    };
}

/// Bail out of the current function with a `SchemaInvalid` error if
/// `$c` doesn't hold.
macro_rules! ensure_schema {
    ($c:expr, $($e:tt)*) => {
        if !$c {
            return Err($crate::error::schema_invalid!($($e)*));
        }
    };
}

pub(crate) use ensure_schema;
pub(crate) use schema_invalid;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_name_the_phase() {
        let e = Error::EncoderMisuse {
            expected: "InTable(Root)".into(),
            actual: "InVector(Scalar)".into(),
        };
        assert!(e.to_string().contains("encoder misuse"));
    }
}
