//! Client request line and proxy target parsing.

pub mod line;
pub mod target;


pub use line::{parse_get_target, parse_request_line, RequestLine, GET};
pub use target::{parse_target, OriginTarget};

/// Reasons a client request cannot be served.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed request line: {0}")]
    Malformed(#[from] httparse::Error),
    #[error("incomplete request line")]
    Incomplete,
    #[error("unsupported method {0}")]
    UnsupportedMethod(String),
    #[error("invalid target {target}: {reason}")]
    InvalidTarget { target: String, reason: String },
}
