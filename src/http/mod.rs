// HTTP module: the minimal subset of HTTP the proxy understands.

pub mod request;

// Re-export parsing entry points
pub use request::{parse_get_target, parse_target, OriginTarget, ParseError};
