//! Upstream boundary: resolving and connecting to origin servers.

pub mod origin;
pub mod upstream;


// Re-export main types
pub use origin::TcpOrigin;
pub use upstream::{
    with_deadline, DeadlineError, Origin, OriginStream, UpstreamError, ORIGIN_PORT,
};
