// Connection controllers.

pub mod cache;


// Re-export controller types for convenience
pub use cache::{CacheProxyController, ClientStream, Outcome, ProxyError, BUFFER_SIZE};
