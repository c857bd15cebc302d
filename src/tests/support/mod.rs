// Shared test support code for unit and integration tests.

pub mod cache;
pub mod common;
pub mod origin;
pub mod upstream;

pub use cache::ProxyServer;
pub use common::*;
pub use origin::FakeOrigin;
pub use upstream::UpstreamServer;
