// Application wiring: front end, work queue, worker pool and cache.

#[allow(clippy::module_inception)]
pub mod app;
pub mod server;

pub use app::App;
pub use server::FrontEnd;
