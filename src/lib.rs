#[path = "shared/time/mod.rs"]
pub mod time;
#[cfg(test)]
mod tests;

pub mod app;
pub mod config;
pub mod controller;
pub mod db;
pub mod http;
pub mod shutdown;
pub mod upstream;
pub mod workers;
