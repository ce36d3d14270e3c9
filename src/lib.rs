pub mod cache;
pub mod cleanup;
pub mod common;
pub mod config;
pub mod models;
pub mod password;
pub mod server;
pub mod store;
pub mod telemetry;
