pub mod app;
mod deserializers;
pub mod routes;
pub mod session;
