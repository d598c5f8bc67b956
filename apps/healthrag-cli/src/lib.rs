//! Wiring shared by the healthrag binaries: logging setup, component
//! construction from configuration, and the HTTP API.

pub mod api;
pub mod bootstrap;
pub mod telemetry;
