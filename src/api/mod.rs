// src/api/mod.rs

pub mod handlers;
pub mod middleware;    // Caller extraction
pub mod server;
pub mod server_config; // Server configuration constants
pub mod types;

pub use server::PortalServer;
