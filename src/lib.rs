pub mod api;
pub mod client_gate;
pub mod config;
pub mod error;
pub mod guard;
pub mod identity;
pub mod policy;
pub mod qr;
pub mod server;

