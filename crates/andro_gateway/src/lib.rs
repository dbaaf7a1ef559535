//! # Andro gateway
//!
//! The remote relay: a WebSocket hub that pairs one creature with any number
//! of dashboards under a shared id, plus the client the creature runtime uses
//! to join it.

pub mod client;
pub mod routing;
pub mod server;

pub use client::RelayClient;
pub use routing::{route, RelayError, Route};
pub use server::RelayServer;
