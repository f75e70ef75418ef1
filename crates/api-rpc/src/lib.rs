//! JSON-RPC API Layer
//!
//! Administrative JSON-RPC 2.0 server for Hookline: test webhooks and
//! delivery statistics.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};
