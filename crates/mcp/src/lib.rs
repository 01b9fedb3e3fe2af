//! MCP dispatch layer: a JSON-RPC 2.0 server on stdio that exposes a
//! [`davgate_tools::ToolRegistry`].

pub mod error;
pub mod server;
pub mod types;

pub use {
    error::{Error, Result},
    server::McpServer,
    types::PROTOCOL_VERSION,
};
