// MCP transport
pub mod server;

pub use server::{run_stdio, McpServer};
