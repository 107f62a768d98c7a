//! MCP (Model Context Protocol) server for tooldex
//!
//! Exposes the pane hub to a controlling agent as MCP tools over stdio.

mod error;
mod handlers;
mod protocol;
mod server;
mod tools;

pub use error::McpError;
pub use server::McpServer;
