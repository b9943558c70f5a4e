//! computer-use-mcp: desktop control for AI clients over MCP
//!
//! The server exposes screenshot, mouse, keyboard and shell tools. Every
//! call goes through the same pipeline:
//!
//! 1. [`model::Request`] decoding
//! 2. tool resolution in the [`registry::ToolRegistry`]
//! 3. argument validation against the tool's schema
//! 4. handler execution under a timeout ([`dispatch::Dispatcher`]), with
//!    start/end entries from the [`logger::ExecutionLogger`]
//! 5. a [`model::Response`] correlated by request id
//!
//! Tools reach the operating system only through the capability traits in
//! [`providers`], so the whole pipeline runs against
//! [`providers::MockDesktop`] in tests. Screenshots are resampled and encoded
//! by [`normalize`].
//!
//! Two transports sit on top of the dispatcher: the MCP service in
//! [`server`] and the line-delimited JSON protocol in [`wire`].

pub mod config;
pub mod dispatch;
pub mod error;
pub mod logger;
pub mod model;
pub mod normalize;
pub mod providers;
pub mod registry;
pub mod server;
pub mod tools;
pub mod wire;

pub use config::{BackendKind, ServerConfig};
pub use dispatch::Dispatcher;
pub use error::{ErrorKind, ToolError};
pub use server::ComputerUseServer;
