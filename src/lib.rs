//! aerorelay - A strict, self-hostable event relay for coding-agent workspaces
//!
//! One upstream event feed, many downstream SSE clients, each with its own
//! directory subscription set.

pub mod cli;
pub mod http_server;
pub mod observability;
pub mod relay;
pub mod settings;
