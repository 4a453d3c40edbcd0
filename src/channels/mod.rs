//! Front-ends over the assistant: a terminal REPL and a JSON HTTP API.

pub mod cli;
pub mod http;

pub use cli::CliChannel;
pub use http::{HttpState, api_routes};
