//! CLI command modules.

pub mod http;
pub mod search;
pub mod status;
