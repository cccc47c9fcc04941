pub mod apis;
pub mod arguments;
pub mod config;
pub mod errors;
pub mod governor;
pub mod logger;
pub mod monitor;
pub mod paths;
pub mod tokens;
#[cfg(feature = "web")]
pub mod web;
