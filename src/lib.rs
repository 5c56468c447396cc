// Public API for integration tests and potential library usage

pub mod abuse;
pub mod api;
pub mod config;
pub mod error;
pub mod filter;
pub mod protocol;
pub mod state;
pub mod transport;
pub mod types;
pub mod ws;
