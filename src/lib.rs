pub mod api;
pub mod command_executor;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod response;
pub mod services;
pub mod types;
