// Library module for passfail
// Re-exports modules for use by the CLI, integration tests and external shells

pub mod config;
pub mod hash;
pub mod logging;
