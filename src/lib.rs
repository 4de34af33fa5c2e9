pub mod cli;
pub mod client;
pub mod config;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod presenter;
pub mod text_summary;
#[cfg(feature = "tui")]
mod tui;
pub mod uploads;
