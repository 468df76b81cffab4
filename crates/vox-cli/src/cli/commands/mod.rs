//! CLI command handlers, one file per command.

mod config;
mod request;
mod schedule;

pub use config::run_config;
pub use request::run_request;
pub use schedule::run_schedule;
