//! Command-line front-end for the relay: configuration discovery, message
//! loading and summary output.

pub mod config;
pub mod input;
pub mod report;

pub use config::{CONFIG_ENV, DEFAULT_CONFIG_FILE, find_config_file, load_config};
pub use input::load_message;
pub use report::{OutputFormat, print, render};
