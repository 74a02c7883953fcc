//! Command-line interface.

mod commands;
mod helpers;

pub use commands::{is_verbose, run, Cli};
pub use helpers::{normalize_url, output_file_name};
