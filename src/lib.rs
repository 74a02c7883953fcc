//! pagepack - render a web page and pack it into one self-contained HTML file.
//!
//! The page is loaded in headless Chrome (or fetched as-is with
//! [`pipeline::StaticSource`]), scrolled to trigger lazy content, and its
//! stylesheets, scripts, fonts and optionally images are downloaded and
//! re-embedded in place of the original references.

pub mod assemble;
pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod resources;
pub mod utils;

pub use config::{Config, Settings};
pub use error::{FetchError, PackError};
pub use fetch::ResourceFetcher;
pub use pipeline::{run, BrowserSource, PackOptions, PackResult, PageSource, StaticSource};
