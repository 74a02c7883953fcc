//! Shared utility functions.
//!
//! - `format`: human-readable sizes and URL shortening for logs
//! - `html`: entity decoding and escaping for attribute values
//! - `mime`: MIME type resolution for `data:` URIs

mod format;
mod html;
mod mime;

pub use format::{format_count, format_size, url_tail};
pub use html::{decode_entities, escape_attr};
pub use mime::{data_uri, resolve_mime};
