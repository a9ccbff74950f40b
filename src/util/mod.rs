//! Utility functions for the command line front end.
//!
//! - **URL validation**: only http(s) feed URLs are fetched
//! - **Terminal output**: feed text is stripped of escape sequences before printing

mod feed_url;
mod terminal;

pub use feed_url::{validate_feed_url, UrlValidationError};
pub use terminal::strip_control_chars;
