//! Streaming RSS and Atom feed parsing.
//!
//! [`feed`] holds the parser and the `Feed`/`Item` model. [`fetch`],
//! [`config`] and [`util`] support the `feedscan` command line tool.

pub mod config;
pub mod feed;
pub mod fetch;
pub mod util;
