//! RSS/Atom feed parsing.
//!
//! This module turns a byte stream holding an RSS 2.0 or Atom document into
//! a [`Feed`]:
//!
//! - **Charset**: legacy encodings declared in the XML prolog are transcoded
//!   to UTF-8 while streaming
//! - **Parsing**: a single pass over the XML tokens with no document tree
//! - **Dates**: RFC 822 style `pubDate` and RFC 3339 style `updated` values
//!
//! # Architecture
//!
//! - [`parser`] - The token-stream state machine
//! - [`date`] - Date grammars and the malformed-date policy
//! - [`charset`] - Charset lookup and the transcoding reader
//! - `model` - The [`Feed`] and [`Item`] values
//!
//! # Example
//!
//! ```
//! use feedscan::feed::parse_feed;
//!
//! let feed = parse_feed(b"<feed><title>Example</title><entry><id>1</id></entry></feed>").unwrap();
//! assert_eq!(feed.title, "Example");
//! assert_eq!(feed.items.len(), 1);
//! ```

pub mod charset;
pub mod date;
mod error;
mod model;
pub mod parser;

pub use charset::CharsetError;
pub use date::{DateError, DateFormat, DatePolicy};
pub use error::ParseError;
pub use model::{Feed, Item};
pub use parser::{parse, parse_feed, FeedParser, ParserOptions};
