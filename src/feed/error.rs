use thiserror::Error;

use super::charset::CharsetError;
use super::date::DateError;

/// Errors that abort a feed parse.
///
/// No partial feed is returned alongside any of these.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The tokenizer hit markup it cannot recover from, or the underlying
    /// stream failed while it was reading.
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Reading the document prolog failed.
    #[error("Failed to read feed: {0}")]
    Io(#[from] std::io::Error),

    /// The declared encoding is not supported.
    #[error(transparent)]
    Charset(#[from] CharsetError),

    /// A present date field could not be parsed under [`DatePolicy::Abort`].
    ///
    /// [`DatePolicy::Abort`]: super::DatePolicy::Abort
    #[error(transparent)]
    Date(#[from] DateError),
}
