use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// A parsed RSS or Atom feed.
///
/// Only the attributes both formats share are kept. `subtitle` holds the
/// RSS channel `description` or the Atom `subtitle`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Feed {
    pub title: String,
    pub subtitle: String,
    pub link: String,
    /// Items in document order.
    pub items: Vec<Item>,
}

/// A single RSS `item` or Atom `entry`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    /// RSS `guid` or Atom `id`. Empty when the document has none.
    pub id: String,
    pub title: String,
    /// RSS `description` or Atom `summary`.
    pub description: String,
    pub link: String,
    /// Publication (RSS `pubDate`) or update (Atom `updated`) time.
    /// Holds the parse-time reference timestamp when the item carries no date.
    pub when: DateTime<FixedOffset>,
}

impl Item {
    /// Creates an empty item stamped with `when`.
    pub fn new(when: DateTime<FixedOffset>) -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            description: String::new(),
            link: String::new(),
            when,
        }
    }
}
