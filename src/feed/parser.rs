use chrono::{DateTime, FixedOffset, Utc};
use quick_xml::escape;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;

use super::charset;
use super::date::{parse_atom_date, parse_rss_date, DateError, DatePolicy};
use super::error::ParseError;
use super::model::{Feed, Item};

/// Syndication format, fixed by the root element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Rss,
    Atom,
}

/// Whether text currently belongs to the feed or to the item being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    /// Before any `channel` or `feed` element.
    Document,
    Feed,
    Post,
}

/// Destination of a run of character data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    FeedTitle,
    FeedSubtitle,
    FeedLink,
    ItemId,
    ItemTitle,
    ItemDescription,
    ItemLink,
    ItemUpdated,
    ItemPubDate,
}

/// Maps the innermost open tag to the field its text fills.
///
/// Atom links never come from text; see [`ParseState::atom_link`].
fn field_for(level: Level, format: Format, tag: &str) -> Option<Field> {
    use Format::{Atom, Rss};
    use Level::{Feed, Post};

    match (level, format, tag) {
        (Feed, _, "title") => Some(Field::FeedTitle),
        (Feed, Rss, "description") | (Feed, Atom, "subtitle") => Some(Field::FeedSubtitle),
        (Feed, Rss, "link") => Some(Field::FeedLink),
        (Post, Rss, "guid") | (Post, Atom, "id") => Some(Field::ItemId),
        (Post, _, "title") => Some(Field::ItemTitle),
        (Post, Rss, "description") | (Post, Atom, "summary") => Some(Field::ItemDescription),
        (Post, Rss, "link") => Some(Field::ItemLink),
        (Post, Atom, "updated") => Some(Field::ItemUpdated),
        (Post, Rss, "pubdate") => Some(Field::ItemPubDate),
        _ => None,
    }
}

/// Knobs for [`FeedParser`].
#[derive(Debug, Clone, Default)]
pub struct ParserOptions {
    /// Handling of present but unparseable dates.
    pub date_policy: DatePolicy,
    /// Timestamp given to items without a usable date. Defaults to the
    /// wall-clock time when the parse starts.
    pub reference_time: Option<DateTime<FixedOffset>>,
}

/// Single-pass RSS/Atom parser.
///
/// Walks the token stream once, never building a document tree. Parsers
/// hold no state between calls, so one instance can parse any number of
/// documents.
#[derive(Debug, Clone, Default)]
pub struct FeedParser {
    options: ParserOptions,
}

impl FeedParser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    /// Parses a whole RSS or Atom document from `reader`.
    ///
    /// # Errors
    ///
    /// - [`ParseError::Charset`] if the declared encoding is unsupported.
    ///   Nothing is tokenized in that case.
    /// - [`ParseError::Xml`] for unrecoverable markup or a failing stream.
    /// - [`ParseError::Date`] for a malformed date under [`DatePolicy::Abort`].
    pub fn parse<R: BufRead>(&self, reader: R) -> Result<Feed, ParseError> {
        let source = charset::prepare(reader)?;

        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.trim_text(false);
        config.expand_empty_elements = true;
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        let now = self
            .options
            .reference_time
            .unwrap_or_else(|| Utc::now().fixed_offset());
        let mut state = ParseState::new(self.options.date_policy, now);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => state.start(&e),
                Event::End(e) => state.end(&lowercase(e.local_name().as_ref())),
                Event::Text(e) => state.text(&unescape_text(&e))?,
                Event::CData(e) => state.text(&String::from_utf8_lossy(&e))?,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        let feed = state.finish();
        tracing::debug!(
            title = %feed.title,
            items = feed.items.len(),
            "Parsed feed"
        );
        Ok(feed)
    }

    /// Parses a document held in memory.
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<Feed, ParseError> {
        self.parse(bytes)
    }
}

/// Parses `reader` with default options.
pub fn parse<R: BufRead>(reader: R) -> Result<Feed, ParseError> {
    FeedParser::default().parse(reader)
}

/// Parses an in-memory document with default options.
pub fn parse_feed(bytes: &[u8]) -> Result<Feed, ParseError> {
    FeedParser::default().parse_bytes(bytes)
}

fn lowercase(name: &[u8]) -> String {
    String::from_utf8_lossy(name).to_lowercase()
}

fn unescape_text(e: &BytesText<'_>) -> String {
    unescape_lenient(&String::from_utf8_lossy(e)).into_owned()
}

/// Resolves entity and character references one at a time. A reference
/// that does not resolve (`&nbsp;`) and a bare `&` are kept as written.
fn unescape_lenient(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let reference = tail.find(';').filter(|&end| {
            tail[1..end]
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'#')
        });
        let Some(end) = reference else {
            out.push('&');
            rest = &tail[1..];
            continue;
        };

        let written = &tail[..=end];
        match escape::unescape(written) {
            Ok(resolved) => out.push_str(&resolved),
            Err(err) => {
                tracing::warn!(reference = %written, error = %err, "Keeping unresolved reference");
                out.push_str(written);
            }
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Everything carried from one token to the next.
struct ParseState {
    /// Lowercase local name of the most recently opened element.
    tag: String,
    format: Format,
    level: Level,
    feed: Feed,
    /// Item under construction. Only meaningful while `level` is `Post`.
    item: Item,
    policy: DatePolicy,
    now: DateTime<FixedOffset>,
}

impl ParseState {
    fn new(policy: DatePolicy, now: DateTime<FixedOffset>) -> Self {
        Self {
            tag: String::new(),
            format: Format::Rss,
            level: Level::Document,
            feed: Feed::default(),
            item: Item::new(now),
            policy,
            now,
        }
    }

    fn start(&mut self, e: &BytesStart<'_>) {
        let tag = lowercase(e.local_name().as_ref());

        match (tag.as_str(), self.format) {
            ("feed", _) => {
                self.enter_feed(Format::Atom);
            }
            ("channel", _) => {
                self.enter_feed(Format::Rss);
            }
            ("item", Format::Rss) | ("entry", Format::Atom) => {
                self.level = Level::Post;
                self.item = Item::new(self.now);
            }
            ("link", Format::Atom) => self.atom_link(e),
            _ => {}
        }

        self.tag = tag;
    }

    fn enter_feed(&mut self, format: Format) {
        if self.level == Level::Document {
            tracing::debug!(format = ?format, "Detected feed format");
        }
        self.format = format;
        self.level = Level::Feed;
    }

    /// Atom carries links in the `href` attribute. Only the element's first
    /// `href` is read; a later `link` element replaces an earlier one.
    fn atom_link(&mut self, e: &BytesStart<'_>) {
        let href = e.html_attributes().flatten().find(|attr| {
            attr.key
                .local_name()
                .as_ref()
                .eq_ignore_ascii_case(b"href")
        });
        let Some(attr) = href else {
            return;
        };

        let value = unescape_lenient(&String::from_utf8_lossy(&attr.value)).into_owned();

        match self.level {
            Level::Feed => self.feed.link = value,
            Level::Post => self.item.link = value,
            Level::Document => {}
        }
    }

    /// Closing `item` or `entry` completes the current item, in either format.
    fn end(&mut self, tag: &str) {
        if tag == "item" || tag == "entry" {
            let item = std::mem::replace(&mut self.item, Item::new(self.now));
            self.feed.items.push(item);
        }
    }

    /// Stores a run of character data in the field the open tag maps to.
    ///
    /// The run is trimmed before it is stored, and dates are trimmed before
    /// their grammar is chosen, so `" 2021-05-01T10:00:00Z\n"` parses.
    /// Surrounding whitespace is never kept in a field.
    fn text(&mut self, raw: &str) -> Result<(), DateError> {
        let text = raw.trim();
        if text.is_empty() {
            return Ok(());
        }
        let Some(field) = field_for(self.level, self.format, &self.tag) else {
            return Ok(());
        };

        match field {
            Field::FeedTitle => self.feed.title = text.to_string(),
            Field::FeedSubtitle => self.feed.subtitle = text.to_string(),
            Field::FeedLink => self.feed.link = text.to_string(),
            Field::ItemId => self.item.id = text.to_string(),
            Field::ItemTitle => self.item.title = text.to_string(),
            Field::ItemDescription => self.item.description = text.to_string(),
            Field::ItemLink => self.item.link = text.to_string(),
            Field::ItemUpdated => self.set_when(parse_atom_date(text))?,
            Field::ItemPubDate => self.set_when(parse_rss_date(text))?,
        }
        Ok(())
    }

    fn set_when(
        &mut self,
        parsed: Result<DateTime<FixedOffset>, DateError>,
    ) -> Result<(), DateError> {
        match parsed {
            Ok(when) => self.item.when = when,
            Err(err) => match self.policy {
                DatePolicy::Abort => return Err(err),
                DatePolicy::FallbackToNow => {
                    tracing::warn!(error = %err, "Using parse time for unreadable date");
                    self.item.when = self.now;
                }
            },
        }
        Ok(())
    }

    fn finish(self) -> Feed {
        self.feed
    }
}
