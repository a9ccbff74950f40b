//! Character set handling for feed documents.
//!
//! Feeds that declare a legacy encoding in their XML declaration are
//! transcoded to UTF-8 on the fly, ahead of the tokenizer. Only a fixed set
//! of single-byte charsets is accepted; anything else fails before a single
//! token is read.

use encoding_rs::{Decoder, Encoding};
use oem_cp::code_table::{DECODING_TABLE_CP437, DECODING_TABLE_CP850};
use std::io::{self, BufRead, BufReader, Cursor, Read};
use thiserror::Error;

use super::error::ParseError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const UTF16LE_BOM: &[u8] = b"\xFF\xFE";
const UTF16BE_BOM: &[u8] = b"\xFE\xFF";

/// Upper bound on bytes read ahead to find the XML declaration.
const MAX_PROLOG: usize = 1024;

/// Normalized names accepted by [`lookup`], besides `utf8` and `usascii`.
pub const SUPPORTED_CHARSETS: &[&str] = &[
    "codepage437",
    "codepage850",
    "codepage866",
    "ibm866",
    "iso88591",
    "iso88592",
    "iso88593",
    "iso88594",
    "iso88595",
    "iso88596",
    "iso88596e",
    "iso88596i",
    "iso88597",
    "iso88598",
    "iso88598e",
    "iso88598i",
    "iso885910",
    "iso885913",
    "iso885914",
    "iso885915",
    "iso885916",
    "koi8r",
    "koi8u",
    "macintosh",
    "macintoshcyrillic",
    "windows874",
    "windows1250",
    "windows1251",
    "windows1252",
    "windows1253",
    "windows1254",
    "windows1255",
    "windows1256",
    "windows1257",
    "windows1258",
];

#[derive(Debug, Error)]
pub enum CharsetError {
    /// The document declares an encoding outside the supported set.
    #[error("Unknown charset: {0}")]
    Unknown(String),
}

/// How the document bytes reach the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// Passed through untouched.
    Utf8,
    /// Transcoded to UTF-8 while reading.
    Legacy(&'static Encoding),
    /// DOS code page, decoded byte by byte through its upper-half table.
    Oem(&'static OemTable),
}

/// Characters for bytes `0x80..=0xFF` of a single-byte DOS code page.
pub type OemTable = [char; 128];

/// Normalizes a declared charset name into a lookup key: lowercased,
/// surrounding spaces trimmed and hyphens removed.
///
/// `"ISO-8859-1"` and `" windows-1252 "` become `"iso88591"` and `"windows1252"`.
pub fn normalize_charset(name: &str) -> String {
    name.to_lowercase().trim_matches(' ').replace('-', "")
}

/// Resolves a declared charset name.
pub fn lookup(name: &str) -> Result<Charset, CharsetError> {
    let key = normalize_charset(name);
    match key.as_str() {
        "utf8" | "usascii" => Ok(Charset::Utf8),
        "codepage437" => Ok(Charset::Oem(&DECODING_TABLE_CP437)),
        "codepage850" => Ok(Charset::Oem(&DECODING_TABLE_CP850)),
        other => legacy_encoding(other)
            .map(Charset::Legacy)
            .ok_or_else(|| CharsetError::Unknown(name.to_string())),
    }
}

fn legacy_encoding(key: &str) -> Option<&'static Encoding> {
    let encoding = match key {
        "codepage866" | "ibm866" => encoding_rs::IBM866,
        // WHATWG treats latin1 as windows-1252, a superset for printable text
        "iso88591" => encoding_rs::WINDOWS_1252,
        "iso88592" => encoding_rs::ISO_8859_2,
        "iso88593" => encoding_rs::ISO_8859_3,
        "iso88594" => encoding_rs::ISO_8859_4,
        "iso88595" => encoding_rs::ISO_8859_5,
        "iso88596" | "iso88596e" | "iso88596i" => encoding_rs::ISO_8859_6,
        "iso88597" => encoding_rs::ISO_8859_7,
        "iso88598" | "iso88598e" => encoding_rs::ISO_8859_8,
        "iso88598i" => encoding_rs::ISO_8859_8_I,
        "iso885910" => encoding_rs::ISO_8859_10,
        "iso885913" => encoding_rs::ISO_8859_13,
        "iso885914" => encoding_rs::ISO_8859_14,
        "iso885915" => encoding_rs::ISO_8859_15,
        "iso885916" => encoding_rs::ISO_8859_16,
        "koi8r" => encoding_rs::KOI8_R,
        "koi8u" => encoding_rs::KOI8_U,
        "macintosh" => encoding_rs::MACINTOSH,
        "macintoshcyrillic" => encoding_rs::X_MAC_CYRILLIC,
        "windows874" => encoding_rs::WINDOWS_874,
        "windows1250" => encoding_rs::WINDOWS_1250,
        "windows1251" => encoding_rs::WINDOWS_1251,
        "windows1252" => encoding_rs::WINDOWS_1252,
        "windows1253" => encoding_rs::WINDOWS_1253,
        "windows1254" => encoding_rs::WINDOWS_1254,
        "windows1255" => encoding_rs::WINDOWS_1255,
        "windows1256" => encoding_rs::WINDOWS_1256,
        "windows1257" => encoding_rs::WINDOWS_1257,
        "windows1258" => encoding_rs::WINDOWS_1258,
        _ => return None,
    };
    Some(encoding)
}

/// Extracts the `encoding` pseudo-attribute of a leading XML declaration.
///
/// Whitespace ahead of the declaration is skipped. Returns `None` when
/// there is no declaration or it names no encoding.
pub fn sniff_declared_charset(head: &[u8]) -> Option<String> {
    let decl = trim_ascii_start(head).strip_prefix(b"<?xml")?;
    let end = find(decl, b"?>")?;
    let decl = &decl[..end];

    let at = find(decl, b"encoding")?;
    let rest = trim_ascii_start(&decl[at + b"encoding".len()..]);
    let rest = trim_ascii_start(rest.strip_prefix(b"=")?);
    let quote = *rest.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let value = &rest[1..];
    let close = value.iter().position(|&b| b == quote)?;
    Some(String::from_utf8_lossy(&value[..close]).into_owned())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|b| b.is_ascii_whitespace())
        .count();
    &bytes[skip..]
}

/// Prolog bytes read ahead of the tokenizer, replayed in front of the rest.
pub type Prefixed<R> = io::Chain<Cursor<Vec<u8>>, R>;

/// A byte source handed to the tokenizer, always producing UTF-8.
pub enum Source<R> {
    Utf8(Prefixed<R>),
    Decoded(BufReader<DecodingReader<Prefixed<R>>>),
}

impl<R: BufRead> Read for Source<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::Utf8(inner) => inner.read(buf),
            Source::Decoded(inner) => inner.read(buf),
        }
    }
}

impl<R: BufRead> BufRead for Source<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            Source::Utf8(inner) => inner.fill_buf(),
            Source::Decoded(inner) => inner.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            Source::Utf8(inner) => inner.consume(amt),
            Source::Decoded(inner) => inner.consume(amt),
        }
    }
}

/// Reads up to the first `>`, which closes either the XML declaration or
/// the root start tag.
fn read_prolog<R: BufRead>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut head = Vec::new();
    while head.len() < MAX_PROLOG && !head.contains(&b'>') {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            break;
        }
        let take = available.len().min(MAX_PROLOG - head.len());
        head.extend_from_slice(&available[..take]);
        reader.consume(take);
    }
    Ok(head)
}

fn decoded<R: BufRead>(reader: DecodingReader<Prefixed<R>>) -> Source<R> {
    Source::Decoded(BufReader::new(reader))
}

/// Inspects the start of `reader` and wraps it so the tokenizer sees UTF-8.
///
/// A UTF-8 byte order mark is dropped. UTF-16 byte order marks select the
/// matching UTF-16 decoder. Otherwise the declared `encoding` decides, and
/// an unknown name is an error.
pub fn prepare<R: BufRead>(mut reader: R) -> Result<Source<R>, ParseError> {
    let head = read_prolog(&mut reader)?;

    let bom = if head.starts_with(UTF16LE_BOM) {
        Some((encoding_rs::UTF_16LE, UTF16LE_BOM.len()))
    } else if head.starts_with(UTF16BE_BOM) {
        Some((encoding_rs::UTF_16BE, UTF16BE_BOM.len()))
    } else {
        None
    };
    if let Some((encoding, skip)) = bom {
        tracing::debug!(charset = encoding.name(), "Byte order mark selects charset");
        let mut prefix = Cursor::new(head);
        prefix.set_position(skip as u64);
        return Ok(decoded(DecodingReader::new(prefix.chain(reader), encoding)));
    }

    let skip = if head.starts_with(UTF8_BOM) {
        UTF8_BOM.len()
    } else {
        0
    };
    let declared = sniff_declared_charset(&head[skip..]);
    let charset = match declared.as_deref() {
        Some(name) => lookup(name)?,
        None => Charset::Utf8,
    };

    let mut prefix = Cursor::new(head);
    prefix.set_position(skip as u64);
    let source = prefix.chain(reader);

    match charset {
        Charset::Utf8 => Ok(Source::Utf8(source)),
        Charset::Legacy(encoding) => {
            tracing::debug!(charset = encoding.name(), "Transcoding feed to UTF-8");
            Ok(decoded(DecodingReader::new(source, encoding)))
        }
        Charset::Oem(table) => {
            tracing::debug!(charset = ?declared, "Transcoding DOS code page to UTF-8");
            Ok(decoded(DecodingReader::with_oem_table(source, table)))
        }
    }
}

enum Transcoder {
    Whatwg(Decoder),
    Oem(&'static OemTable),
}

/// Streaming transcoder from a legacy charset to UTF-8.
pub struct DecodingReader<R> {
    inner: R,
    transcoder: Transcoder,
    out: Vec<u8>,
    pos: usize,
    finished: bool,
}

impl<R: BufRead> DecodingReader<R> {
    pub fn new(inner: R, encoding: &'static Encoding) -> Self {
        Self::with_transcoder(
            inner,
            Transcoder::Whatwg(encoding.new_decoder_without_bom_handling()),
        )
    }

    pub fn with_oem_table(inner: R, table: &'static OemTable) -> Self {
        Self::with_transcoder(inner, Transcoder::Oem(table))
    }

    fn with_transcoder(inner: R, transcoder: Transcoder) -> Self {
        Self {
            inner,
            transcoder,
            out: Vec::new(),
            pos: 0,
            finished: false,
        }
    }

    /// Decodes the next chunk of input into `out`.
    fn refill(&mut self) -> io::Result<()> {
        self.out.clear();
        self.pos = 0;

        let src = self.inner.fill_buf()?;
        let last = src.is_empty();
        let read = match &mut self.transcoder {
            Transcoder::Whatwg(decoder) => {
                let capacity = decoder.max_utf8_buffer_length(src.len()).ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidData, "decoded chunk too large")
                })?;
                self.out.resize(capacity, 0);

                let (_result, read, written, _replaced) =
                    decoder.decode_to_utf8(src, &mut self.out, last);
                self.out.truncate(written);
                read
            }
            // Single-byte tables carry no state across chunks
            Transcoder::Oem(table) => {
                let text = oem_cp::decode_string_complete_table(src, *table);
                self.out.extend_from_slice(text.as_bytes());
                src.len()
            }
        };
        self.inner.consume(read);
        self.finished = last;
        Ok(())
    }
}

impl<R: BufRead> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.out.len() {
            if self.finished {
                return Ok(0);
            }
            self.refill()?;
        }

        let pending = &self.out[self.pos..];
        let n = pending.len().min(buf.len());
        buf[..n].copy_from_slice(&pending[..n]);
        self.pos += n;
        Ok(n)
    }
}
