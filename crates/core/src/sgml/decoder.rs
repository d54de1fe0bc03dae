//! Byte stream to text decoding.
//!
//! Detection order: byte-order mark (or the byte pattern of a leading `<`),
//! then an XML declaration or a `<meta>` charset hint found in the first
//! 16 KiB, then the caller's default. Decoding itself never fails; malformed
//! sequences become U+FFFD.

use std::sync::LazyLock;

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};
use regex::Regex;
use tracing::debug;

const SNIFF_LIMIT: usize = 16 * 1024;

static XML_DECL_ENCODING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*<\?xml\s[^>]*?encoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#).expect("xml decl regex")
});

static META_HTTP_EQUIV: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s[^>]*?http-equiv\s*=\s*["']?content-type["']?[^>]*>"#).expect("http-equiv regex")
});

static CHARSET_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([A-Za-z0-9._:-]+)"#).expect("charset regex"));

static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s[^>]*?\bcharset\s*=\s*["']?([A-Za-z0-9._:-]+)"#).expect("meta charset regex")
});

/// The encoding the decoder settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedEncoding {
    Ucs4BigEndian,
    Ucs4LittleEndian,
    Standard(&'static Encoding),
}

impl DetectedEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            DetectedEncoding::Ucs4BigEndian => "UCS-4BE",
            DetectedEncoding::Ucs4LittleEndian => "UCS-4LE",
            DetectedEncoding::Standard(enc) => enc.name(),
        }
    }
}

/// Looks up an encoding label, ignoring labels `encoding_rs` does not know.
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label_no_replacement(label.trim().as_bytes())
}

/// Decodes `bytes`, falling back to `default` (UTF-8 when `None`).
pub fn decode(bytes: &[u8], default: Option<&'static Encoding>) -> (String, DetectedEncoding) {
    let default = default.unwrap_or(UTF_8);

    if let Some((detected, skip)) = detect_from_prefix(bytes) {
        debug!(encoding = detected.name(), "encoding detected from byte prefix");
        let body = &bytes[skip..];
        let text = match detected {
            DetectedEncoding::Ucs4BigEndian => decode_ucs4(body, u32::from_be_bytes),
            DetectedEncoding::Ucs4LittleEndian => decode_ucs4(body, u32::from_le_bytes),
            DetectedEncoding::Standard(enc) => enc.decode_without_bom_handling(body).0.into_owned(),
        };
        return (text, detected);
    }

    let prefix_len = bytes.len().min(SNIFF_LIMIT);
    let (prefix, _) = default.decode_without_bom_handling(&bytes[..prefix_len]);
    let encoding = sniff_declared_encoding(&prefix).unwrap_or(default);
    if encoding != default {
        debug!(encoding = encoding.name(), "encoding declared in document");
    }

    let (text, _) = encoding.decode_without_bom_handling(bytes);
    (text.into_owned(), DetectedEncoding::Standard(encoding))
}

/// Returns the detected encoding and the number of BOM bytes to skip.
fn detect_from_prefix(bytes: &[u8]) -> Option<(DetectedEncoding, usize)> {
    match bytes {
        [0xFE, 0xFF, 0xFE, 0xFF, ..] => Some((DetectedEncoding::Ucs4BigEndian, 4)),
        [0x3C, 0x00, 0x00, 0x00, ..] => Some((DetectedEncoding::Ucs4LittleEndian, 0)),
        [0xFF, 0xFE, 0xFF, 0xFE, ..] => Some((DetectedEncoding::Ucs4LittleEndian, 4)),
        [0x00, 0x00, 0x00, 0x3C, ..] => Some((DetectedEncoding::Ucs4BigEndian, 0)),
        [0xEF, 0xBB, 0xBF, ..] => Some((DetectedEncoding::Standard(UTF_8), 3)),
        [0xFE, 0xFF, ..] => Some((DetectedEncoding::Standard(UTF_16BE), 2)),
        [0x00, 0x3C, ..] => Some((DetectedEncoding::Standard(UTF_16BE), 0)),
        [0xFF, 0xFE, ..] => Some((DetectedEncoding::Standard(UTF_16LE), 2)),
        [0x3C, 0x00, ..] => Some((DetectedEncoding::Standard(UTF_16LE), 0)),
        _ => None,
    }
}

fn decode_ucs4(bytes: &[u8], read: fn([u8; 4]) -> u32) -> String {
    let mut chunks = bytes.chunks_exact(4);
    let mut text: String = chunks
        .by_ref()
        .map(|c| char::from_u32(read([c[0], c[1], c[2], c[3]])).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    if !chunks.remainder().is_empty() {
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}

/// Looks for an XML declaration, then `<meta>` charset hints.
pub fn sniff_declared_encoding(prefix: &str) -> Option<&'static Encoding> {
    if let Some(caps) = XML_DECL_ENCODING.captures(prefix)
        && let Some(enc) = encoding_for_label(&caps[1])
    {
        return Some(enc);
    }

    for meta in META_HTTP_EQUIV.find_iter(prefix) {
        if let Some(caps) = CHARSET_PARAM.captures(meta.as_str())
            && let Some(enc) = encoding_for_label(&caps[1])
        {
            return Some(enc);
        }
    }

    META_CHARSET
        .captures_iter(prefix)
        .find_map(|caps| encoding_for_label(&caps[1]))
}
