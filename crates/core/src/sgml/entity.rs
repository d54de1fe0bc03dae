//! Entities and the character-level scanner.
//!
//! An [`Entity`] is both a declaration (a named literal or external id) and,
//! once opened, a character source with line tracking. The scanning
//! primitives used by the DTD parser and the reader all live here; they keep
//! the SGML convention that `last_char` is the current lookahead character.

use crate::error::{EntityFrame, SgmlError};

/// Literal subtype of an internal entity declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiteralType {
    #[default]
    Cdata,
    Sdata,
    Pi,
}

impl LiteralType {
    pub fn from_keyword(token: &str) -> Option<Self> {
        match token {
            "CDATA" => Some(LiteralType::Cdata),
            "SDATA" => Some(LiteralType::Sdata),
            "PI" => Some(LiteralType::Pi),
            _ => None,
        }
    }
}

/// Windows-1252 code points for the C1 control range 0x80..=0x9F.
const CTRL_MAP: [u32; 32] = [
    8364, 129, 8218, 402, 8222, 8230, 8224, 8225, 710, 8240, 352, 8249, 338, 141, 381, 143, 144, 8216, 8217, 8220,
    8221, 8226, 8211, 8212, 732, 8482, 353, 8250, 339, 157, 382, 376,
];

#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    pub public_id: Option<String>,
    pub uri: Option<String>,
    pub literal: Option<String>,
    pub literal_type: LiteralType,
    pub is_internal: bool,
    /// Remaps numeric references in the C1 range through Windows-1252.
    pub is_html: bool,
    chars: Vec<char>,
    pos: usize,
    last_char: char,
    is_whitespace: bool,
    line: usize,
    line_start: usize,
}

impl Entity {
    /// End of input sentinel returned by [`Entity::read_char`].
    pub const EOF: char = '\u{FFFF}';

    /// An internal entity with a literal replacement text.
    pub fn internal(name: impl Into<String>, literal: impl Into<String>) -> Self {
        let mut entity = Self::blank(name.into());
        entity.literal = Some(literal.into());
        entity.is_internal = true;
        entity
    }

    /// An external entity identified by public id and/or system uri.
    pub fn external(name: impl Into<String>, public_id: Option<String>, uri: Option<String>) -> Self {
        let mut entity = Self::blank(name.into());
        entity.public_id = public_id;
        entity.uri = uri;
        entity
    }

    /// An already opened source over `text`, used for documents and DTD text.
    pub fn source(name: impl Into<String>, text: &str) -> Self {
        let mut entity = Self::internal(name, text);
        entity.chars = text.chars().collect();
        entity.is_html = entity.name.eq_ignore_ascii_case("html");
        entity
    }

    fn blank(name: String) -> Self {
        Self {
            name,
            public_id: None,
            uri: None,
            literal: None,
            literal_type: LiteralType::default(),
            is_internal: false,
            is_html: false,
            chars: Vec::new(),
            pos: 0,
            last_char: '\0',
            is_whitespace: false,
            line: 1,
            line_start: 0,
        }
    }

    /// Binds the entity to its character source.
    pub fn open(&mut self, parent_is_html: bool) -> Result<(), SgmlError> {
        self.is_html = parent_is_html || self.name.eq_ignore_ascii_case("html");
        self.line = 1;
        self.line_start = 0;
        self.pos = 0;
        if self.is_internal {
            self.chars = self.literal.as_deref().unwrap_or_default().chars().collect();
            Ok(())
        } else if self.uri.is_none() {
            Err(SgmlError::syntax(format!("Unresolvable entity '{}'", self.name)))
        } else {
            Err(SgmlError::syntax(format!("no support for uri entities: '{}'", self.name)))
        }
    }

    pub fn last_char(&self) -> char {
        self.last_char
    }

    pub fn is_whitespace(&self) -> bool {
        self.is_whitespace
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// One-based column of the lookahead character.
    pub fn line_position(&self) -> usize {
        self.pos.saturating_sub(self.line_start).max(1)
    }

    pub fn frame(&self) -> EntityFrame {
        EntityFrame {
            name: self.name.clone(),
            line: self.line,
            position: self.line_position(),
            is_internal: self.is_internal,
        }
    }

    /// Peeks `n` characters past the lookahead without consuming them.
    pub fn peek(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    /// Advances one character. NUL reads as a space; a CR, LF or CRLF pair is one line break.
    pub fn read_char(&mut self) -> char {
        let Some(&raw) = self.chars.get(self.pos) else {
            self.last_char = Self::EOF;
            self.is_whitespace = false;
            return Self::EOF;
        };
        let ch = match raw {
            '\0' => ' ',
            Self::EOF => char::REPLACEMENT_CHARACTER,
            c => c,
        };
        self.pos += 1;
        match ch {
            '\r' => self.new_line(),
            '\n' if self.last_char != '\r' => self.new_line(),
            _ => {}
        }
        self.is_whitespace = matches!(ch, ' ' | '\t' | '\r' | '\n');
        self.last_char = ch;
        ch
    }

    fn new_line(&mut self) {
        self.line += 1;
        self.line_start = self.pos;
    }

    pub fn skip_whitespace(&mut self) -> char {
        let mut ch = self.last_char;
        while matches!(ch, ' ' | '\r' | '\n' | '\t') {
            ch = self.read_char();
        }
        ch
    }

    /// Reads characters until one from `term`. With `nmtoken`, enforces name syntax.
    pub fn scan_token(&mut self, term: &str, nmtoken: bool) -> Result<String, SgmlError> {
        let mut ch = self.last_char;
        if nmtoken && ch != '_' && !ch.is_alphabetic() {
            return Err(SgmlError::syntax(format!("Invalid name start character '{ch}'")));
        }
        let mut token = String::new();
        while ch != Self::EOF && !term.contains(ch) {
            if nmtoken && !(ch.is_alphanumeric() || matches!(ch, '_' | '.' | '-' | ':')) {
                return Err(SgmlError::syntax(format!("Invalid name character '{ch}'")));
            }
            token.push(ch);
            ch = self.read_char();
        }
        Ok(token)
    }

    /// Reads a literal delimited by `quote`; the lookahead is the opening quote.
    ///
    /// Numeric character references are expanded. Named references are kept as written.
    pub fn scan_literal(&mut self, quote: char) -> Result<String, SgmlError> {
        let start = self.line;
        let mut literal = String::new();
        let mut ch = self.read_char();
        while ch != Self::EOF && ch != quote {
            if ch == '&' {
                ch = self.read_char();
                if ch == '#' {
                    literal.push_str(&self.expand_char_entity());
                    ch = self.last_char;
                } else {
                    literal.push('&');
                    if ch != quote && ch != Self::EOF {
                        literal.push(ch);
                        ch = self.read_char();
                    }
                }
            } else {
                literal.push(ch);
                ch = self.read_char();
            }
        }
        if ch == Self::EOF {
            return Err(SgmlError::unexpected_eof(format!(
                "Literal starting on line {start} was never closed"
            )));
        }
        self.read_char();
        Ok(literal)
    }

    /// Reads up to and including `terminator`, returning the text before it.
    pub fn scan_to_end(&mut self, kind: &str, terminator: &str) -> Result<String, SgmlError> {
        let term: Vec<char> = terminator.chars().collect();
        let fail = failure_table(&term);
        let start = self.line;
        let mut text = String::new();
        let mut state = 0;
        let mut ch = self.read_char();
        while ch != Self::EOF {
            while state > 0 && term[state] != ch {
                let fallback = fail[state - 1];
                text.extend(&term[..state - fallback]);
                state = fallback;
            }
            if term[state] == ch {
                state += 1;
                if state == term.len() {
                    self.read_char();
                    return Ok(text);
                }
            } else {
                text.push(ch);
            }
            ch = self.read_char();
        }
        Err(SgmlError::unexpected_eof(format!("{kind} starting on line {start} was never closed")))
    }

    /// Decodes a numeric reference; the lookahead is the `#`.
    pub fn expand_char_entity(&mut self) -> String {
        let mut ch = self.read_char();
        let radix = if ch == 'x' || ch == 'X' {
            ch = self.read_char();
            16
        } else {
            10
        };

        let mut value: Option<u32> = Some(0);
        let mut digits = 0;
        while let Some(d) = ch.to_digit(radix) {
            value = value.and_then(|v| v.checked_mul(radix)).and_then(|v| v.checked_add(d));
            digits += 1;
            ch = self.read_char();
        }
        if ch == ';' {
            self.read_char();
        }

        let value = if digits == 0 { None } else { value };
        let code = match value {
            Some(v) if self.is_html && (0x80..=0x9F).contains(&v) => CTRL_MAP[(v - 0x80) as usize],
            Some(v) => v,
            None => 0,
        };
        match char::from_u32(code) {
            Some(c) if code != 0 => c.to_string(),
            _ => char::REPLACEMENT_CHARACTER.to_string(),
        }
    }
}

fn failure_table(term: &[char]) -> Vec<usize> {
    let mut fail = vec![0; term.len()];
    let mut k = 0;
    for i in 1..term.len() {
        while k > 0 && term[i] != term[k] {
            k = fail[k - 1];
        }
        if term[i] == term[k] {
            k += 1;
        }
        fail[i] = k;
    }
    fail
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn opened(text: &str) -> Entity {
        let mut e = Entity::source("test", text);
        e.read_char();
        e
    }

    #[test]
    fn test_line_counting_treats_crlf_as_one_break() {
        let mut e = opened("a\r\nb\rc\nd");
        while e.last_char() != 'd' {
            e.read_char();
        }
        assert_eq!(e.line(), 4);
    }

    #[test]
    fn test_nul_reads_as_space() {
        let e = opened("\0x");
        assert_eq!(e.last_char(), ' ');
        assert!(e.is_whitespace());
    }

    #[test]
    fn test_scan_token_stops_at_terminator() {
        let mut e = opened("div-x:y >");
        assert_eq!(e.scan_token(" >", true).unwrap(), "div-x:y");
        assert_eq!(e.last_char(), ' ');
    }

    #[rstest]
    #[case("1abc", "Invalid name start character '1'")]
    #[case("ab$c ", "Invalid name character '$'")]
    fn test_scan_token_rejects_bad_names(#[case] input: &str, #[case] message: &str) {
        let mut e = opened(input);
        assert_eq!(e.scan_token(" ", true).unwrap_err().message, message);
    }

    #[test]
    fn test_scan_literal_expands_numeric_only() {
        let mut e = opened("\"a&#65;&amp;b\" rest");
        assert_eq!(e.scan_literal('"').unwrap(), "aA&amp;b");
        assert_eq!(e.last_char(), ' ');
    }

    #[test]
    fn test_scan_literal_keeps_trailing_ampersand() {
        let mut e = opened("'a&'>");
        assert_eq!(e.scan_literal('\'').unwrap(), "a&");
        assert_eq!(e.last_char(), '>');
    }

    #[test]
    fn test_unterminated_literal_is_eof_error() {
        let mut e = opened("\"never");
        let err = e.scan_literal('"').unwrap_err();
        assert!(err.is_unexpected_eof());
    }

    #[rstest]
    #[case("a--b-->x", "-->", "a--b")]
    #[case("--->x", "-->", "-")]
    #[case("]]]>x", "]]>", "]")]
    #[case("abab abac x", "abac", "abab ")]
    fn test_scan_to_end_reemits_partial_matches(#[case] input: &str, #[case] term: &str, #[case] expected: &str) {
        let mut e = Entity::source("test", input);
        assert_eq!(e.scan_to_end("Comment", term).unwrap(), expected);
    }

    #[test]
    fn test_scan_to_end_unterminated() {
        let mut e = Entity::source("test", "\n\nno end");
        let err = e.scan_to_end("Comment", "-->").unwrap_err();
        assert!(err.is_unexpected_eof());
        assert_eq!(err.message, "Comment starting on line 1 was never closed");
    }

    #[rstest]
    #[case("#65;", false, "A")]
    #[case("#x41;", false, "A")]
    #[case("#X1F600;", false, "\u{1F600}")]
    #[case("#150;", true, "\u{2013}")]
    #[case("#150;", false, "\u{96}")]
    #[case("#0;", false, "\u{FFFD}")]
    #[case("#xD800;", false, "\u{FFFD}")]
    #[case("#99999999999;", false, "\u{FFFD}")]
    fn test_expand_char_entity(#[case] input: &str, #[case] html: bool, #[case] expected: &str) {
        let mut e = opened(input);
        e.is_html = html;
        assert_eq!(e.expand_char_entity(), expected);
    }

    #[test]
    fn test_char_entity_without_semicolon_stops_at_non_digit() {
        let mut e = opened("#66x");
        assert_eq!(e.expand_char_entity(), "B");
        assert_eq!(e.last_char(), 'x');
    }

    #[test]
    fn test_open_external_entity_fails() {
        let mut e = Entity::external("HTMLlat1", Some("-//W3C//ENTITIES Latin 1//EN//HTML".into()), None);
        assert!(e.open(false).unwrap_err().message.contains("Unresolvable entity"));
    }

    #[test]
    fn test_open_inherits_html_flag() {
        let mut e = Entity::internal("x", "&#150;");
        e.open(true).unwrap();
        assert!(e.is_html);
    }
}
