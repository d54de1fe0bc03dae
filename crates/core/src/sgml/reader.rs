//! DTD-driven HTML reader.
//!
//! [`SgmlReader`] turns markup text into a balanced stream of [`Event`]s.
//! Every start tag is eventually matched by an end tag, whatever the input
//! looked like: omitted start tags (`html`, `head`, `body`, `tbody`) are
//! implied from the content models, elements with optional end tags are
//! closed when something they cannot contain arrives, and everything still
//! open at end of input is closed.
//!
//! # Example
//!
//! ```rust
//! use perlego_core::sgml::{Event, SgmlReader, html_dtd};
//!
//! let dtd = html_dtd().unwrap();
//! let mut reader = SgmlReader::new("<p>one<p>two", dtd);
//! let mut names = Vec::new();
//! while let Some(event) = reader.read_event().unwrap() {
//!     if let Event::StartTag { name, .. } = event {
//!         names.push(name);
//!     }
//! }
//! assert_eq!(names, ["html", "body", "p", "p"]);
//! ```

use std::collections::VecDeque;

use super::dtd::{DeclaredContent, ElementDecl, SgmlDtd};
use super::entity::Entity;
use crate::error::SgmlError;

/// Limit on how many omitted start tags may be implied for one element.
const MAX_IMPLIED_DEPTH: usize = 4;

/// Undeclared elements are placed as if they were this element.
const UNKNOWN_ELEMENT_PROXY: &str = "span";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StartTag { name: String, attrs: Vec<(String, String)> },
    EndTag { name: String },
    Text(String),
    Comment(String),
    /// A repeated `html`, `head` or `body` start tag; the attributes belong to the existing element.
    MergeAttributes { name: String, attrs: Vec<(String, String)> },
}

pub struct SgmlReader<'a> {
    dtd: &'a SgmlDtd,
    input: Entity,
    open: Vec<String>,
    pending: VecDeque<Event>,
    seen_root: bool,
    seen_head: bool,
    seen_body: bool,
    finished: bool,
}

impl<'a> SgmlReader<'a> {
    pub fn new(html: &str, dtd: &'a SgmlDtd) -> Self {
        let mut input = Entity::source("document", html);
        input.is_html = true;
        input.read_char();
        Self {
            dtd,
            input,
            open: Vec::new(),
            pending: VecDeque::new(),
            seen_root: false,
            seen_head: false,
            seen_body: false,
            finished: false,
        }
    }

    /// Returns the next event, or `None` once the input is exhausted and every element closed.
    pub fn read_event(&mut self) -> Result<Option<Event>, SgmlError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if self.finished {
                return Ok(None);
            }
            self.step().map_err(|e| e.with_context(vec![self.input.frame()]))?;
        }
    }

    fn step(&mut self) -> Result<(), SgmlError> {
        match self.input.last_char() {
            Entity::EOF => {
                while let Some(name) = self.open.pop() {
                    self.pending.push_back(Event::EndTag { name });
                }
                self.finished = true;
                Ok(())
            }
            '<' if starts_markup(self.input.peek(0)) => self.parse_markup(),
            _ => {
                let text = self.read_text();
                self.add_text(text);
                Ok(())
            }
        }
    }

    fn read_text(&mut self) -> String {
        let mut text = String::new();
        let mut ch = self.input.last_char();
        while ch != Entity::EOF {
            if ch == '<' && starts_markup(self.input.peek(0)) {
                break;
            }
            if ch == '&' {
                text.push_str(&self.read_reference(false));
                ch = self.input.last_char();
            } else {
                text.push(ch);
                ch = self.input.read_char();
            }
        }
        text
    }

    /// Expands a reference; the lookahead is `&`. Unknown names are kept as written.
    fn read_reference(&mut self, in_attribute: bool) -> String {
        let ch = self.input.read_char();
        if ch == '#' {
            let numeric = match self.input.peek(0) {
                Some(c) if c.is_ascii_digit() => true,
                Some('x' | 'X') => self.input.peek(1).is_some_and(|c| c.is_ascii_hexdigit()),
                _ => false,
            };
            if numeric {
                return self.input.expand_char_entity();
            }
            self.input.read_char();
            return "&#".to_string();
        }
        if !ch.is_ascii_alphabetic() {
            return "&".to_string();
        }

        let mut name = String::new();
        let mut ch = ch;
        while ch.is_ascii_alphanumeric() {
            name.push(ch);
            ch = self.input.read_char();
        }
        let terminated = ch == ';';
        if in_attribute && !terminated && ch == '=' {
            return format!("&{name}");
        }
        match self.dtd.find_entity(&name).and_then(|e| e.literal.clone()) {
            Some(literal) => {
                if terminated {
                    self.input.read_char();
                }
                literal
            }
            None => format!("&{name}"),
        }
    }

    fn add_text(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        if text.chars().all(char::is_whitespace) {
            let keep = match self.open.last() {
                None => false,
                Some(parent) => self.dtd.find_element(parent).is_none_or(|d| d.contains_directly("#pcdata")),
            };
            if keep {
                self.pending.push_back(Event::Text(text));
            }
            return;
        }
        if !self.seen_root {
            self.open_root(Vec::new());
        }
        self.place("#pcdata");
        self.pending.push_back(Event::Text(text));
    }

    fn parse_markup(&mut self) -> Result<(), SgmlError> {
        let ch = self.input.read_char();
        match ch {
            '!' => self.parse_declaration(),
            '?' => {
                self.skip_to_tag_end();
                Ok(())
            }
            '/' => {
                self.input.read_char();
                let name = self.read_tag_name();
                self.skip_to_tag_end();
                if !name.is_empty() {
                    self.end_element(&name);
                }
                Ok(())
            }
            _ => self.parse_start_tag(),
        }
    }

    /// Comments, CDATA sections, doctype and other `<!` declarations.
    fn parse_declaration(&mut self) -> Result<(), SgmlError> {
        if self.input.peek(0) == Some('-') && self.input.peek(1) == Some('-') {
            self.input.read_char();
            self.input.read_char();
            let comment = self.input.scan_to_end("Comment", "-->")?;
            self.pending.push_back(Event::Comment(comment));
            return Ok(());
        }
        if "[CDATA[".chars().enumerate().all(|(i, c)| self.input.peek(i) == Some(c)) {
            for _ in 0.."[CDATA[".len() {
                self.input.read_char();
            }
            let text = self.input.scan_to_end("CDATA section", "]]>")?;
            self.add_text(text);
            return Ok(());
        }
        self.skip_to_tag_end();
        Ok(())
    }

    /// Skips past the next `>`, or to end of input.
    fn skip_to_tag_end(&mut self) {
        let mut ch = self.input.last_char();
        while ch != '>' && ch != Entity::EOF {
            ch = self.input.read_char();
        }
        if ch == '>' {
            self.input.read_char();
        }
    }

    fn read_tag_name(&mut self) -> String {
        let mut name = String::new();
        let mut ch = self.input.last_char();
        while ch != Entity::EOF && !ch.is_whitespace() && !matches!(ch, '/' | '>' | '<') {
            name.extend(ch.to_lowercase());
            ch = self.input.read_char();
        }
        name
    }

    fn parse_start_tag(&mut self) -> Result<(), SgmlError> {
        let name = self.read_tag_name();
        let decl = self.dtd.find_element(&name);
        let mut attrs: Vec<(String, String)> = Vec::new();
        let mut self_closing = false;

        loop {
            let ch = self.input.skip_whitespace();
            match ch {
                '>' => {
                    self.input.read_char();
                    break;
                }
                '<' | Entity::EOF => break,
                '/' => {
                    if self.input.read_char() == '>' {
                        self_closing = true;
                        self.input.read_char();
                        break;
                    }
                }
                _ => {
                    if let Some((key, value)) = self.parse_attribute(decl)?
                        && !attrs.iter().any(|(k, _)| *k == key)
                    {
                        attrs.push((key, value));
                    }
                }
            }
        }

        self.start_element(name, attrs, self_closing)
    }

    fn parse_attribute(&mut self, decl: Option<&ElementDecl>) -> Result<Option<(String, String)>, SgmlError> {
        let mut name = String::new();
        let mut ch = self.input.last_char();
        while ch != Entity::EOF && !ch.is_whitespace() && !matches!(ch, '=' | '>' | '<' | '/') {
            name.extend(ch.to_lowercase());
            ch = self.input.read_char();
        }
        if name.is_empty() {
            // Stray `=` or quote: consume it so the tag keeps moving.
            self.input.read_char();
            return Ok(None);
        }

        ch = self.input.skip_whitespace();
        if ch != '=' {
            return Ok(Some(self.minimized_attribute(name, decl)));
        }

        ch = self.input.read_char();
        ch = match ch {
            ' ' | '\t' | '\r' | '\n' => self.input.skip_whitespace(),
            c => c,
        };
        let value = if ch == '"' || ch == '\'' {
            self.read_quoted_value(ch)?
        } else {
            let mut value = String::new();
            while ch != Entity::EOF && !ch.is_whitespace() && ch != '>' && ch != '<' {
                if ch == '&' {
                    value.push_str(&self.read_reference(true));
                    ch = self.input.last_char();
                } else {
                    value.push(ch);
                    ch = self.input.read_char();
                }
            }
            value
        };

        let tokenized = decl
            .and_then(|d| d.find_attribute(&name))
            .is_some_and(|def| def.attr_type.is_tokenized());
        let value = if tokenized { value.split_whitespace().collect::<Vec<_>>().join(" ") } else { value };
        Ok(Some((name, value)))
    }

    fn read_quoted_value(&mut self, quote: char) -> Result<String, SgmlError> {
        let start = self.input.line();
        let mut value = String::new();
        let mut ch = self.input.read_char();
        while ch != quote {
            match ch {
                Entity::EOF => {
                    return Err(SgmlError::unexpected_eof(format!(
                        "Attribute value starting on line {start} was never closed"
                    )));
                }
                '&' => {
                    value.push_str(&self.read_reference(true));
                    ch = self.input.last_char();
                }
                _ => {
                    value.push(ch);
                    ch = self.input.read_char();
                }
            }
        }
        self.input.read_char();
        Ok(value)
    }

    /// A value-less attribute names one of the values of an enumerated attribute (`nowrap`).
    fn minimized_attribute(&self, token: String, decl: Option<&ElementDecl>) -> (String, String) {
        let owner = decl.and_then(|d| d.attlist.iter().find(|def| def.allows_value(&token)));
        match owner {
            Some(def) => (def.name.clone(), token),
            None => (token.clone(), token),
        }
    }

    fn start_element(&mut self, name: String, attrs: Vec<(String, String)>, self_closing: bool) -> Result<(), SgmlError> {
        if name.is_empty() {
            return Ok(());
        }
        if name == "html" {
            if self.seen_root {
                self.pending.push_back(Event::MergeAttributes { name, attrs });
            } else {
                self.open_root(attrs);
            }
            return Ok(());
        }
        if !self.seen_root {
            self.open_root(Vec::new());
        }
        if (name == "head" && (self.seen_head || self.seen_body)) || (name == "body" && self.seen_body) {
            self.pending.push_back(Event::MergeAttributes { name, attrs });
            return Ok(());
        }

        self.place(&name);
        self.push_open(name.clone(), attrs);

        let declared = self.dtd.find_element(&name).map(|d| d.declared_content());
        match declared {
            _ if self_closing => self.close_top(),
            Some(DeclaredContent::Empty) => self.close_top(),
            Some(DeclaredContent::Cdata) => self.read_raw_content(&name, false)?,
            Some(DeclaredContent::Rcdata) => self.read_raw_content(&name, true)?,
            _ => {}
        }
        Ok(())
    }

    /// Reads `script`/`style` (CDATA) or `title`/`textarea` (RCDATA) content up to `</name`.
    fn read_raw_content(&mut self, name: &str, expand: bool) -> Result<(), SgmlError> {
        let start = self.input.line();
        let mut text = String::new();
        let mut ch = self.input.last_char();
        loop {
            if ch == Entity::EOF {
                if !expand {
                    return Err(SgmlError::unexpected_eof(format!(
                        "{} element starting on line {start} was never closed",
                        name.to_uppercase()
                    )));
                }
                break;
            }
            if ch == '<' && self.at_end_tag(name) {
                for _ in 0..name.len() + 2 {
                    self.input.read_char();
                }
                self.skip_to_tag_end();
                break;
            }
            if expand && ch == '&' {
                text.push_str(&self.read_reference(false));
                ch = self.input.last_char();
            } else {
                text.push(ch);
                ch = self.input.read_char();
            }
        }
        if !text.is_empty() {
            self.pending.push_back(Event::Text(text));
        }
        self.close_top();
        Ok(())
    }

    /// Whether the lookahead `<` starts `</name` followed by a non-name character.
    fn at_end_tag(&self, name: &str) -> bool {
        if self.input.peek(0) != Some('/') {
            return false;
        }
        let matches_name = name
            .chars()
            .enumerate()
            .all(|(i, c)| self.input.peek(i + 1).is_some_and(|p| p.eq_ignore_ascii_case(&c)));
        matches_name && !self.input.peek(name.len() + 1).is_some_and(|c| c.is_alphanumeric())
    }

    fn end_element(&mut self, name: &str) {
        if name == "html" || name == "body" {
            return;
        }
        if let Some(index) = self.open.iter().rposition(|open| open == name) {
            self.close_above(index);
            self.close_top();
        }
    }

    fn open_root(&mut self, attrs: Vec<(String, String)>) {
        self.seen_root = true;
        self.push_open("html".to_string(), attrs);
    }

    fn push_open(&mut self, name: String, attrs: Vec<(String, String)>) {
        match name.as_str() {
            "head" => self.seen_head = true,
            "body" => self.seen_body = true,
            _ => {}
        }
        self.pending.push_back(Event::StartTag { name: name.clone(), attrs });
        self.open.push(name);
    }

    fn close_top(&mut self) {
        if let Some(name) = self.open.pop() {
            self.pending.push_back(Event::EndTag { name });
        }
    }

    /// Closes every element above `index`.
    fn close_above(&mut self, index: usize) {
        while self.open.len() > index + 1 {
            self.close_top();
        }
    }

    /// Makes room for `name` (or `#pcdata`): closes elements with optional end
    /// tags until an ancestor can hold it, then opens any implied elements.
    fn place(&mut self, name: &str) {
        let proxy = if name != "#pcdata" && self.dtd.find_element(name).is_none() { UNKNOWN_ELEMENT_PROXY } else { name };

        for index in (0..self.open.len()).rev() {
            let Some(decl) = self.dtd.find_element(&self.open[index]) else {
                self.close_above(index);
                return;
            };
            if let Some(path) = self.implied_path(decl, proxy, 0) {
                self.close_above(index);
                for implied in path {
                    self.push_open(implied, Vec::new());
                }
                return;
            }
            if !decl.end_tag_optional {
                break;
            }
        }
    }

    /// Elements with omitted start tags needed between `parent` and `name`.
    fn implied_path(&self, parent: &ElementDecl, name: &str, depth: usize) -> Option<Vec<String>> {
        if parent.contains_directly(name) {
            return Some(Vec::new());
        }
        if depth >= MAX_IMPLIED_DEPTH || parent.declared_content() != DeclaredContent::Default {
            return None;
        }
        for symbol in parent.content_model.model.symbols() {
            if (symbol == "head" && (self.seen_head || self.seen_body)) || (symbol == "body" && self.seen_body) {
                continue;
            }
            let Some(child) = self.dtd.find_element(symbol) else { continue };
            if !child.start_tag_optional {
                continue;
            }
            if let Some(mut rest) = self.implied_path(child, name, depth + 1) {
                rest.insert(0, symbol.to_string());
                return Some(rest);
            }
        }
        None
    }
}

fn starts_markup(next: Option<char>) -> bool {
    next.is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'))
}
