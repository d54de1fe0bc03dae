//! SGML layer: byte decoding, DTD grammar and the DTD-driven HTML reader.

pub mod decoder;
pub mod dtd;
pub mod dtd_parser;
pub mod entity;
pub mod html_dtd;
pub mod reader;

pub use decoder::{DetectedEncoding, decode, encoding_for_label};
pub use dtd::{ContentModel, DeclaredContent, ElementDecl, Group, SgmlDtd};
pub use dtd_parser::DtdParser;
pub use entity::Entity;
pub use html_dtd::{html_dtd, html_dtd_text};
pub use reader::{Event, SgmlReader};
