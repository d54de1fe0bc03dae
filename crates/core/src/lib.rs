pub mod constants;
pub mod dom_tree;
pub mod error;
pub mod extract;
#[cfg(feature = "fetch")]
pub mod fetch;
pub mod pagination;
pub mod parse;
pub mod postprocess;
pub mod preprocess;
pub mod readability;
pub mod request;
pub mod scoring;
pub mod serialize;
pub mod sgml;
pub mod stitcher;
pub mod urls;

pub use constants::Patterns;
pub use dom_tree::{Document, ElementRef, NodeId};
pub use error::{EntityFrame, PerlegoError, Result, SgmlError, SgmlErrorKind};
#[cfg(feature = "fetch")]
pub use fetch::{FetchConfig, HttpFetcher, fetch_file, fetch_stdin, fetch_url};
pub use readability::{
    ReadabilityConfig, ReadabilityConfigBuilder, ReadabilityTranscoder, ReadingMargin, ReadingSize, ReadingStyle,
    TranscodedPage, user_style_class,
};
pub use request::{TranscodeRequest, TranscodeResult, WebTranscodeRequest};
pub use serialize::{DomSerializationParams, DomSerializer};
pub use stitcher::{ReadabilityWebTranscoder, StitchConfig, UrlFetcher};
pub use urls::{AttributeTransformationInput, AttributeTransformationResult, AttributeTransformer};
