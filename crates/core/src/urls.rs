//! Link and image URL resolution for extracted content.
//!
//! Relative `href`/`src` values are resolved against the page URL with the
//! `url` crate. Callers can hook a transformer in after resolution, for
//! example to route links through a redirector while keeping the original.
//!
//! # Example
//!
//! ```rust
//! use perlego_core::urls::resolve_url;
//!
//! assert_eq!(resolve_url(Some("http://immortal.pl/"), "image.jpg"), "http://immortal.pl/image.jpg");
//! assert_eq!(resolve_url(Some("http://immortal.pl/"), "mailto:me@example.com"), "mailto:me@example.com");
//! // A malformed base leaves the value untouched
//! assert_eq!(resolve_url(Some("immortal.pl/article"), "image.jpg"), "image.jpg");
//! ```

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::dom_tree::{Document, ElementRef, NodeId};

/// What a transformer gets to look at: the resolved value and the element that carries it
#[derive(Debug, Clone, Copy)]
pub struct AttributeTransformationInput<'a> {
    pub attribute_value: &'a str,
    pub element: ElementRef<'a>,
}

/// What a transformer hands back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeTransformationResult {
    pub transformed_value: String,
    /// When set, the untransformed value is kept on the element under this attribute name.
    pub original_value_attribute_name: Option<String>,
}

impl AttributeTransformationResult {
    pub fn new(transformed_value: impl Into<String>) -> Self {
        Self { transformed_value: transformed_value.into(), original_value_attribute_name: None }
    }

    pub fn with_original_value_attribute(mut self, name: impl Into<String>) -> Self {
        self.original_value_attribute_name = Some(name.into());
        self
    }
}

/// Caller-supplied rewrite of a resolved attribute value
#[derive(Clone)]
pub struct AttributeTransformer(Arc<dyn Fn(&AttributeTransformationInput<'_>) -> AttributeTransformationResult + Send + Sync>);

impl AttributeTransformer {
    pub fn new<F>(transform: F) -> Self
    where
        F: Fn(&AttributeTransformationInput<'_>) -> AttributeTransformationResult + Send + Sync + 'static,
    {
        Self(Arc::new(transform))
    }

    pub fn apply(&self, input: &AttributeTransformationInput<'_>) -> AttributeTransformationResult {
        (self.0)(input)
    }
}

impl fmt::Debug for AttributeTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AttributeTransformer(..)")
    }
}

/// Parses `base` unless it is unusable as a base: unparsable, host-less, or missing `://`
fn parse_base(base: &str) -> Option<Url> {
    if !base.contains("://") {
        return None;
    }
    Url::parse(base).ok().filter(|url| url.has_host())
}

/// Resolves `value` against `base`
///
/// Values that already carry a scheme are returned unchanged, as is everything
/// when the base is missing or malformed.
pub fn resolve_url(base: Option<&str>, value: &str) -> String {
    if value.is_empty() || Url::parse(value).is_ok() {
        return value.to_string();
    }
    let Some(base) = base.and_then(parse_base) else { return value.to_string() };
    base.join(value).map(|url| url.to_string()).unwrap_or_else(|_| value.to_string())
}

/// Resolves every `a[href]` and `img[src]` under `scope`, then runs the matching transformer
pub fn resolve_element_urls(
    doc: &mut Document, scope: NodeId, base: Option<&str>, anchor_href: Option<&AttributeTransformer>,
    image_src: Option<&AttributeTransformer>,
) {
    for (tag, attribute, transformer) in [("a", "href", anchor_href), ("img", "src", image_src)] {
        for node in doc.elements_by_tag_name(scope, tag) {
            let Some(value) = doc.attr(node, attribute) else { continue };
            let resolved = resolve_url(base, value.trim());
            let result = match transformer {
                Some(transformer) => transformer.apply(&AttributeTransformationInput {
                    attribute_value: &resolved,
                    element: doc.element_ref(node),
                }),
                None => AttributeTransformationResult::new(resolved.clone()),
            };
            if let Some(name) = &result.original_value_attribute_name {
                doc.set_attr(node, name, resolved.as_str());
            }
            doc.set_attr(node, attribute, result.transformed_value);
        }
    }
}
