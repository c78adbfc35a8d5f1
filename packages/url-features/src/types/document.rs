//! Typed view of a fetched HTML page.
//!
//! The parsed tree from `scraper` is flattened into an owned list of
//! elements in document order, so a document can cross `.await` points and
//! thread boundaries. Extractors only need tag names and attributes.

use scraper::{ElementRef, Html};
use url::Url;

/// One HTML element: lowercased tag name plus attributes in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
}

impl Element {
    pub fn new<N, K, V>(name: N, attrs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        N: Into<String>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into().to_lowercase(),
            attrs: attrs
                .into_iter()
                .map(|(k, v)| (k.into().to_lowercase(), v.into()))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute value by (case-insensitive) name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }
}

/// Flattened element list of an HTML document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    elements: Vec<Element>,
}

impl Document {
    /// Parse HTML leniently; malformed markup yields whatever elements the
    /// parser recovered.
    pub fn parse(html: &str) -> Self {
        let tree = Html::parse_document(html);
        let elements = tree
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .map(|el| Element::new(el.value().name(), el.value().attrs()))
            .collect();

        Self { elements }
    }

    pub fn from_elements(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Elements with the given tag name, in document order.
    pub fn tags<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements
            .iter()
            .filter(move |el| el.name.eq_ignore_ascii_case(name))
    }

    /// Elements with the given tag name that declare `attr`.
    pub fn tags_with<'a>(
        &'a self,
        name: &'a str,
        attr: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.tags(name).filter(move |el| el.has_attr(attr))
    }

    /// Values of `attr` on every `name` element declaring it.
    pub fn attr_values<'a>(
        &'a self,
        name: &'a str,
        attr: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.tags(name).filter_map(move |el| el.attr(attr))
    }
}

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// URL after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status: u16,

    /// Number of body bytes received
    pub content_length: u64,

    pub document: Document,
}

impl FetchedDocument {
    pub fn new(final_url: Url, status: u16, body: &str) -> Self {
        Self {
            final_url,
            status,
            content_length: body.len() as u64,
            document: Document::parse(body),
        }
    }
}
