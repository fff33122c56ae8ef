// ABOUTME: Parses HTML or XML text into an XPath-queryable sxd_document package.
// ABOUTME: HTML goes through html5ever (via scraper) and is copied node by node into sxd.

use scraper::Html;
use sxd_document::dom;
use sxd_document::Package;

use crate::dom::Node;
use crate::error::ScrapeError;

/// Which parser produced a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Html,
    Xml,
}

/// A parsed page, ready for selector evaluation.
pub struct Document {
    package: Package,
    kind: DocumentKind,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document").field("kind", &self.kind).finish()
    }
}

impl Document {
    /// Parses `content`, choosing the XML parser for documents that start with an
    /// XML declaration and are not XHTML. XML that fails to parse is retried as HTML.
    pub fn parse(content: &str) -> Self {
        if looks_like_xml(content) {
            match Self::parse_xml(content) {
                Ok(doc) => return doc,
                Err(e) => tracing::debug!(error = %e, "XML parse failed, falling back to HTML"),
            }
        }
        Self::parse_html(content)
    }

    /// Parses `content` as HTML5. Never fails; malformed markup is repaired.
    pub fn parse_html(content: &str) -> Self {
        let html = Html::parse_document(content);
        Self {
            package: convert_html(&html),
            kind: DocumentKind::Html,
        }
    }

    /// Parses `content` as well-formed XML.
    ///
    /// Unprefixed elements are moved out of their default namespace so that
    /// plain selectors like `//url` match sitemaps and Atom feeds. Prefixed
    /// elements keep their namespace; select them with `local-name()`.
    pub fn parse_xml(content: &str) -> Result<Self, ScrapeError> {
        let package = sxd_document::parser::parse(content.trim_start_matches('\u{feff}'))
            .map_err(|e| {
                ScrapeError::extract(
                    "",
                    "ParseXml",
                    Some(anyhow::anyhow!("malformed XML: {:?}", e)),
                )
            })?;
        strip_default_namespace(&package);
        Ok(Self {
            package,
            kind: DocumentKind::Xml,
        })
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// The document root, the scope for document-wide selectors.
    pub fn root(&self) -> Node<'_> {
        Node::Root(self.package.as_document().root())
    }
}

fn looks_like_xml(content: &str) -> bool {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    if !trimmed.starts_with("<?xml") {
        return false;
    }
    let head: String = trimmed.chars().take(2048).collect::<String>().to_lowercase();
    !head.contains("<html")
}

fn strip_default_namespace(package: &Package) {
    let doc = package.as_document();
    let mut stack: Vec<dom::Element> = Vec::new();
    for child in doc.root().children() {
        if let dom::ChildOfRoot::Element(el) = child {
            stack.push(el);
        }
    }

    while let Some(el) = stack.pop() {
        let name = el.name();
        if name.namespace_uri().is_some() && el.preferred_prefix().is_none() {
            el.set_name(name.local_part());
        }
        el.set_default_namespace_uri(None);
        for child in el.children() {
            if let dom::ChildOfElement::Element(child) = child {
                stack.push(child);
            }
        }
    }
}

/// Copies an html5ever tree into a fresh sxd package.
///
/// Doctype and processing instructions are dropped; elements, attributes, text
/// and comments keep their document order. Walks with an explicit stack so deeply
/// nested markup cannot overflow the call stack.
fn convert_html(html: &Html) -> Package {
    let package = Package::new();
    {
        let doc = package.as_document();
        let mut stack: Vec<(ego_tree::NodeRef<scraper::Node>, dom::Element)> = Vec::new();

        for child in html.tree.root().children() {
            match child.value() {
                scraper::Node::Element(el) => {
                    let element = create_element(&doc, el);
                    doc.root().append_child(element);
                    stack.push((child, element));
                }
                scraper::Node::Comment(c) => {
                    doc.root().append_child(doc.create_comment(&c.comment));
                }
                _ => {}
            }
        }

        while let Some((source, target)) = stack.pop() {
            for child in source.children() {
                match child.value() {
                    scraper::Node::Element(el) => {
                        let element = create_element(&doc, el);
                        target.append_child(element);
                        stack.push((child, element));
                    }
                    scraper::Node::Text(t) => {
                        target.append_child(doc.create_text(&t.text));
                    }
                    scraper::Node::Comment(c) => {
                        target.append_child(doc.create_comment(&c.comment));
                    }
                    _ => {}
                }
            }
        }
    }
    package
}

fn create_element<'d>(doc: &dom::Document<'d>, el: &scraper::node::Element) -> dom::Element<'d> {
    let element = doc.create_element(el.name());
    for (name, value) in el.attrs() {
        element.set_attribute_value(name, value);
    }
    element
}
