// ABOUTME: Read-only node accessors: text content, serialized markup, attribute values.
// ABOUTME: Markup is serialized HTML-style, with void elements left unclosed.

use html_escape::{encode_double_quoted_attribute, encode_text};
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};

use crate::dom::Node;

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Returns the XPath string value of a node: concatenated descendant text for
/// elements and the root, the value for attributes, the text for text nodes.
pub fn node_text(node: Node<'_>) -> String {
    node.string_value()
}

/// Serializes a node, including the node itself for elements.
///
/// Attribute nodes serialize to their value; text nodes to escaped text.
pub fn node_markup(node: Node<'_>) -> String {
    let mut out = String::new();
    match node {
        Node::Root(root) => {
            for child in root.children() {
                match child {
                    ChildOfRoot::Element(el) => write_element(&mut out, el),
                    ChildOfRoot::Comment(c) => write_comment(&mut out, c.text()),
                    ChildOfRoot::ProcessingInstruction(_) => {}
                }
            }
        }
        Node::Element(el) => write_element(&mut out, el),
        Node::Attribute(attr) => out.push_str(attr.value()),
        Node::Text(text) => out.push_str(&encode_text(text.text())),
        Node::Comment(c) => write_comment(&mut out, c.text()),
        Node::Namespace(_) | Node::ProcessingInstruction(_) => {}
    }
    out
}

/// Returns the value of attribute `name` on an element node.
pub fn node_attribute(node: Node<'_>, name: &str) -> Option<String> {
    match node {
        Node::Element(el) => el.attribute_value(name).map(str::to_string),
        _ => None,
    }
}

fn write_element(out: &mut String, el: Element<'_>) {
    let name = el.name().local_part().to_string();
    out.push('<');
    out.push_str(&name);
    for attr in el.attributes() {
        out.push(' ');
        out.push_str(attr.name().local_part());
        out.push_str("=\"");
        out.push_str(&encode_double_quoted_attribute(attr.value()));
        out.push('"');
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&name.as_str()) {
        return;
    }

    for child in el.children() {
        match child {
            ChildOfElement::Element(child) => write_element(out, child),
            ChildOfElement::Text(text) => out.push_str(&encode_text(text.text())),
            ChildOfElement::Comment(c) => write_comment(out, c.text()),
            ChildOfElement::ProcessingInstruction(_) => {}
        }
    }

    out.push_str("</");
    out.push_str(&name);
    out.push('>');
}

fn write_comment(out: &mut String, text: &str) {
    out.push_str("<!--");
    out.push_str(text);
    out.push_str("-->");
}
