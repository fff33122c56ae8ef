// ABOUTME: Document model for selector evaluation over HTML and XML input.
// ABOUTME: Re-exports Document, the XPath node type, and node content accessors.

//! Document model.
//!
//! HTML is parsed with the tolerant HTML5 parser and converted into an
//! `sxd_document` tree so the same XPath engine serves HTML and XML input.
//! The rest of the crate only reads nodes through the accessors in [`markup`].

pub mod document;
pub mod markup;

pub use document::{Document, DocumentKind};
pub use markup::{node_attribute, node_markup, node_text};

/// A node of a parsed [`Document`], as returned by selector evaluation.
pub type Node<'d> = sxd_xpath::nodeset::Node<'d>;
