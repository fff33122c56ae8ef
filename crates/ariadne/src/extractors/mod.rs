// ABOUTME: Pattern extraction: descriptors, selector resolution, field resolution and record assembly.
// ABOUTME: Also hosts the compiled-selector cache and the JSON configuration loader.

//! Pattern extraction module.
//!
//! Submodules:
//! - `compiled`: per-thread cache of compiled XPath expressions.
//! - `select`: first-match-wins resolution of ordered selector lists.
//! - `descriptor`: field/container descriptors and their validation.
//! - `fields`: per-field primary/alternative resolution and multiplicity.
//! - `records`: container scoping and record assembly.
//! - `loader`: reading scrape configurations from JSON.

pub mod compiled;
pub mod descriptor;
pub mod fields;
pub mod loader;
pub mod records;
pub mod select;

pub use descriptor::{ContainerDescriptor, ContentMode, FieldDescriptor, Multiplicity, Pattern};
pub use records::{extract_records, Extractor};
pub use select::{resolve, resolve_with_fallback};
