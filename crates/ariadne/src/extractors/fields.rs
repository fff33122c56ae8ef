// ABOUTME: Resolves one field inside a scope: primary selectors, then alternatives, judged after pipes.
// ABOUTME: Combines matched nodes according to the field's multiplicity policy.

//! Field resolution.
//!
//! Key behaviors:
//! - The primary selector list is resolved as a group (first matching
//!   expression wins). Its nodes run through the pipe chain and are combined.
//! - When the combined, post-pipe value is empty, each alternative selector is
//!   tried on its own, in order; the first non-empty result wins.
//! - When everything is empty the field is absent (`None`), never an empty string.
//! - Entries that are empty after the pipe chain are dropped before joining or
//!   collecting into a list.
//! - Pipe failures propagate; selector failures never do.

use crate::dom::{node_markup, node_text, Node};
use crate::error::PipeError;
use crate::extractors::descriptor::{ContentMode, FieldDescriptor, Multiplicity};
use crate::extractors::select::resolve;
use crate::pipes::{PipeContext, PipeRegistry};
use crate::result::{FieldValue, Value};

/// Reads a node in the requested representation.
pub fn node_content(node: Node<'_>, mode: ContentMode) -> String {
    match mode {
        ContentMode::Text => node_text(node),
        ContentMode::Html => node_markup(node),
    }
}

/// Resolves `field` within `scope`.
///
/// Returns `Ok(None)` when neither the primary selectors nor any alternative
/// produce a non-empty value.
pub fn resolve_field(
    field: &FieldDescriptor,
    scope: Node<'_>,
    registry: &PipeRegistry,
    ctx: &PipeContext,
) -> Result<Option<FieldValue>, PipeError> {
    let nodes = resolve(&field.selector, scope);
    if let Some(value) = combine(field, &nodes, registry, ctx)? {
        return Ok(Some(value));
    }

    for alternative in &field.alternatives {
        let nodes = resolve(std::slice::from_ref(alternative), scope);
        if let Some(value) = combine(field, &nodes, registry, ctx)? {
            tracing::debug!(
                field = %field.key,
                selector = %alternative,
                "field resolved by alternative selector"
            );
            return Ok(Some(value));
        }
    }

    Ok(None)
}

/// Applies the pipe chain to matched nodes and combines them. `None` means empty.
fn combine(
    field: &FieldDescriptor,
    nodes: &[Node<'_>],
    registry: &PipeRegistry,
    ctx: &PipeContext,
) -> Result<Option<FieldValue>, PipeError> {
    let process =
        |node: &Node<'_>| registry.apply(&field.pipes, &node_content(*node, field.content), ctx);

    let value = match field.multiple {
        Multiplicity::First => match nodes.first() {
            Some(node) => FieldValue::One(process(node)?),
            None => return Ok(None),
        },
        Multiplicity::Array => {
            let mut values = Vec::with_capacity(nodes.len());
            for node in nodes {
                let value = process(node)?;
                if !value.is_empty() {
                    values.push(value);
                }
            }
            FieldValue::Many(values)
        }
        Multiplicity::Space | Multiplicity::Comma => {
            let separator = field.multiple.separator().unwrap_or(" ");
            let mut parts = Vec::with_capacity(nodes.len());
            for node in nodes {
                let value = process(node)?;
                if !value.is_empty() {
                    parts.push(value.to_string());
                }
            }
            FieldValue::One(Value::Text(parts.join(separator)))
        }
    };

    if value.is_empty() {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}
