// ABOUTME: Selector resolution: evaluates ordered XPath candidates against a scope node.
// ABOUTME: The first candidate matching anything wins; invalid candidates count as no match.

//! Selector resolution.
//!
//! Key behaviors:
//! - Candidates are tried in order; the first one yielding at least one node wins
//!   and its whole node set is returned, in document order. Results of different
//!   candidates are never merged.
//! - A candidate that does not compile, fails to evaluate, or evaluates to a
//!   non-node value (a number, string or boolean) is treated as matching nothing.
//! - Relative expressions (`.//h2`) are evaluated with the scope node as context.

use sxd_xpath::{Context, Value};

use crate::dom::Node;
use crate::extractors::compiled::get_or_compile;

/// Resolves `candidates` against `scope`, returning the nodes of the first
/// candidate that matches anything.
pub fn resolve<'d, S: AsRef<str>>(candidates: &[S], scope: Node<'d>) -> Vec<Node<'d>> {
    for candidate in candidates {
        let nodes = evaluate(candidate.as_ref(), scope);
        if !nodes.is_empty() {
            return nodes;
        }
    }
    Vec::new()
}

/// Resolves `primary` and, when it matches nothing, `alternatives`.
///
/// This is the fallback chain shared by containers and pagination links.
pub fn resolve_with_fallback<'d, S: AsRef<str>>(
    primary: &[S],
    alternatives: &[S],
    scope: Node<'d>,
) -> Vec<Node<'d>> {
    let nodes = resolve(primary, scope);
    if !nodes.is_empty() {
        return nodes;
    }
    resolve(alternatives, scope)
}

/// Evaluates a single expression. Never fails.
fn evaluate<'d>(expression: &str, scope: Node<'d>) -> Vec<Node<'d>> {
    let xpath = match get_or_compile(expression) {
        Some(x) => x,
        None => {
            tracing::debug!(selector = expression, "skipping selector that does not compile");
            return Vec::new();
        }
    };

    let context = Context::new();
    match xpath.evaluate(&context, scope) {
        Ok(Value::Nodeset(nodes)) => nodes.document_order(),
        Ok(_) => {
            tracing::debug!(selector = expression, "selector evaluated to a non-node value");
            Vec::new()
        }
        Err(e) => {
            tracing::debug!(selector = expression, error = ?e, "selector evaluation failed");
            Vec::new()
        }
    }
}
