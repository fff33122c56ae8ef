// ABOUTME: Per-thread cache of compiled XPath expressions.
// ABOUTME: Eliminates repeated parsing of the same selector across containers and pages.

//! Selector caching for efficient repeated DOM queries.
//!
//! Parsing an XPath expression costs more than evaluating it against a small
//! container, and one extraction call evaluates every field selector once per
//! container. Compiled expressions are not `Send`, so the cache lives per thread.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use sxd_xpath::{Factory, XPath};

use crate::error::ScrapeError;

thread_local! {
    /// Compiled selectors keyed by source text; `None` marks an invalid expression.
    static SELECTOR_CACHE: RefCell<HashMap<String, Option<Rc<XPath>>>> =
        RefCell::new(HashMap::new());
}

/// Gets or compiles an XPath expression, caching the result.
///
/// Returns `None` if the expression does not compile. Invalid expressions are
/// cached too, so a bad selector is parsed once per thread.
pub fn get_or_compile(expression: &str) -> Option<Rc<XPath>> {
    SELECTOR_CACHE.with(|cache| {
        if let Some(cached) = cache.borrow().get(expression) {
            return cached.clone();
        }
        let compiled = compile_strict(expression).ok().map(Rc::new);
        cache
            .borrow_mut()
            .insert(expression.to_string(), compiled.clone());
        compiled
    })
}

/// Compiles an expression, reporting why it is invalid.
///
/// Used by configuration validation; extraction goes through [`get_or_compile`].
pub fn compile_strict(expression: &str) -> Result<XPath, ScrapeError> {
    if expression.trim().is_empty() {
        return Err(ScrapeError::selector(
            expression,
            "Compile",
            Some(anyhow::anyhow!("empty selector")),
        ));
    }
    Factory::new()
        .build(expression)
        .map_err(|e| {
            ScrapeError::selector(
                expression,
                "Compile",
                Some(anyhow::anyhow!("invalid XPath: {:?}", e)),
            )
        })?
        .ok_or_else(|| {
            ScrapeError::selector(
                expression,
                "Compile",
                Some(anyhow::anyhow!("XPath compiled to nothing")),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_selector_is_cached() {
        let xpath = get_or_compile("//div[@class='container']");
        assert!(xpath.is_some());

        let xpath2 = get_or_compile("//div[@class='container']");
        assert!(Rc::ptr_eq(&xpath.unwrap(), &xpath2.unwrap()));
    }

    #[test]
    fn test_invalid_selector_returns_none() {
        assert!(get_or_compile("//div[").is_none());
        // Invalid selectors are also cached (as None)
        assert!(get_or_compile("//div[").is_none());
    }

    #[test]
    fn test_compile_strict_reports_selector_error() {
        let err = compile_strict("//a[@href").unwrap_err();
        assert!(err.is_selector());
        assert!(err.to_string().contains("//a[@href"));

        assert!(compile_strict("   ").unwrap_err().is_selector());
        assert!(compile_strict(".//h2/text()").is_ok());
    }
}
