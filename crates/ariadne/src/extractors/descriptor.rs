// ABOUTME: Declarative extraction patterns: field and container descriptors with fallback selectors.
// ABOUTME: Deserializable from JSON; validate() catches configuration errors before any extraction runs.

//! Pattern descriptors.
//!
//! A [`Pattern`] names an optional repeating container and the fields read from
//! each container. Every selector list is ordered; the first expression that
//! matches anything wins. Alternatives are consulted only when the primary
//! selectors produce nothing after the pipe chain has run.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ScrapeError;
use crate::extractors::compiled::compile_strict;
use crate::pipes::PipeInvocation;

/// Which representation of a matched node is fed to the pipe chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    /// Text content (XPath string value).
    #[default]
    Text,
    /// Serialized outer markup.
    #[serde(alias = "markup")]
    Html,
}

/// How multiple matched nodes combine into one field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Multiplicity {
    /// Only the first matched node.
    #[default]
    First,
    /// Every matched node, as a list in document order.
    #[serde(alias = "all", alias = "list")]
    Array,
    /// Every matched node, joined with a single space.
    Space,
    /// Every matched node, joined with `", "`.
    Comma,
}

impl Multiplicity {
    /// The join separator for the joining policies.
    pub fn separator(self) -> Option<&'static str> {
        match self {
            Multiplicity::Space => Some(" "),
            Multiplicity::Comma => Some(", "),
            Multiplicity::First | Multiplicity::Array => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Accepts `"//a"` as well as `["//a", "//b"]`.
pub(crate) fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

/// Configuration for extracting a single field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Output key, unique within a record.
    pub key: String,
    /// Primary selectors, tried in order.
    #[serde(default, alias = "selectors", deserialize_with = "one_or_many")]
    pub selector: Vec<String>,
    /// Fallback selectors, each tried on its own after the primaries come up empty.
    #[serde(default, alias = "alternative_selectors", deserialize_with = "one_or_many")]
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub content: ContentMode,
    #[serde(default)]
    pub multiple: Multiplicity,
    #[serde(default)]
    pub pipes: Vec<PipeInvocation>,
}

impl FieldDescriptor {
    pub fn new(key: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            selector: vec![selector.into()],
            ..Default::default()
        }
    }

    pub fn with_selectors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selector = selectors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_alternatives<I, S>(mut self, alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alternatives = alternatives.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_content(mut self, content: ContentMode) -> Self {
        self.content = content;
        self
    }

    pub fn with_multiple(mut self, multiple: Multiplicity) -> Self {
        self.multiple = multiple;
        self
    }

    pub fn with_pipe(mut self, pipe: PipeInvocation) -> Self {
        self.pipes.push(pipe);
        self
    }

    /// Checks the key, the primary selector list and pipe names.
    pub fn validate(&self) -> Result<(), ScrapeError> {
        if self.key.trim().is_empty() {
            return Err(ScrapeError::config("Validate", "field with an empty key"));
        }
        validate_selector_list(&self.selector, &format!("field {:?}", self.key))?;
        if let Some(pipe) = self.pipes.iter().find(|p| p.name.trim().is_empty()) {
            return Err(ScrapeError::config(
                "Validate",
                format!("field {:?} has a pipe with an empty name ({:?})", self.key, pipe),
            ));
        }
        Ok(())
    }
}

/// Repeating element that scopes one output record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerDescriptor {
    #[serde(default, alias = "selectors", deserialize_with = "one_or_many")]
    pub selector: Vec<String>,
    #[serde(default, alias = "alternative_selectors", deserialize_with = "one_or_many")]
    pub alternatives: Vec<String>,
    /// When set, each record also carries the container's own content under this key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_key: Option<String>,
    #[serde(default)]
    pub content: ContentMode,
}

impl ContainerDescriptor {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: vec![selector.into()],
            ..Default::default()
        }
    }

    pub fn with_alternatives<I, S>(mut self, alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alternatives = alternatives.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_value_key(mut self, key: impl Into<String>) -> Self {
        self.value_key = Some(key.into());
        self
    }

    pub fn validate(&self) -> Result<(), ScrapeError> {
        validate_selector_list(&self.selector, "container")?;
        if let Some(key) = &self.value_key {
            if key.trim().is_empty() {
                return Err(ScrapeError::config("Validate", "container value key is empty"));
            }
        }
        Ok(())
    }
}

/// A complete extraction pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerDescriptor>,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl Pattern {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self {
            container: None,
            fields,
        }
    }

    pub fn with_container(mut self, container: ContainerDescriptor) -> Self {
        self.container = Some(container);
        self
    }

    /// Structural validation; run before every extraction.
    pub fn validate(&self) -> Result<(), ScrapeError> {
        validate_parts(self.container.as_ref(), &self.fields)
    }

    /// [`Pattern::validate`] plus compilation of every alternative selector,
    /// reporting the first one that is not valid XPath.
    pub fn validate_strict(&self) -> Result<(), ScrapeError> {
        self.validate()?;
        if let Some(container) = &self.container {
            compile_all(&container.alternatives)?;
        }
        for field in &self.fields {
            compile_all(&field.alternatives)?;
        }
        Ok(())
    }
}

/// Validates a container/field combination that is not wrapped in a [`Pattern`].
pub(crate) fn validate_parts(
    container: Option<&ContainerDescriptor>,
    fields: &[FieldDescriptor],
) -> Result<(), ScrapeError> {
    if fields.is_empty() {
        return Err(ScrapeError::config("Validate", "no fields configured"));
    }
    let mut seen = HashSet::new();
    for field in fields {
        field.validate()?;
        if !seen.insert(field.key.as_str()) {
            return Err(ScrapeError::config(
                "Validate",
                format!("duplicate field key {:?}", field.key),
            ));
        }
    }
    if let Some(container) = container {
        container.validate()?;
        if let Some(key) = &container.value_key {
            if seen.contains(key.as_str()) {
                return Err(ScrapeError::config(
                    "Validate",
                    format!("container value key {:?} clashes with a field key", key),
                ));
            }
        }
    }
    Ok(())
}

pub(crate) fn validate_selector_list(selectors: &[String], owner: &str) -> Result<(), ScrapeError> {
    if selectors.is_empty() {
        return Err(ScrapeError::config(
            "Validate",
            format!("{} has no selector", owner),
        ));
    }
    if selectors.iter().any(|s| s.trim().is_empty()) {
        return Err(ScrapeError::config(
            "Validate",
            format!("{} has an empty selector", owner),
        ));
    }
    Ok(())
}

pub(crate) fn compile_all(selectors: &[String]) -> Result<(), ScrapeError> {
    for selector in selectors {
        compile_strict(selector)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn deserializes_string_or_list_selectors() {
        let field: FieldDescriptor = serde_json::from_str(
            r#"{"key": "name", "selector": ".//h2/text()", "alternatives": [".//h1/text()", ".//h3/text()"]}"#,
        )
        .unwrap();
        assert_eq!(field.selector, vec![".//h2/text()"]);
        assert_eq!(field.alternatives.len(), 2);
        assert_eq!(field.content, ContentMode::Text);
        assert_eq!(field.multiple, Multiplicity::First);

        let field: FieldDescriptor = serde_json::from_str(
            r##"{"key": "tags", "selectors": ["//a", "//b"], "multiple": "comma", "content": "html",
                "pipes": ["trim", {"name": "prefix", "params": ["#"]}]}"##,
        )
        .unwrap();
        assert_eq!(field.selector, vec!["//a", "//b"]);
        assert_eq!(field.multiple, Multiplicity::Comma);
        assert_eq!(field.content, ContentMode::Html);
        assert_eq!(
            field.pipes,
            vec![
                PipeInvocation::new("trim"),
                PipeInvocation::with_params("prefix", ["#"])
            ]
        );
    }

    #[test]
    fn multiplicity_separators_and_aliases() {
        assert_eq!(Multiplicity::Space.separator(), Some(" "));
        assert_eq!(Multiplicity::Comma.separator(), Some(", "));
        assert_eq!(Multiplicity::Array.separator(), None);
        let m: Multiplicity = serde_json::from_str(r#""all""#).unwrap();
        assert_eq!(m, Multiplicity::Array);
        assert!(serde_json::from_str::<Multiplicity>(r#""several""#).is_err());
    }

    #[test]
    fn validate_rejects_structural_errors() {
        assert!(Pattern::new(vec![]).validate().unwrap_err().is_config());

        let empty_key = Pattern::new(vec![FieldDescriptor::new(" ", "//a")]);
        assert!(empty_key.validate().unwrap_err().is_config());

        let no_selector = Pattern::new(vec![FieldDescriptor {
            key: "a".into(),
            ..Default::default()
        }]);
        let err = no_selector.validate().unwrap_err();
        assert!(err.to_string().contains("has no selector"));

        let dup = Pattern::new(vec![
            FieldDescriptor::new("a", "//a"),
            FieldDescriptor::new("a", "//b"),
        ]);
        assert!(dup.validate().unwrap_err().to_string().contains("duplicate"));

        let container_without_selector =
            Pattern::new(vec![FieldDescriptor::new("a", "//a")]).with_container(ContainerDescriptor::default());
        assert!(container_without_selector.validate().is_err());

        let clash = Pattern::new(vec![FieldDescriptor::new("a", "//a")])
            .with_container(ContainerDescriptor::new("//div").with_value_key("a"));
        assert!(clash.validate().unwrap_err().to_string().contains("clashes"));
    }

    #[test]
    fn strict_validation_compiles_alternatives_only() {
        let lenient_primary = Pattern::new(vec![FieldDescriptor::new("a", "//a[")]);
        assert!(lenient_primary.validate_strict().is_ok());

        let bad_alternative =
            Pattern::new(vec![FieldDescriptor::new("a", "//a").with_alternatives(["//b[@x"])]);
        assert!(bad_alternative.validate().is_ok());
        let err = bad_alternative.validate_strict().unwrap_err();
        assert!(err.is_selector());

        let bad_container_alternative = Pattern::new(vec![FieldDescriptor::new("a", "//a")])
            .with_container(ContainerDescriptor::new("//div").with_alternatives(["//li["]));
        assert!(bad_container_alternative.validate_strict().unwrap_err().is_selector());
    }
}
