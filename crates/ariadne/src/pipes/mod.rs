// ABOUTME: Pipe pipeline: named, chainable string transformations applied to extracted values.
// ABOUTME: Defines the Pipe trait, the invocation shape used in configs, and the process-wide registry.

//! Pipe pipeline.
//!
//! A pipe turns one input string (plus an optional parameter list) into a
//! [`Value`]. Pipes are looked up by name in a [`PipeRegistry`]; the process-wide
//! registry is created on first use with every built-in already registered, so
//! there is no load-order dependency between registration and lookup.
//!
//! Chains run strictly in order. A typed result (integer, float, time) is
//! stringified before it feeds the next pipe; only the last pipe's type survives.

mod builtin;
mod numeric;
mod registry;
mod time;

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::result::Value;

pub use numeric::{expand_shorthand, human_duration};
pub use registry::PipeRegistry;
pub use time::parse_date;

/// A named string transformation.
///
/// Implemented for any `Fn(&str, &[String], &PipeContext) -> anyhow::Result<Value>`,
/// so closures can be registered directly.
pub trait Pipe: Send + Sync {
    fn process(&self, input: &str, params: &[String], ctx: &PipeContext) -> anyhow::Result<Value>;
}

impl<F> Pipe for F
where
    F: Fn(&str, &[String], &PipeContext) -> anyhow::Result<Value> + Send + Sync,
{
    fn process(&self, input: &str, params: &[String], ctx: &PipeContext) -> anyhow::Result<Value> {
        self(input, params, ctx)
    }
}

/// Ambient state available to every pipe: the URL of the page being processed.
#[derive(Debug, Clone, Default)]
pub struct PipeContext {
    pub base_url: Option<Url>,
}

impl PipeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(base_url: Url) -> Self {
        Self {
            base_url: Some(base_url),
        }
    }
}

/// One step of a pipe chain: a pipe name and its parameters.
///
/// Deserializes from either `"trim"` or `{"name": "regex_replace", "params": ["a", "b"]}`.
/// Non-string parameters (numbers, booleans) are kept in their JSON text form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipeInvocation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
}

impl PipeInvocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params<I, S>(name: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }
}

impl<'de> Deserialize<'de> for PipeInvocation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct InvocationVisitor;

        impl<'de> Visitor<'de> for InvocationVisitor {
            type Value = PipeInvocation;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a pipe name or an object with `name` and `params`")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(PipeInvocation::new(v))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut name: Option<String> = None;
                let mut params: Vec<String> = Vec::new();
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "name" => name = Some(map.next_value()?),
                        "params" | "args" => {
                            let raw: Vec<serde_json::Value> = map.next_value()?;
                            params = raw.into_iter().map(param_to_string).collect();
                        }
                        _ => {
                            map.next_value::<de::IgnoredAny>()?;
                        }
                    }
                }
                let name = name.ok_or_else(|| de::Error::missing_field("name"))?;
                Ok(PipeInvocation { name, params })
            }
        }

        deserializer.deserialize_any(InvocationVisitor)
    }
}

fn param_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

static GLOBAL_REGISTRY: Lazy<Arc<PipeRegistry>> =
    Lazy::new(|| Arc::new(PipeRegistry::with_builtins()));

/// The process-wide registry, pre-populated with the built-in pipes.
pub fn global_registry() -> Arc<PipeRegistry> {
    Arc::clone(&GLOBAL_REGISTRY)
}

/// Registers `pipe` under `name` in the process-wide registry, replacing any
/// pipe already registered under that name.
pub fn register_pipe(name: impl Into<String>, pipe: impl Pipe + 'static) {
    GLOBAL_REGISTRY.register(name, pipe);
}
