// ABOUTME: Built-in text pipes: trimming, case, whitespace, entities, HTML cleanup, URLs and regex replace.
// ABOUTME: Numeric and date pipes live in numeric.rs and time.rs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, bail, Context};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use url::Url;

use crate::pipes::registry::{register_aliased, PipeRegistry};
use crate::pipes::{Pipe, PipeContext};
use crate::result::Value;

type PipeResult = anyhow::Result<Value>;

pub(crate) fn register_all(registry: &PipeRegistry) {
    registry.register("trim", trim);
    registry.register("lowercase", lowercase);
    registry.register("uppercase", uppercase);
    registry.register("titlecase", titlecase);
    registry.register("collapse_whitespace", collapse_whitespace);
    registry.register("decode_entities", decode_entities);
    registry.register("strip_html", strip_html);
    registry.register("sanitize_html", sanitize_html);
    registry.register("markdown", markdown);
    registry.register("replace", replace);
    registry.register("prefix", prefix);
    registry.register("suffix", suffix);
    registry.register("default", default_value);
    registry.register("split", split);

    register_aliased(registry, &["url", "absolute_url"], Arc::new(absolute_url) as Arc<dyn Pipe>);
    register_aliased(registry, &["regex_replace", "regex"], Arc::new(regex_replace) as Arc<dyn Pipe>);
}

fn text(s: impl Into<String>) -> PipeResult {
    Ok(Value::Text(s.into()))
}

fn param<'a>(params: &'a [String], index: usize, what: &str) -> anyhow::Result<&'a str> {
    params
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing parameter {} ({})", index + 1, what))
}

fn trim(input: &str, _: &[String], _: &PipeContext) -> PipeResult {
    text(input.trim())
}

fn lowercase(input: &str, _: &[String], _: &PipeContext) -> PipeResult {
    text(input.to_lowercase())
}

fn uppercase(input: &str, _: &[String], _: &PipeContext) -> PipeResult {
    text(input.to_uppercase())
}

/// Uppercases the first letter of each whitespace-separated word and
/// lowercases the rest. Whitespace runs are collapsed.
fn titlecase(input: &str, _: &[String], _: &PipeContext) -> PipeResult {
    let words: Vec<String> = input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect();
    text(words.join(" "))
}

fn collapse_whitespace(input: &str, _: &[String], _: &PipeContext) -> PipeResult {
    text(input.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn decode_entities(input: &str, _: &[String], _: &PipeContext) -> PipeResult {
    text(html_escape::decode_html_entities(input))
}

/// Removes every tag (and the content of script/style), leaving decoded text.
fn strip_html(input: &str, _: &[String], _: &PipeContext) -> PipeResult {
    let mut builder = ammonia::Builder::empty();
    builder.clean_content_tags(["script", "style"].iter().copied().collect());
    let cleaned = builder.clean(input).to_string();
    text(html_escape::decode_html_entities(&cleaned).trim())
}

fn sanitize_html(input: &str, _: &[String], _: &PipeContext) -> PipeResult {
    text(ammonia::clean(input))
}

fn markdown(input: &str, _: &[String], _: &PipeContext) -> PipeResult {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "noscript"])
        .build();
    let md = converter
        .convert(input)
        .map_err(|e| anyhow!("markdown conversion failed: {}", e))?;
    text(md.trim())
}

/// Literal replacement of every occurrence of the first parameter.
fn replace(input: &str, params: &[String], _: &PipeContext) -> PipeResult {
    let from = param(params, 0, "text to replace")?;
    if from.is_empty() {
        bail!("text to replace must not be empty");
    }
    let to = params.get(1).map(String::as_str).unwrap_or("");
    text(input.replace(from, to))
}

fn prefix(input: &str, params: &[String], _: &PipeContext) -> PipeResult {
    text(format!("{}{}", param(params, 0, "prefix")?, input))
}

fn suffix(input: &str, params: &[String], _: &PipeContext) -> PipeResult {
    text(format!("{}{}", input, param(params, 0, "suffix")?))
}

/// Substitutes the first parameter when the input is blank.
fn default_value(input: &str, params: &[String], _: &PipeContext) -> PipeResult {
    if input.trim().is_empty() {
        text(param(params, 0, "default value")?)
    } else {
        text(input)
    }
}

/// Splits on the first parameter and returns the part at the second parameter
/// (default 0; negative counts from the end). Out of range yields empty text.
fn split(input: &str, params: &[String], _: &PipeContext) -> PipeResult {
    let separator = param(params, 0, "separator")?;
    if separator.is_empty() {
        bail!("separator must not be empty");
    }
    let index: i64 = match params.get(1) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid index {:?}", raw))?,
        None => 0,
    };
    let parts: Vec<&str> = input.split(separator).collect();
    let position = if index < 0 {
        parts.len() as i64 + index
    } else {
        index
    };
    let part = usize::try_from(position)
        .ok()
        .and_then(|i| parts.get(i))
        .copied()
        .unwrap_or("");
    text(part.trim())
}

/// Resolves a relative reference against the page URL.
///
/// Absolute URLs and blank input pass through unchanged, as does everything
/// when no page URL is known.
fn absolute_url(input: &str, _: &[String], ctx: &PipeContext) -> PipeResult {
    let trimmed = input.trim();
    if trimmed.is_empty() || Url::parse(trimmed).is_ok() {
        return text(input);
    }
    match &ctx.base_url {
        Some(base) => {
            let resolved = base
                .join(trimmed)
                .with_context(|| format!("cannot resolve {:?} against {}", trimmed, base))?;
            text(resolved.to_string())
        }
        None => text(input),
    }
}

static REGEX_CACHE: Lazy<RwLock<HashMap<(String, bool), Regex>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

fn cached_regex(pattern: &str, case_insensitive: bool) -> anyhow::Result<Regex> {
    let key = (pattern.to_string(), case_insensitive);
    if let Some(re) = REGEX_CACHE
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(&key)
    {
        return Ok(re.clone());
    }
    let re = RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .with_context(|| format!("invalid pattern {:?}", pattern))?;
    REGEX_CACHE
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .insert(key, re.clone());
    Ok(re)
}

/// Global regex substitution. Params: pattern, replacement (`$1` refers to
/// groups), and an optional flag (`i` or `true`) for case-insensitive matching.
fn regex_replace(input: &str, params: &[String], _: &PipeContext) -> PipeResult {
    let pattern = param(params, 0, "pattern")?;
    let replacement = params.get(1).map(String::as_str).unwrap_or("");
    let case_insensitive = params
        .get(2)
        .map(|flag| matches!(flag.trim().to_ascii_lowercase().as_str(), "i" | "true"))
        .unwrap_or(false);
    let re = cached_regex(pattern, case_insensitive)?;
    text(re.replace_all(input, replacement))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(pipe: fn(&str, &[String], &PipeContext) -> PipeResult, input: &str, params: &[&str]) -> String {
        let params: Vec<String> = params.iter().map(|s| s.to_string()).collect();
        pipe(input, &params, &PipeContext::new()).unwrap().to_string()
    }

    #[test]
    fn text_pipes() {
        assert_eq!(run(trim, "  a b \n", &[]), "a b");
        assert_eq!(run(lowercase, "HeLLo", &[]), "hello");
        assert_eq!(run(uppercase, "HeLLo", &[]), "HELLO");
        assert_eq!(run(titlecase, "the  QUICK fox", &[]), "The Quick Fox");
        assert_eq!(run(collapse_whitespace, " a \n\t b  c ", &[]), "a b c");
        assert_eq!(run(decode_entities, "Tom &amp; Jerry &#8217;", &[]), "Tom & Jerry \u{2019}");
    }

    #[test]
    fn html_pipes() {
        assert_eq!(
            run(strip_html, "<p>Hello <b>world</b> &amp; co<script>x()</script></p>", &[]),
            "Hello world & co"
        );
        let sanitized = run(sanitize_html, r#"<p onclick="x()">Hi<script>bad()</script></p>"#, &[]);
        assert_eq!(sanitized, "<p>Hi</p>");
        let md = run(markdown, "<h1>Title</h1><p>Some <strong>bold</strong></p>", &[]);
        assert!(md.starts_with("# Title"));
        assert!(md.contains("**bold**"));
    }

    #[test]
    fn parameterized_pipes() {
        assert_eq!(run(replace, "a-b-c", &["-", "+"]), "a+b+c");
        assert_eq!(run(replace, "a-b-c", &["-"]), "abc");
        assert_eq!(run(prefix, "42", &["#"]), "#42");
        assert_eq!(run(suffix, "42", &["%"]), "42%");
        assert_eq!(run(default_value, "  ", &["n/a"]), "n/a");
        assert_eq!(run(default_value, "x", &["n/a"]), "x");
        assert_eq!(run(split, "a, b, c", &[","]), "a");
        assert_eq!(run(split, "a, b, c", &[",", "1"]), "b");
        assert_eq!(run(split, "a, b, c", &[",", "-1"]), "c");
        assert_eq!(run(split, "a, b, c", &[",", "9"]), "");
    }

    #[test]
    fn missing_params_are_errors() {
        let ctx = PipeContext::new();
        assert!(prefix("x", &[], &ctx).is_err());
        assert!(replace("x", &[], &ctx).is_err());
        assert!(regex_replace("x", &[], &ctx).is_err());
        assert!(split("x", &["|".into(), "one".into()], &ctx).is_err());
    }

    #[test]
    fn absolute_url_resolution() {
        let ctx = PipeContext::with_base_url(Url::parse("https://example.com/list/page/2").unwrap());
        let resolve = |input: &str| absolute_url(input, &[], &ctx).unwrap().to_string();
        assert_eq!(resolve("/item/7"), "https://example.com/item/7");
        assert_eq!(resolve("3"), "https://example.com/list/page/3");
        assert_eq!(resolve("?page=3"), "https://example.com/list/page/2?page=3");
        assert_eq!(resolve("https://other.org/x"), "https://other.org/x");
        assert_eq!(resolve("mailto:a@b.c"), "mailto:a@b.c");
        assert_eq!(resolve(""), "");

        let no_base = absolute_url("/item/7", &[], &PipeContext::new()).unwrap();
        assert_eq!(no_base.to_string(), "/item/7");
    }

    #[test]
    fn regex_replace_is_global_with_optional_case_flag() {
        assert_eq!(run(regex_replace, "a1b22c333", &[r"\d+", "#"]), "a#b#c#");
        assert_eq!(run(regex_replace, "Price: USD 10", &["usd", "$"]), "Price: USD 10");
        assert_eq!(run(regex_replace, "Price: USD 10", &["usd", "$", "i"]), "Price: $ 10");
        assert_eq!(
            run(regex_replace, "2024-03-01", &[r"(\d+)-(\d+)-(\d+)", "$3/$2/$1"]),
            "01/03/2024"
        );
        assert!(regex_replace("x", &["(".into()], &PipeContext::new()).is_err());
    }
}
