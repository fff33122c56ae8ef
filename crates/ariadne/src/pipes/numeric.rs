// ABOUTME: Numeric pipes: integer/float parsing, K/M/B/T shorthand expansion, and "N units ago" rendering.
// ABOUTME: Shorthand expansion shifts decimal digits instead of multiplying floats, so results are exact.

use std::sync::Arc;

use anyhow::{anyhow, bail};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::pipes::registry::{register_aliased, PipeRegistry};
use crate::pipes::{Pipe, PipeContext};
use crate::result::Value;

pub(crate) fn register_all(registry: &PipeRegistry) {
    register_aliased(registry, &["int", "integer"], Arc::new(parse_int) as Arc<dyn Pipe>);
    register_aliased(registry, &["float", "number"], Arc::new(parse_float) as Arc<dyn Pipe>);
    register_aliased(
        registry,
        &["human_duration", "time_ago"],
        Arc::new(time_ago) as Arc<dyn Pipe>,
    );
    register_aliased(
        registry,
        &["shorthand", "normalize_number"],
        Arc::new(shorthand) as Arc<dyn Pipe>,
    );
}

/// Removes currency dollar signs and thousands separators.
fn strip_number_noise(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect::<String>()
        .trim()
        .to_string()
}

fn parse_int(input: &str, _: &[String], _: &PipeContext) -> anyhow::Result<Value> {
    let cleaned = strip_number_noise(input);
    cleaned
        .parse::<i64>()
        .map(Value::Integer)
        .map_err(|e| anyhow!("not an integer: {:?} ({})", cleaned, e))
}

fn parse_float(input: &str, _: &[String], _: &PipeContext) -> anyhow::Result<Value> {
    let cleaned = strip_number_noise(input);
    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Value::Float(n)),
        Ok(_) => bail!("not a finite number: {:?}", cleaned),
        Err(e) => bail!("not a number: {:?} ({})", cleaned, e),
    }
}

fn time_ago(input: &str, _: &[String], _: &PipeContext) -> anyhow::Result<Value> {
    let trimmed = input.trim();
    let seconds: i64 = match trimmed.parse::<i64>() {
        Ok(n) => n,
        Err(_) => match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() => f.trunc() as i64,
            _ => bail!("not a number of seconds: {:?}", trimmed),
        },
    };
    if seconds < 0 {
        bail!("negative duration: {}", seconds);
    }
    Ok(Value::Text(human_duration(seconds as u64)))
}

/// Renders a duration in seconds as "N seconds/minutes/hours/days ago".
///
/// Units use integer division; the unit is singular only when N is exactly 1.
pub fn human_duration(seconds: u64) -> String {
    let (count, unit) = if seconds < 60 {
        (seconds, "second")
    } else if seconds < 60 * 60 {
        (seconds / 60, "minute")
    } else if seconds < 24 * 60 * 60 {
        (seconds / (60 * 60), "hour")
    } else {
        (seconds / (24 * 60 * 60), "day")
    };
    if count == 1 {
        format!("{} {} ago", count, unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}

static SHORTHAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(\d+)(?:\.(\d+))?\s*([kmbt])$").unwrap());

fn shorthand(input: &str, _: &[String], _: &PipeContext) -> anyhow::Result<Value> {
    Ok(Value::Text(
        expand_shorthand(input).unwrap_or_else(|| input.to_string()),
    ))
}

/// Expands `1.5K`, `2m`, `3B`, `1T` into plain digits.
///
/// Returns `None` when the input is not shorthand (including input that is
/// already a plain number), in which case callers keep it unchanged.
pub fn expand_shorthand(input: &str) -> Option<String> {
    let cleaned = strip_number_noise(input);
    let caps = SHORTHAND_RE.captures(&cleaned)?;
    let whole = caps.get(1)?.as_str();
    let fraction = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let zeros = match caps.get(3)?.as_str().to_ascii_lowercase().as_str() {
        "k" => 3,
        "m" => 6,
        "b" => 9,
        "t" => 12,
        _ => return None,
    };

    let mut digits = format!("{}{}", whole, fraction);
    let point = whole.len() + zeros;
    if digits.len() < point {
        digits.push_str(&"0".repeat(point - digits.len()));
    }
    let (int_part, frac_part) = digits.split_at(point);
    let int_part = int_part.trim_start_matches('0');
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    let frac_part = frac_part.trim_end_matches('0');

    if frac_part.is_empty() {
        Some(int_part.to_string())
    } else {
        Some(format!("{}.{}", int_part, frac_part))
    }
}
