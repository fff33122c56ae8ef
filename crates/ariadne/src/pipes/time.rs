// ABOUTME: Date parsing pipe: strftime layouts with optional IANA timezone, or format detection.
// ABOUTME: Without a layout it tries RFC 3339, RFC 2822, common loose layouts, then dateparser.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::pipes::registry::{register_aliased, PipeRegistry};
use crate::pipes::{Pipe, PipeContext};
use crate::result::Value;

pub(crate) fn register_all(registry: &PipeRegistry) {
    register_aliased(registry, &["date", "parse_date"], Arc::new(date) as Arc<dyn Pipe>);
}

/// Params: optional layout (chrono strftime syntax; empty means detect) and
/// optional timezone name applied to layouts without an offset.
fn date(input: &str, params: &[String], _: &PipeContext) -> anyhow::Result<Value> {
    let layout = params.first().map(String::as_str).filter(|l| !l.is_empty());
    let timezone = params.get(1).map(String::as_str).filter(|t| !t.is_empty());
    parse_date(input, layout, timezone).map(Value::Time)
}

/// Parses `input` into an instant.
///
/// With a layout, the input must match it exactly. A layout carrying an
/// offset (`%z`, `%:z`) is absolute; otherwise the local time is placed in
/// `timezone` (UTC when absent). Date-only layouts mean midnight.
pub fn parse_date(
    input: &str,
    layout: Option<&str>,
    timezone: Option<&str>,
) -> anyhow::Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        bail!("empty date");
    }
    let tz = match timezone {
        Some(name) => Some(
            name.parse::<Tz>()
                .map_err(|e| anyhow!("unknown timezone {:?}: {}", name, e))?,
        ),
        None => None,
    };

    match layout {
        Some(layout) => parse_with_layout(input, layout, tz),
        None => detect(input, tz),
    }
}

fn parse_with_layout(input: &str, layout: &str, tz: Option<Tz>) -> anyhow::Result<DateTime<Utc>> {
    if layout.contains("%z") || layout.contains("%:z") || layout.contains("%#z") {
        return DateTime::parse_from_str(input, layout)
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("{:?} does not match layout {:?}", input, layout));
    }

    let naive = match NaiveDateTime::parse_from_str(input, layout) {
        Ok(naive) => naive,
        Err(datetime_err) => NaiveDate::parse_from_str(input, layout)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| {
                anyhow!(
                    "{:?} does not match layout {:?}: {}",
                    input,
                    layout,
                    datetime_err
                )
            })?,
    };
    localize(naive, tz)
}

fn localize(naive: NaiveDateTime, tz: Option<Tz>) -> anyhow::Result<DateTime<Utc>> {
    match tz {
        Some(tz) => tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| anyhow!("{} does not exist in {}", naive, tz)),
        None => Ok(Utc.from_utc_datetime(&naive)),
    }
}

/// Loose layouts tried before handing the input to dateparser, so date-only
/// strings stay on their calendar day.
const LOOSE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d",
    "%b %e, %Y",
    "%e %b %Y",
    "%b %d, %Y",
    "%d %b %Y",
    "%B %e, %Y",
    "%e %B %Y",
    "%B %d, %Y",
    "%d %B %Y",
];

const NAIVE_LAYOUTS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

fn detect(input: &str, tz: Option<Tz>) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, layout) {
            return localize(naive, tz);
        }
    }
    for layout in LOOSE_LAYOUTS {
        if let Some(naive) = NaiveDate::parse_from_str(input, layout)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return localize(naive, tz);
        }
    }
    let parsed = match tz {
        Some(tz) => dateparser::parse_with_timezone(input, &tz),
        None => dateparser::parse_with_timezone(input, &Utc),
    };
    parsed.map_err(|e| anyhow!("unrecognized date {:?}: {}", input, e))
}
