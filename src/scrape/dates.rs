// src/scrape/dates.rs
//! Date normalization for the portal's mixed date conventions.
//!
//! Strategies run cheapest/most precise first; the regex scan for an embedded
//! ISO timestamp is the catch-all. Naive values are taken as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;

type Strategy = fn(&str) -> Option<DateTime<Utc>>;

/// Ordered strategy table; first hit wins.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("iso8601", parse_iso),
    ("locale", parse_locale),
    ("embedded_iso", parse_embedded_iso),
];

/// ISO-8601 shapes RFC 3339 rejects: minute precision, `+hhmm` offsets,
/// space separator.
const OFFSET_ISO_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M%z",
];

const NAIVE_ISO_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// day/month/year patterns seen on the portal, with and without time.
const LOCALE_DATETIME_FORMATS: &[&str] = &["%d/%m/%y %H:%M", "%d/%m/%Y %H:%M"];
const LOCALE_DATE_FORMATS: &[&str] = &["%d/%m/%y", "%d/%m/%Y"];

/// Normalize a raw date string. Returns `None` for empty input or when every
/// strategy fails.
pub fn normalize(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    STRATEGIES.iter().find_map(|(name, parse)| {
        let out = parse(s);
        if out.is_some() {
            tracing::trace!(target: "scrape", strategy = *name, raw = s, "date parsed");
        }
        out
    })
}

fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = OFFSET_ISO_FORMATS
        .iter()
        .find_map(|f| DateTime::parse_from_str(s, f).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }
    // `Z` outside RFC 3339 proper, e.g. `2024-01-03T10:15Z`.
    let s = s.strip_suffix('Z').or_else(|| s.strip_suffix('z')).unwrap_or(s);
    if let Some(naive) = NAIVE_ISO_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
    {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

fn parse_locale(s: &str) -> Option<DateTime<Utc>> {
    // A two-digit `%y` must not swallow the first half of a four-digit year,
    // so each pattern has to consume the whole input.
    if let Some(naive) = LOCALE_DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
    {
        return Some(naive.and_utc());
    }
    LOCALE_DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

fn parse_embedded_iso(s: &str) -> Option<DateTime<Utc>> {
    static RE_ISO: OnceCell<Regex> = OnceCell::new();
    let re = RE_ISO.get_or_init(|| {
        Regex::new(r"20\d{2}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:Z|[+-]\d{2}:?\d{2})?")
            .expect("static regex")
    });
    // The offset, when captured, goes through the strict parser with the rest.
    parse_iso(re.find(s)?.as_str())
}
