// src/scrape/page.rs
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use super::row::extract_row;
use super::types::NotificationRecord;

static ROW_PRIMARY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("mat-row").expect("static selector"));
static ROW_FALLBACK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".mat-row").expect("static selector"));

/// Extract every dated notification from a parsed page, newest first.
/// Ties keep document order.
pub fn extract_all(document: &Html) -> Vec<NotificationRecord> {
    let mut rows: Vec<ElementRef<'_>> = document.select(&ROW_PRIMARY).collect();
    if rows.is_empty() {
        rows = document.select(&ROW_FALLBACK).collect();
    }
    let total = rows.len();

    let mut items: Vec<NotificationRecord> = rows
        .into_iter()
        .filter_map(|row| extract_row(row).into_record())
        .collect();
    items.sort_by(|a, b| b.date.cmp(&a.date));

    tracing::debug!(
        target: "scrape",
        rows = total,
        kept = items.len(),
        dropped = total - items.len(),
        "page extracted"
    );
    items
}

pub fn extract_html(html: &str) -> Vec<NotificationRecord> {
    extract_all(&Html::parse_document(html))
}
