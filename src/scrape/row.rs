// src/scrape/row.rs
//! Row extractor: one `mat-row`-like element into an [`ExtractedRow`].
//!
//! Columns are positional (0 is the selection checkbox and is ignored). Every
//! field is read through its own ordered list of cell extractors, so a missing
//! column or sub-element only blanks that one field.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};

use super::dates;
use super::types::{record_id, ExtractedRow};

pub const COL_TITLE: usize = 1;
pub const COL_TEXT: usize = 2;
pub const COL_APPLICATION: usize = 3;
pub const COL_TYPE: usize = 4;
pub const COL_DATE: usize = 5;

static CELL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("mat-cell, .mat-cell").expect("static selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));
static TIME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("time[datetime]").expect("static selector"));

/// Reads one raw value out of a cell, or nothing.
type CellExtractor = fn(ElementRef<'_>) -> Option<String>;

const TITLE: &[CellExtractor] = &[cell_text];
const TEXT: &[CellExtractor] = &[cell_text];
const APPLICATION: &[CellExtractor] = &[link_text, cell_text];
const APPLICATION_LINK: &[CellExtractor] = &[link_href];
const KIND: &[CellExtractor] = &[cell_text];
/// Raw date candidates; each is normalized before the next one is tried.
const DATE: &[CellExtractor] = &[time_attr, cell_text];

/// Extract one row. Never fails: absent columns give absent fields, and a row
/// without any recognizable cell keeps its flattened text as the title.
pub fn extract_row(row: ElementRef<'_>) -> ExtractedRow {
    let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
    let raw_markup = row.html();

    if cells.is_empty() {
        let title = non_empty(
            row.text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" | "),
        );
        return ExtractedRow {
            id: record_id(None, title.as_deref(), None),
            title,
            raw_markup,
            ..Default::default()
        };
    }

    let title = field(&cells, COL_TITLE, TITLE);
    let text = field(&cells, COL_TEXT, TEXT);
    let application = field(&cells, COL_APPLICATION, APPLICATION);
    let application_link = field(&cells, COL_APPLICATION, APPLICATION_LINK);
    let kind = field(&cells, COL_TYPE, KIND);
    let date = cells
        .get(COL_DATE)
        .and_then(|cell| DATE.iter().find_map(|f| f(*cell).and_then(|s| dates::normalize(&s))));

    let id = record_id(application_link.as_deref(), title.as_deref(), date.as_ref());

    ExtractedRow {
        id,
        title,
        text,
        application,
        application_link,
        kind,
        date,
        raw_markup,
    }
}

fn field(cells: &[ElementRef<'_>], col: usize, chain: &[CellExtractor]) -> Option<String> {
    let cell = cells.get(col)?;
    chain.iter().find_map(|f| f(*cell))
}

/// Visible text with whitespace runs collapsed.
pub fn flatten_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn cell_text(cell: ElementRef<'_>) -> Option<String> {
    non_empty(flatten_text(cell))
}

fn link_text(cell: ElementRef<'_>) -> Option<String> {
    cell.select(&LINK).next().and_then(|a| non_empty(flatten_text(a)))
}

fn link_href(cell: ElementRef<'_>) -> Option<String> {
    cell.select(&LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|h| non_empty(h.trim().to_string()))
}

fn time_attr(cell: ElementRef<'_>) -> Option<String> {
    cell.select(&TIME)
        .next()
        .and_then(|t| t.value().attr("datetime"))
        .map(str::to_string)
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use scraper::Html;

    static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("mat-row").unwrap());

    fn first_row(html: &str) -> ExtractedRow {
        let doc = Html::parse_document(html);
        let row = doc.select(&ROW).next().expect("fixture has a row");
        extract_row(row)
    }

    #[test]
    fn full_row_with_link() {
        let r = first_row(
            r#"<mat-row>
                <mat-cell><input type="checkbox"></mat-cell>
                <mat-cell> Requerimiento   de información </mat-cell>
                <mat-cell>Se solicita <b>documentación</b></mat-cell>
                <mat-cell><a href="/apps/42">Solicitud 42</a></mat-cell>
                <mat-cell>Aviso</mat-cell>
                <mat-cell>03/01/2024 10:15</mat-cell>
            </mat-row>"#,
        );
        assert_eq!(r.title.as_deref(), Some("Requerimiento de información"));
        assert_eq!(r.text.as_deref(), Some("Se solicita documentación"));
        assert_eq!(r.application.as_deref(), Some("Solicitud 42"));
        assert_eq!(r.application_link.as_deref(), Some("/apps/42"));
        assert_eq!(r.kind.as_deref(), Some("Aviso"));
        assert_eq!(r.date, Some(Utc.with_ymd_and_hms(2024, 1, 3, 10, 15, 0).unwrap()));
        assert_eq!(r.id, "/apps/42");
        assert!(r.raw_markup.contains("Solicitud 42"));
    }

    #[test]
    fn application_without_link_falls_back_to_text() {
        let r = first_row(
            r#"<mat-row><mat-cell></mat-cell><mat-cell>T</mat-cell><mat-cell>x</mat-cell>
               <mat-cell> App sin liga </mat-cell><mat-cell>k</mat-cell><mat-cell>2024-01-02</mat-cell></mat-row>"#,
        );
        assert_eq!(r.application.as_deref(), Some("App sin liga"));
        assert_eq!(r.application_link, None);
        assert_eq!(r.id.len(), 64);
    }

    #[test]
    fn short_row_keeps_available_fields() {
        let r = first_row(
            r#"<mat-row><mat-cell></mat-cell><mat-cell>Solo titulo</mat-cell><mat-cell>cuerpo</mat-cell></mat-row>"#,
        );
        assert_eq!(r.title.as_deref(), Some("Solo titulo"));
        assert_eq!(r.text.as_deref(), Some("cuerpo"));
        assert_eq!(r.application, None);
        assert_eq!(r.kind, None);
        assert_eq!(r.date, None);
    }

    #[test]
    fn time_element_beats_cell_text() {
        let r = first_row(
            r#"<mat-row><mat-cell></mat-cell><mat-cell>T</mat-cell><mat-cell></mat-cell><mat-cell></mat-cell>
               <mat-cell></mat-cell><mat-cell><time datetime="2024-05-01T12:00:00Z">hace 2 días</time></mat-cell></mat-row>"#,
        );
        assert_eq!(r.date, Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()));
    }

    #[test]
    fn cellless_row_degrades_to_flattened_title() {
        let r = first_row(r#"<mat-row><span>Algo</span> <span>raro</span></mat-row>"#);
        assert_eq!(r.title.as_deref(), Some("Algo | raro"));
        assert_eq!(r.date, None);
    }
}
