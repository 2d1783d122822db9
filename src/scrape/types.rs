// src/scrape/types.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// One notification as it leaves the page extractor. `date` is always known here;
/// rows without a usable date never make it this far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationRecord {
    pub id: String,
    pub title: Option<String>,
    pub text: Option<String>,
    pub application: Option<String>,
    pub application_link: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub date: DateTime<Utc>,
    /// Source fragment, kept for diagnostics only.
    #[serde(skip)]
    pub raw_markup: String,
}

/// Output of the row extractor: every field best-effort, including the date.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedRow {
    pub id: String,
    pub title: Option<String>,
    pub text: Option<String>,
    pub application: Option<String>,
    pub application_link: Option<String>,
    pub kind: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub raw_markup: String,
}

impl ExtractedRow {
    /// `None` when the row carried no comparable date.
    pub fn into_record(self) -> Option<NotificationRecord> {
        let date = self.date?;
        Some(NotificationRecord {
            id: self.id,
            title: self.title,
            text: self.text,
            application: self.application,
            application_link: self.application_link,
            kind: self.kind,
            date,
            raw_markup: self.raw_markup,
        })
    }
}

/// Stable identity for a row: the application link when present, otherwise
/// sha256(title | rfc3339 date) in lowercase hex.
pub fn record_id(
    application_link: Option<&str>,
    title: Option<&str>,
    date: Option<&DateTime<Utc>>,
) -> String {
    if let Some(link) = application_link {
        return link.to_string();
    }
    let key = format!(
        "{}|{}",
        title.unwrap_or_default(),
        date.map(|d| d.to_rfc3339()).unwrap_or_default()
    );
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn link_wins_over_hash() {
        let d = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        assert_eq!(record_id(Some("/apps/42"), Some("t"), Some(&d)), "/apps/42");
    }

    #[test]
    fn hash_is_deterministic_and_date_sensitive() {
        let d1 = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let d2 = Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap();
        let a = record_id(None, Some("Aviso"), Some(&d1));
        let b = record_id(None, Some("Aviso"), Some(&d1));
        let c = record_id(None, Some("Aviso"), Some(&d2));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn dateless_row_does_not_become_a_record() {
        let row = ExtractedRow {
            title: Some("x".into()),
            ..Default::default()
        };
        assert!(row.into_record().is_none());
    }
}
