// src/scrape/mod.rs
//! Notification table extraction: dates → rows → pages.

pub mod dates;
pub mod page;
pub mod row;
pub mod types;

pub use dates::normalize;
pub use page::{extract_all, extract_html};
pub use row::extract_row;
pub use types::{ExtractedRow, NotificationRecord};
