//! `series.json` sidecar (Mylar schema 1.0.2).
//!
//! Describes the series as a whole and is written once per manga directory.
//! The document is wrapped in a top-level `metadata` object on disk.

use chrono::Month;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metadata::{Date, Metadata, Status};

/// Series summary document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesJson {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description_formatted: String,
    pub description_text: String,
    /// `Ended`, `Continuing` or `Unknown`.
    pub status: String,
    pub year: i32,
    pub comic_image: String,
    pub publisher: String,
    #[serde(rename = "comicid")]
    pub comic_id: u64,
    #[serde(rename = "booktype")]
    pub book_type: String,
    pub total_issues: u32,
    /// `"<Month> <Year> - <Month> <Year>"` or `"<Month> <Year> - Present"`.
    pub publication_run: String,
}

#[derive(Serialize)]
struct Wrapper<'a> {
    metadata: &'a SeriesJson,
}

impl SeriesJson {
    /// Builds the document from a series record.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kanko::metadata::{Date, Metadata, SeriesJson, Status};
    ///
    /// let meta = Metadata {
    ///     romaji_title: "Vagabond".to_string(),
    ///     start_date: Date::new(1998, 9, 3),
    ///     end_date: Date::new(2015, 5, 21),
    ///     status: Some(Status::Hiatus),
    ///     ..Default::default()
    /// };
    ///
    /// let series = SeriesJson::from_metadata(&meta);
    /// assert_eq!(series.publication_run, "September 1998 - May 2015");
    /// assert_eq!(series.status, "Unknown");
    /// ```
    pub fn from_metadata(meta: &Metadata) -> Self {
        let status = match meta.status {
            Some(Status::Finished) => "Ended",
            Some(Status::Releasing) => "Continuing",
            _ => "Unknown",
        };

        let end = if meta.end_date.is_zero() {
            "Present".to_string()
        } else {
            month_year(&meta.end_date)
        };

        Self {
            kind: "comicSeries".to_string(),
            name: meta.title().to_string(),
            description_formatted: meta.description.clone(),
            description_text: meta.description.clone(),
            status: status.to_string(),
            year: meta.start_date.year,
            comic_image: meta.cover_image.clone(),
            publisher: meta.publisher.clone(),
            comic_id: meta.id.value().unwrap_or_default(),
            book_type: "Print".to_string(),
            total_issues: meta.chapters,
            publication_run: format!("{} - {}", month_year(&meta.start_date), end),
        }
    }

    /// Pretty-printed JSON wrapped in `{"metadata": ...}`.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut json = serde_json::to_vec_pretty(&Wrapper { metadata: self })?;
        json.push(b'\n');
        Ok(json)
    }
}

// Unknown months are left out rather than rendered as a number.
fn month_year(date: &Date) -> String {
    let month = u8::try_from(date.month)
        .ok()
        .and_then(|m| Month::try_from(m).ok());
    match month {
        Some(month) => format!("{} {}", month.name(), date.year),
        None => date.year.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Id;

    #[test]
    fn test_ongoing_series() {
        let meta = Metadata {
            english_title: "One Piece".to_string(),
            description: "Pirates.".to_string(),
            start_date: Date::new(1997, 7, 22),
            status: Some(Status::Releasing),
            chapters: 1100,
            id: Id::anilist(30013),
            ..Default::default()
        };

        let series = SeriesJson::from_metadata(&meta);
        assert_eq!(series.status, "Continuing");
        assert_eq!(series.publication_run, "July 1997 - Present");
        assert_eq!(series.comic_id, 30013);
        assert_eq!(series.total_issues, 1100);
    }

    #[test]
    fn test_json_is_wrapped() {
        let meta = Metadata {
            romaji_title: "Monster".to_string(),
            start_date: Date::new(1994, 12, 5),
            end_date: Date::new(2001, 12, 20),
            status: Some(Status::Finished),
            ..Default::default()
        };

        let json = SeriesJson::from_metadata(&meta).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();

        assert_eq!(value["metadata"]["type"], "comicSeries");
        assert_eq!(value["metadata"]["status"], "Ended");
        assert_eq!(value["metadata"]["booktype"], "Print");
        assert_eq!(value["metadata"]["comicid"], 0);
        assert_eq!(
            value["metadata"]["publication_run"],
            "December 1994 - December 2001"
        );
    }
}
