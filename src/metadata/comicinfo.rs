//! `ComicInfo.xml` sidecar embedded in CBZ archives.
//!
//! The field set follows the ComicRack schema. List fields are comma-joined
//! and every element except `Number` is omitted when empty, so chapter `0`
//! still carries its number.

use serde::{Deserialize, Serialize};

use crate::metadata::{Date, Metadata};

const NOTES_TRAILER: &str = "Downloaded with kanko";
const MANGA_READING_DIRECTION: &str = "YesAndRightToLeft";

/// Chapter facts that go into a [`ComicInfo`] next to the series record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComicInfoChapter {
    pub title: String,
    pub url: String,
    pub number: f32,
    /// Release date; the series start date is used when zero.
    pub date: Date,
    /// Replaces the translators of the series when non-empty.
    pub scanlation_group: String,
    pub pages: u32,
}

/// Rendering switches for [`ComicInfo::to_xml`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComicInfoOptions {
    /// Writes `Year`, `Month` and `Day` when set.
    pub add_date: bool,
    /// Date written instead of the chapter date when `add_date` is set.
    pub alternative_date: Option<Date>,
}

impl Default for ComicInfoOptions {
    fn default() -> Self {
        Self {
            add_date: true,
            alternative_date: None,
        }
    }
}

/// Per-chapter metadata document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComicInfo {
    pub title: String,
    pub series: String,
    pub number: f32,
    pub web: String,
    pub genres: Vec<String>,
    pub summary: String,
    /// Total number of chapters in the series.
    pub count: u32,
    pub page_count: u32,
    pub characters: Vec<String>,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub publisher: String,
    pub language_iso: String,
    pub story_arc: String,
    pub story_arc_number: u32,
    pub scan_information: String,
    pub age_rating: String,
    /// Between 0.0 and 5.0.
    pub community_rating: f32,
    pub review: String,
    pub gtin: String,
    /// Publication format, e.g. `Web` or `Digital`.
    pub format: String,
    pub writers: Vec<String>,
    pub pencillers: Vec<String>,
    pub letterers: Vec<String>,
    pub translators: Vec<String>,
    pub tags: Vec<String>,
    pub notes: String,
}

impl ComicInfo {
    /// Synthesizes the document for `chapter` of the series described by `meta`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kanko::metadata::{ComicInfo, ComicInfoChapter, ComicInfoOptions, Date, Metadata};
    ///
    /// let meta = Metadata {
    ///     romaji_title: "Berserk".to_string(),
    ///     start_date: Date::new(1989, 8, 25),
    ///     ..Default::default()
    /// };
    /// let chapter = ComicInfoChapter { number: 0.0, pages: 24, ..Default::default() };
    ///
    /// let info = ComicInfo::from_metadata(&meta, &chapter);
    /// assert_eq!(info.year, 1989);
    ///
    /// let xml = info.to_xml(&ComicInfoOptions::default());
    /// assert!(xml.contains("<Number>0</Number>"));
    /// assert!(xml.contains("<PageCount>24</PageCount>"));
    /// ```
    pub fn from_metadata(meta: &Metadata, chapter: &ComicInfoChapter) -> Self {
        let date = if chapter.date.is_zero() {
            meta.start_date
        } else {
            chapter.date
        };

        let translators = if chapter.scanlation_group.is_empty() {
            meta.translators.clone()
        } else {
            vec![chapter.scanlation_group.clone()]
        };

        Self {
            title: chapter.title.clone(),
            series: meta.title().to_string(),
            number: chapter.number,
            web: chapter.url.clone(),
            genres: meta.genres.clone(),
            summary: meta.description.clone(),
            count: meta.chapters,
            page_count: chapter.pages,
            characters: meta.characters.clone(),
            year: date.year,
            month: date.month,
            day: date.day,
            publisher: meta.publisher.clone(),
            community_rating: meta.score,
            format: meta.format.clone(),
            writers: meta.authors.clone(),
            pencillers: meta.artists.clone(),
            letterers: meta.letterers.clone(),
            translators,
            tags: meta.tags.clone(),
            notes: meta.notes.clone(),
            ..Default::default()
        }
    }

    /// Renders the document as indented XML.
    pub fn to_xml(&self, options: &ComicInfoOptions) -> String {
        let (year, month, day) = match (options.add_date, options.alternative_date) {
            (false, _) => (0, 0, 0),
            (true, Some(date)) => (date.year, date.month, date.day),
            (true, None) => (self.year, self.month, self.day),
        };
        let notes = format!("{}\n\n{}", self.notes, NOTES_TRAILER);

        let mut xml = XmlBuilder::default();
        xml.text("Title", &self.title);
        xml.text("Series", &self.series);
        xml.always("Number", &self.number.to_string());
        xml.text("Web", &self.web);
        xml.list("Genre", &self.genres);
        xml.text("Summary", &self.summary);
        xml.number("Count", self.count as i64);
        xml.number("PageCount", self.page_count as i64);
        xml.list("Characters", &self.characters);
        xml.number("Year", year as i64);
        xml.number("Month", month as i64);
        xml.number("Day", day as i64);
        xml.list("Writer", &self.writers);
        xml.list("Penciller", &self.pencillers);
        xml.list("Letterer", &self.letterers);
        xml.list("Translator", &self.translators);
        xml.list("Tags", &self.tags);
        xml.text("Notes", &notes);
        xml.text("Manga", MANGA_READING_DIRECTION);
        xml.text("StoryArc", &self.story_arc);
        xml.number("StoryArcNumber", self.story_arc_number as i64);
        xml.text("ScanInformation", &self.scan_information);
        xml.text("AgeRating", &self.age_rating);
        if self.community_rating != 0.0 {
            xml.always("CommunityRating", &self.community_rating.to_string());
        }
        xml.text("Review", &self.review);
        xml.text("GTIN", &self.gtin);
        xml.text("Format", &self.format);
        xml.text("LanguageISO", &self.language_iso);
        xml.text("Publisher", &self.publisher);
        xml.finish()
    }
}

#[derive(Default)]
struct XmlBuilder {
    body: String,
}

impl XmlBuilder {
    fn always(&mut self, name: &str, value: &str) {
        self.body
            .push_str(&format!("  <{name}>{}</{name}>\n", xml_escape(value)));
    }

    fn text(&mut self, name: &str, value: &str) {
        if !value.is_empty() {
            self.always(name, value);
        }
    }

    fn number(&mut self, name: &str, value: i64) {
        if value != 0 {
            self.always(name, &value.to_string());
        }
    }

    fn list(&mut self, name: &str, values: &[String]) {
        self.text(name, &values.join(","));
    }

    fn finish(self) -> String {
        format!(
            concat!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
                "<ComicInfo xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" ",
                "xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\">\n",
                "{}</ComicInfo>\n"
            ),
            self.body
        )
    }
}

/// Escapes XML special characters and drops characters XML 1.0 forbids.
pub fn xml_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\t' | '\n' | '\r' => escaped.push(c),
            // illegal in XML 1.0
            '\u{0}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}' => {}
            c => escaped.push(c),
        }
    }
    escaped
}
