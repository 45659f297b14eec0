use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;
use strum::{Display, EnumIter, EnumString};
use time::{macros::format_description, OffsetDateTime};

use crate::config::{DEFAULT_FONT, DEFAULT_PAGE_COLOR};

pub mod cover;
pub mod repository;

pub use repository::NotebookRepository;

pub type NotebookMap = BTreeMap<NotebookId, Notebook>;

const UNTITLED: &str = "Untitled notebook";

/// Creation timestamp in milliseconds, kept as the numeric string it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotebookId(String);

impl NotebookId {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn from_millis(millis: i64) -> Self {
        Self(millis.to_string())
    }

    /// Current wall-clock id, bumped past `latest` so ids stay strictly increasing.
    pub fn generate_after(latest: Option<&NotebookId>) -> Self {
        let now = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        let floor = latest
            .and_then(NotebookId::millis)
            .map(|millis| millis.saturating_add(1))
            .unwrap_or(i64::MIN);
        Self::from_millis(now.max(floor))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn millis(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    pub fn created_at(&self) -> Option<OffsetDateTime> {
        let millis = self.millis()?;
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
    }

    /// `Mon D, YYYY`, or `unknown date` for ids that are not timestamps.
    pub fn created_label(&self) -> String {
        let format = format_description!("[month repr:short] [day padding:none], [year]");
        self.created_at()
            .and_then(|dt| dt.format(&format).ok())
            .unwrap_or_else(|| "unknown date".to_string())
    }
}

impl Ord for NotebookId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.millis(), other.millis()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for NotebookId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for NotebookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CoverType {
    #[default]
    Color,
    Image,
    Link,
}

/// What the creation dialog hands to the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverSelection {
    Color,
    Image(Option<String>),
    Link(Option<String>),
}

impl CoverSelection {
    pub fn cover_type(&self) -> CoverType {
        match self {
            CoverSelection::Color => CoverType::Color,
            CoverSelection::Image(_) => CoverType::Image,
            CoverSelection::Link(_) => CoverType::Link,
        }
    }
}

/// The one cover source that wins for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverStyle<'a> {
    SolidColor(&'a str),
    Image(&'a str),
    Link(&'a str),
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notebook {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_page_color")]
    pub page_color: String,
    #[serde(default = "blank_pages", deserialize_with = "pages_or_blank")]
    pub pages: Vec<String>,
    #[serde(default = "default_font")]
    pub font: String,
    #[serde(default, deserialize_with = "lenient_cover_type")]
    pub cover_type: CoverType,
    pub cover_image: Option<String>,
    pub cover_link: Option<String>,
    /// Fields this version does not know about, written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Notebook {
    pub fn new(name: &str, page_color: &str, cover: CoverSelection, font: &str) -> Self {
        let cover_type = cover.cover_type();
        let (cover_image, cover_link) = match cover {
            CoverSelection::Color => (None, None),
            CoverSelection::Image(data) => (non_blank(data), None),
            CoverSelection::Link(url) => (None, non_blank(url)),
        };
        Self {
            name: name.to_string(),
            page_color: page_color.to_string(),
            pages: blank_pages(),
            font: font.to_string(),
            cover_type,
            cover_image,
            cover_link,
            extra: Map::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Picks the cover source by `cover_type`, falling back to the page color when
    /// the selected source has no data.
    pub fn cover(&self) -> CoverStyle<'_> {
        match self.cover_type {
            CoverType::Image => match self.cover_image.as_deref() {
                Some(data) if !data.is_empty() => CoverStyle::Image(data),
                _ => CoverStyle::SolidColor(&self.page_color),
            },
            CoverType::Link => match self.cover_link.as_deref() {
                Some(url) if !url.is_empty() => CoverStyle::Link(url),
                _ => CoverStyle::SolidColor(&self.page_color),
            },
            CoverType::Color => CoverStyle::SolidColor(&self.page_color),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn default_name() -> String {
    UNTITLED.to_string()
}

fn default_page_color() -> String {
    DEFAULT_PAGE_COLOR.to_string()
}

fn default_font() -> String {
    DEFAULT_FONT.to_string()
}

fn blank_pages() -> Vec<String> {
    vec![String::new()]
}

fn pages_or_blank<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let pages = Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default();
    if pages.is_empty() {
        Ok(blank_pages())
    } else {
        Ok(pages)
    }
}

fn lenient_cover_type<'de, D>(deserializer: D) -> Result<CoverType, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .and_then(|value| CoverType::from_str(value).ok())
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cover: CoverSelection) -> Notebook {
        Notebook::new("Trip Journal", "#f5f1e7", cover, DEFAULT_FONT)
    }

    #[test]
    fn new_notebook_starts_with_one_empty_page() {
        let notebook = sample(CoverSelection::Color);
        assert_eq!(notebook.pages, vec![String::new()]);
        assert_eq!(notebook.cover_type, CoverType::Color);
        assert_eq!(notebook.cover_image, None);
        assert_eq!(notebook.cover_link, None);
    }

    #[test]
    fn image_cover_without_data_falls_back_to_page_color() {
        let notebook = sample(CoverSelection::Image(None));
        assert_eq!(notebook.cover_type, CoverType::Image);
        assert_eq!(notebook.cover(), CoverStyle::SolidColor("#f5f1e7"));
    }

    #[test]
    fn cover_follows_selected_type() {
        let image = sample(CoverSelection::Image(Some("data:image/png;base64,AA==".into())));
        assert_eq!(image.cover(), CoverStyle::Image("data:image/png;base64,AA=="));

        let link = sample(CoverSelection::Link(Some(" https://example.com/a.jpg ".into())));
        assert_eq!(link.cover(), CoverStyle::Link("https://example.com/a.jpg"));

        let blank_link = sample(CoverSelection::Link(Some("   ".into())));
        assert_eq!(blank_link.cover_link, None);
        assert_eq!(blank_link.cover(), CoverStyle::SolidColor("#f5f1e7"));

        let mut color_with_stale_image = sample(CoverSelection::Color);
        color_with_stale_image.cover_image = Some("data:image/png;base64,AA==".into());
        assert_eq!(
            color_with_stale_image.cover(),
            CoverStyle::SolidColor("#f5f1e7")
        );
    }

    #[test]
    fn ids_order_numerically_and_generate_increasing() {
        let small = NotebookId::from_millis(999);
        let large = NotebookId::from_millis(1_000);
        assert!(small < large);

        let far_future = NotebookId::from_millis(i64::MAX - 10);
        let next = NotebookId::generate_after(Some(&far_future));
        assert_eq!(next.millis(), Some(i64::MAX - 9));

        let fresh = NotebookId::generate_after(None);
        assert!(fresh.millis().unwrap_or_default() > 1_600_000_000_000);
    }

    #[test]
    fn created_label_reads_timestamp_id() {
        let id = NotebookId::from_millis(1_700_000_000_000);
        assert_eq!(id.created_label(), "Nov 14, 2023");
        let bogus = NotebookId::parse("legacy-id").expect("non-blank id");
        assert_eq!(bogus.created_label(), "unknown date");
    }
}
