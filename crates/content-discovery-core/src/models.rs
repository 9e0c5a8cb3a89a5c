//! Core data models shared by the taxonomy filter and the scrollspy.
//!
//! Article records and heading anchors are produced elsewhere (content
//! parsing is not part of this crate) and are treated as read-only input.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

/// Facet value that matches every record.
pub const ALL: &str = "all";

/// A published article as listed on the site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub read_time: String,
    /// Publication date. Accepts `YYYY-MM-DD` or an RFC 3339 timestamp;
    /// absent or unparseable dates are `None`.
    #[serde(
        default,
        deserialize_with = "lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<NaiveDate>,
    /// Series or project the article belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub description: String,
    pub slug: String,
    /// Frontmatter fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(serde_json::Value::as_str).and_then(parse_date))
}

/// Parses a frontmatter date, keeping only the calendar day.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// The category/group pair currently selected by the article listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FacetSelection {
    pub category: String,
    pub group: String,
}

impl FacetSelection {
    pub fn new(category: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            group: group.into(),
        }
    }

    pub fn category(category: impl Into<String>) -> Self {
        Self::new(category, ALL)
    }

    pub fn group(group: impl Into<String>) -> Self {
        Self::new(ALL, group)
    }

    pub fn is_unfiltered(&self) -> bool {
        self.category == ALL && self.group == ALL
    }
}

impl Default for FacetSelection {
    fn default() -> Self {
        Self::new(ALL, ALL)
    }
}

/// One addressable section of the rendered document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingAnchor {
    pub slug: String,
    pub text: String,
    /// Heading level (`2` for `<h2>`, ...).
    pub depth: u8,
}

impl HeadingAnchor {
    pub fn new(slug: impl Into<String>, text: impl Into<String>, depth: u8) -> Self {
        Self {
            slug: slug.into(),
            text: text.into(),
            depth,
        }
    }
}
