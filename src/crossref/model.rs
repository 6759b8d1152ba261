//! The parts of the Crossref REST API `work` record that are read.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub(super) struct Envelope<T> {
    pub message: T,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct WorkList {
    #[serde(default)]
    pub items: Vec<Work>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct CitationCount {
    #[serde(default, rename = "is-referenced-by-count")]
    pub is_referenced_by_count: u64,
}

/// One Crossref work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Work {
    #[serde(rename = "DOI")]
    pub doi: Option<String>,
    pub title: Vec<String>,
    pub author: Vec<WorkAuthor>,
    #[serde(rename = "type")]
    pub kind: String,
    pub published_print: Option<PartialDate>,
    pub published_online: Option<PartialDate>,
    pub publisher: String,
    #[serde(rename = "ISBN")]
    pub isbn: Vec<String>,
    pub container_title: Vec<String>,
    pub is_referenced_by_count: u64,
}

impl Work {
    pub fn title(&self) -> &str {
        self.title.first().map_or("", String::as_str)
    }

    /// The DOI, when the record carries a non-empty one.
    pub fn doi(&self) -> Option<&str> {
        self.doi.as_deref().filter(|doi| !doi.is_empty())
    }

    /// The print publication year, else the online one.
    pub fn year(&self) -> Option<i32> {
        self.published_print
            .as_ref()
            .or(self.published_online.as_ref())
            .and_then(PartialDate::year)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkAuthor {
    pub given: String,
    pub family: String,
}

/// Crossref's `{"date-parts": [[year, month, day]]}`, where any part may be
/// missing or null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PartialDate {
    pub date_parts: Vec<Vec<Option<i32>>>,
}

impl PartialDate {
    pub fn year(&self) -> Option<i32> {
        self.date_parts.first()?.first().copied().flatten()
    }
}
