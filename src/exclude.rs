//! Excluded publications.
//!
//! A publication wrongly attributed to a member is recorded in a JSON file
//! keyed by PMID and removed from the bibliography. The PubMed importer
//! consults the same file so the entry is not imported again.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bibtex::{read_bib, split_entries, write_bib};
use crate::members::find_member;
use crate::regex::{literal, Regex};
use crate::{Error, Result};

static BLANK_RUN_REGEX: LazyLock<Regex> = LazyLock::new(|| literal(r"\n{4,}"));

/// Why and by whom one PMID was excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub member: String,
    /// `YYYY-MM-DD`.
    #[serde(default)]
    pub excluded_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_by: Option<String>,
    /// Fields written by other tools, kept as they are.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The exclusion file: PMID to [`Exclusion`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionList(BTreeMap<String, Exclusion>);

impl ExclusionList {
    /// Loads the list at `path`.
    ///
    /// A missing or blank file is an empty list. A file that does not parse
    /// is an error, so it is never saved over.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Writes the list as JSON indented by two spaces.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| Error::io(path, e))
    }

    pub fn get(&self, pmid: &str) -> Option<&Exclusion> {
        self.0.get(pmid)
    }

    pub fn contains(&self, pmid: &str) -> bool {
        self.0.contains_key(pmid)
    }

    /// Records `exclusion`, returning the record it replaced.
    pub fn insert(&mut self, pmid: &str, exclusion: Exclusion) -> Option<Exclusion> {
        self.0.insert(pmid.to_string(), exclusion)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The bibliography after [`remove_entry_by_pmid`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedEntries {
    pub content: String,
    /// Keys of the removed entries, in file order.
    pub keys: Vec<String>,
}

/// Drops every entry whose PMID is `pmid`, keeping all other text as is.
///
/// Runs of four or more newlines left behind collapse to three. Returns
/// `None` when no entry carries the PMID.
pub fn remove_entry_by_pmid(content: &str, pmid: &str) -> Option<RemovedEntries> {
    let mut kept = String::with_capacity(content.len());
    let mut keys = Vec::new();
    let mut copied_to = 0;
    let mut matched = false;

    for entry in split_entries(content) {
        if entry.pmid != Some(pmid) {
            continue;
        }
        matched = true;
        if let Some(key) = entry.key {
            keys.push(key.to_string());
        }
        kept.push_str(&content[copied_to..entry.start]);
        copied_to = entry.end;
    }

    if !matched {
        return None;
    }
    kept.push_str(&content[copied_to..]);
    Some(RemovedEntries {
        content: BLANK_RUN_REGEX.replace_all(&kept, "\n\n\n").into_owned(),
        keys,
    })
}

/// A request to exclude one publication.
#[derive(Debug, Clone)]
pub struct ExcludeRequest {
    pub pmid: String,
    pub member: String,
    pub reason: String,
    pub excluded_by: Option<String>,
    pub date: chrono::NaiveDate,
}

/// What [`exclude`] changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludeOutcome {
    /// The record that was overwritten, if the PMID was already excluded.
    pub previous: Option<Exclusion>,
    /// Keys removed from the bibliography. Empty when the PMID was not found.
    pub removed_keys: Vec<String>,
}

/// Records the exclusion and removes the publication from the bibliography.
pub fn exclude(
    members_dir: &Path,
    exclusions_file: &Path,
    bib_file: &Path,
    request: &ExcludeRequest,
) -> Result<ExcludeOutcome> {
    if request.pmid.is_empty() || !request.pmid.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::invalid("pmid", format!("'{}' is not a PubMed ID", request.pmid)));
    }
    find_member(members_dir, &request.member)?;

    let mut exclusions = ExclusionList::load(exclusions_file)?;
    let exclusion = Exclusion {
        reason: request.reason.clone(),
        member: request.member.clone(),
        excluded_date: request.date.format("%Y-%m-%d").to_string(),
        excluded_by: request.excluded_by.clone().filter(|by| !by.is_empty()),
        extra: BTreeMap::new(),
    };
    let previous = exclusions.insert(&request.pmid, exclusion);
    if let Some(previous) = &previous {
        warn!(
            "PMID {} is already excluded (reason: {}, member: {}), overwriting",
            request.pmid, previous.reason, previous.member
        );
    }
    exclusions.save(exclusions_file)?;
    info!("Updated {}", exclusions_file.display());

    if !bib_file.exists() {
        warn!("Bibliography file not found: {}", bib_file.display());
        return Ok(ExcludeOutcome {
            previous,
            removed_keys: Vec::new(),
        });
    }

    let content = read_bib(bib_file)?;
    let removed_keys = match remove_entry_by_pmid(&content, &request.pmid) {
        Some(removed) => {
            write_bib(bib_file, &removed.content)?;
            info!(
                "Removed entry with PMID {} (keys: {}) from {}",
                request.pmid,
                removed.keys.join(", "),
                bib_file.display()
            );
            removed.keys
        }
        None => {
            info!(
                "PMID {} not found in {} (may have been already removed)",
                request.pmid,
                bib_file.display()
            );
            Vec::new()
        }
    };

    Ok(ExcludeOutcome {
        previous,
        removed_keys,
    })
}
