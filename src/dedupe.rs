//! PMID-based duplicate removal.
//!
//! Two entries are duplicates when they carry the same PMID. The first entry
//! in file order is kept and every later one is dropped.
//!
//! ```
//! use bibkeeper::dedupe::remove_duplicates;
//!
//! let bib = "@article{A,\n  pmid = {1},\n}\n@article{B,\n  pmid = {1},\n}\n@misc{C,\n}\n";
//! let outcome = remove_duplicates(bib);
//! assert_eq!(outcome.removed, 1);
//! assert_eq!(outcome.content, "@article{A,\n  pmid = {1},\n}\n\n@misc{C,\n}\n");
//! ```

use std::collections::{BTreeMap, HashSet};

use crate::bibtex::{split_entries, RawEntry};

/// Entries that share one PMID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup<'a> {
    pub pmid: &'a str,
    /// The entry that is kept.
    pub unique: RawEntry<'a>,
    /// Later entries with the same PMID.
    pub duplicates: Vec<RawEntry<'a>>,
}

impl<'a> DuplicateGroup<'a> {
    /// The kept entry followed by the duplicates, in file order.
    pub fn entries(&self) -> impl Iterator<Item = &RawEntry<'a>> {
        std::iter::once(&self.unique).chain(&self.duplicates)
    }
}

/// Groups entries by PMID, keeping only PMIDs seen more than once.
///
/// Groups are ordered by PMID (as a string).
pub fn find_duplicates<'a>(entries: &[RawEntry<'a>]) -> Vec<DuplicateGroup<'a>> {
    let mut by_pmid: BTreeMap<&'a str, Vec<RawEntry<'a>>> = BTreeMap::new();
    for entry in entries {
        if let Some(pmid) = entry.pmid {
            by_pmid.entry(pmid).or_default().push(entry.clone());
        }
    }

    by_pmid
        .into_iter()
        .filter_map(|(pmid, mut group)| {
            if group.len() < 2 {
                return None;
            }
            let duplicates = group.split_off(1);
            let unique = group.pop()?;
            Some(DuplicateGroup {
                pmid,
                unique,
                duplicates,
            })
        })
        .collect()
}

/// The cleaned file produced by [`remove_duplicates`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupeOutcome {
    pub content: String,
    /// Entries in the input.
    pub total: usize,
    pub kept: usize,
    pub removed: usize,
}

/// Rebuilds `content` without later duplicates.
///
/// Kept entries are joined by a blank line and the file ends with a newline.
/// Text before the first entry is not carried over.
pub fn remove_duplicates(content: &str) -> DedupeOutcome {
    let entries = split_entries(content);
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(entries.len());

    for entry in &entries {
        match entry.pmid {
            Some(pmid) if !seen.insert(pmid) => (),
            _ => kept.push(entry.text),
        }
    }

    let mut cleaned = kept.join("\n\n");
    cleaned.push('\n');
    DedupeOutcome {
        content: cleaned,
        total: entries.len(),
        kept: kept.len(),
        removed: entries.len() - kept.len(),
    }
}
