//! PubMed importer.
//!
//! Looks up every member's publications through the NCBI E-utilities,
//! by ORCID first and by publication name as a fallback, and appends the
//! records that are not in the bibliography yet.
//!
//! # Example
//!
//! ```
//! use std::collections::HashSet;
//! use bibkeeper::pubmed::{to_bibtex, Publication};
//!
//! let publication = Publication {
//!     pmid: "38012345".to_string(),
//!     authors: vec!["Robert Tolboom".to_string()],
//!     year: "2024".to_string(),
//!     ..Publication::default()
//! };
//! let mut keys = HashSet::new();
//! let entry = to_bibtex(&publication, &mut keys, "DIAG, RADIOLOGY");
//! assert!(entry.starts_with("@article{Tolboom24,"));
//! ```

mod client;
mod xml;

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use tracing::{debug, info, warn};

use crate::bibtex::{
    append_entries, ascii_letters, escape_braces, existing_keys, existing_pmids,
    read_bib_or_empty, unique_key, EntryBuilder,
};
use crate::exclude::ExclusionList;
use crate::members::Member;
use crate::regex::{literal, Regex};
use crate::{Error, Result};

pub use client::EutilsClient;
pub use xml::parse_efetch;

static ORCID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| literal(r"\d{4}-\d{4}-\d{4}-\d{3}[0-9X]"));

/// One PubMed record, with every field as the text that goes into BibTeX.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Publication {
    pub pmid: String,
    pub title: String,
    /// Display names, `ForeName LastName`.
    pub authors: Vec<String>,
    pub journal: String,
    pub year: String,
    /// Month number, `1` to `12`.
    pub month: String,
    pub volume: String,
    pub issue: String,
    pub pages: String,
    pub abstract_text: String,
    pub doi: String,
    /// BibTeX entry type.
    pub kind: String,
}

/// A PubMed search and fetch backend.
pub trait PubMedSource {
    /// PMIDs matching `query`, at most `retmax`, published on or after `mindate`
    /// (`YYYY/MM/DD`) when given.
    fn search(&mut self, query: &str, retmax: usize, mindate: Option<&str>) -> Result<Vec<String>>;

    fn fetch(&mut self, pmids: &[String]) -> Result<Vec<Publication>>;
}

/// The ORCID iD inside `raw`, which may be a bare iD or an `orcid.org` URL.
pub fn orcid_id(raw: &str) -> Option<&str> {
    ORCID_REGEX.find(raw).map(|m| m.as_str())
}

/// Renders a record as a BibTeX entry, allocating its key from `keys`.
///
/// The key is the first author's last name followed by the two-digit year.
/// Empty fields are left out.
pub fn to_bibtex(publication: &Publication, keys: &mut HashSet<String>, note: &str) -> String {
    let last_name = publication
        .authors
        .first()
        .and_then(|author| author.split_whitespace().last())
        .map(ascii_letters)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());
    let year = &publication.year;
    let year_short = match year.char_indices().rev().nth(1) {
        Some((start, _)) => &year[start..],
        None if year.is_empty() => "00",
        None => year.as_str(),
    };
    let key = unique_key(&format!("{last_name}{year_short}"), keys);

    let kind = if publication.kind.is_empty() {
        "article"
    } else {
        &publication.kind
    };
    EntryBuilder::new(kind, &key)
        .non_empty("author", &publication.authors.join(" and "))
        .non_empty("title", &publication.title)
        .non_empty("journal", &publication.journal)
        .non_empty("year", &publication.year)
        .non_empty("volume", &publication.volume)
        .non_empty("number", &publication.issue)
        .non_empty("pages", &publication.pages)
        .non_empty("month", &publication.month)
        .non_empty("doi", &publication.doi)
        .non_empty("pmid", &publication.pmid)
        .non_empty("abstract", &escape_braces(&publication.abstract_text))
        .non_empty("optnote", note)
        .build()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Only members whose name contains this, ignoring case.
    pub member_filter: Option<String>,
    /// Only publications from this year on.
    pub since: Option<i32>,
    pub max_results: usize,
    pub active_only: bool,
    /// Value of the `optnote` field.
    pub note: String,
    pub dry_run: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            member_filter: None,
            since: None,
            max_results: 100,
            active_only: false,
            note: "DIAG, RADIOLOGY".to_string(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Members that were searched.
    pub members: usize,
    /// PMIDs returned by the searches.
    pub total_found: usize,
    /// PMIDs neither in the bibliography nor excluded.
    pub total_new: usize,
    /// The rendered entries, in import order.
    pub entries: Vec<String>,
    /// Whether the entries were appended to the file.
    pub written: bool,
}

pub struct PubMedImporter<S> {
    source: S,
}

impl<S: PubMedSource> PubMedImporter<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Searches every selected member and appends the new records to `bib_file`.
    pub fn run(
        &mut self,
        members: &[Member],
        bib_file: &Path,
        exclusions: &ExclusionList,
        options: &ImportOptions,
    ) -> Result<ImportSummary> {
        let content = read_bib_or_empty(bib_file)?;
        let mut known_pmids = existing_pmids(&content);
        let mut keys = existing_keys(&content);
        info!(
            "Found {} existing publications and {} existing keys",
            known_pmids.len(),
            keys.len()
        );

        let selected = select_members(members, options)?;
        let mindate = options.since.map(|year| format!("{year}/01/01"));
        let mut summary = ImportSummary {
            members: selected.len(),
            ..ImportSummary::default()
        };

        for member in selected {
            info!("Processing: {}", member.name);
            let pmids = self.search_member(member, options.max_results, mindate.as_deref());
            if pmids.is_empty() {
                info!("  No publications found");
                continue;
            }
            summary.total_found += pmids.len();

            let new_pmids: Vec<String> = pmids
                .into_iter()
                .filter(|pmid| {
                    if exclusions.contains(pmid) {
                        debug!("  Skipping excluded PMID {pmid}");
                        return false;
                    }
                    !known_pmids.contains(pmid)
                })
                .collect();
            if new_pmids.is_empty() {
                info!("  All publications already in database");
                continue;
            }
            info!("  {} new publications to add", new_pmids.len());
            summary.total_new += new_pmids.len();

            let publications = match self.source.fetch(&new_pmids) {
                Ok(publications) => publications,
                Err(e) => {
                    report_failure("fetching PubMed details", &e);
                    continue;
                }
            };
            for publication in publications {
                summary
                    .entries
                    .push(to_bibtex(&publication, &mut keys, &options.note));
                known_pmids.insert(publication.pmid);
            }
        }

        if !options.dry_run && !summary.entries.is_empty() {
            append_entries(bib_file, &summary.entries)?;
            summary.written = true;
            info!(
                "Added {} new entries to {}",
                summary.entries.len(),
                bib_file.display()
            );
        }
        Ok(summary)
    }

    /// ORCID search first, then the publication name when that finds nothing.
    fn search_member(&mut self, member: &Member, retmax: usize, mindate: Option<&str>) -> Vec<String> {
        if let Some(orcid) = member.orcid.as_deref().and_then(orcid_id) {
            info!("  Searching PubMed with ORCID: {orcid}");
            let pmids = self.search(&format!("{orcid}[auid]"), retmax, mindate);
            if !pmids.is_empty() {
                return pmids;
            }
        }
        let name = member.publication_name();
        info!("  Searching PubMed with name: {name}");
        self.search(&format!("\"{name}\"[Author]"), retmax, mindate)
    }

    fn search(&mut self, query: &str, retmax: usize, mindate: Option<&str>) -> Vec<String> {
        self.source
            .search(query, retmax, mindate)
            .unwrap_or_else(|e| {
                report_failure("searching PubMed", &e);
                Vec::new()
            })
    }
}

fn select_members<'a>(members: &'a [Member], options: &ImportOptions) -> Result<Vec<&'a Member>> {
    let mut selected: Vec<&Member> = members
        .iter()
        .filter(|member| !options.active_only || member.active)
        .collect();
    if options.active_only {
        info!("{} total members, {} active", members.len(), selected.len());
    }
    if let Some(filter) = &options.member_filter {
        let needle = filter.to_lowercase();
        selected.retain(|member| member.name.to_lowercase().contains(&needle));
        let Some(first) = selected.first() else {
            return Err(Error::invalid(
                "member",
                format!("no member found matching '{filter}'"),
            ));
        };
        info!("Filtering to member: {}", first.name);
    }
    Ok(selected)
}

fn report_failure(action: &str, error: &Error) {
    warn!("Error {action}: {error}");
    if let Error::Api { status: 403, .. } = error {
        warn!("Consider configuring an email address for better API access");
    }
}
