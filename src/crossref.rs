//! Crossref books and chapters importer.
//!
//! Crossref is searched by author for the book-like work types. A result is
//! kept only when one of its authors passes the member name heuristic,
//! because author queries are fuzzy and return many near misses.

mod client;
mod model;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::author::PersonName;
use crate::bibtex::{
    append_entries, ascii_letters, existing_dois, existing_keys, read_bib_or_empty, unique_key,
    EntryBuilder,
};
use crate::members::Member;
use crate::Result;

pub use client::CrossrefClient;
pub use model::{PartialDate, Work, WorkAuthor};

/// Work types requested from Crossref.
pub const BOOK_TYPES: [&str; 4] = ["book", "book-chapter", "monograph", "edited-book"];

/// A Crossref work search backend.
pub trait WorkSource {
    /// Book-like works whose authors match `author_query`, at most `rows`.
    fn search_works(&mut self, author_query: &str, rows: usize) -> Result<Vec<Work>>;
}

/// The BibTeX entry type for a Crossref work type.
pub fn bibtex_type(kind: &str) -> &'static str {
    match kind {
        "book" | "monograph" | "edited-book" => "book",
        "book-chapter" | "book-section" => "incollection",
        _ => "misc",
    }
}

/// Whether any author of `work` is `person`.
pub fn matches_author(work: &Work, person: &PersonName) -> bool {
    work.author
        .iter()
        .any(|author| person.matches(&author.family, &author.given))
}

/// Renders a work as a BibTeX entry, allocating its key from `keys`.
pub fn work_to_bibtex(work: &Work, keys: &mut HashSet<String>) -> String {
    let kind = bibtex_type(&work.kind);
    let family = work
        .author
        .first()
        .map(|author| ascii_letters(&author.family))
        .filter(|family| !family.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());
    let year = work.year().map(|year| year.to_string()).unwrap_or_default();
    let year_short = match year.len() {
        0 => "00",
        n => &year[n.saturating_sub(2)..],
    };
    let key = unique_key(&format!("{family}{year_short}"), keys);

    let authors = work
        .author
        .iter()
        .filter(|author| !author.family.is_empty())
        .map(|author| {
            if author.given.is_empty() {
                author.family.clone()
            } else {
                format!("{}, {}", author.family, author.given)
            }
        })
        .collect::<Vec<_>>()
        .join(" and ");

    let mut entry = EntryBuilder::new(kind, &key)
        .non_empty("title", work.title())
        .non_empty("author", &authors)
        .non_empty("year", &year)
        .non_empty("publisher", &work.publisher)
        .optional("isbn", work.isbn.first().map(String::as_str))
        .optional("doi", work.doi());
    if kind == "incollection" {
        entry = entry.optional("booktitle", work.container_title.first().map(String::as_str));
    }
    if work.is_referenced_by_count > 0 {
        entry = entry.field("citations", work.is_referenced_by_count.to_string());
    }
    entry.build()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooksOptions {
    /// Only members whose name contains this, ignoring case.
    pub member_filter: Option<String>,
    /// Rows requested per query.
    pub max_results: usize,
    pub active_only: bool,
    pub dry_run: bool,
}

impl Default for BooksOptions {
    fn default() -> Self {
        Self {
            member_filter: None,
            max_results: 100,
            active_only: true,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BooksStats {
    pub members: usize,
    pub total_queries: usize,
    pub total_results: usize,
    pub filtered_matches: usize,
    pub new_entries: usize,
}

impl fmt::Display for BooksStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Members processed:    {}", self.members)?;
        writeln!(f, "Total API queries:    {}", self.total_queries)?;
        writeln!(f, "Total results:        {}", self.total_results)?;
        writeln!(f, "Filtered matches:     {}", self.filtered_matches)?;
        write!(f, "New entries to add:   {}", self.new_entries)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BooksSummary {
    pub stats: BooksStats,
    pub entries: Vec<String>,
    /// Whether the entries were appended to the file.
    pub written: bool,
}

pub struct BooksImporter<S> {
    source: S,
    stats: BooksStats,
}

impl<S: WorkSource> BooksImporter<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            stats: BooksStats::default(),
        }
    }

    /// Searches every selected member and appends the new works to `bib_file`.
    pub fn run(
        &mut self,
        members: &[Member],
        bib_file: &Path,
        options: &BooksOptions,
    ) -> Result<BooksSummary> {
        self.stats = BooksStats::default();
        let selected: Vec<&Member> = members
            .iter()
            .filter(|member| !options.active_only || member.active)
            .filter(|member| {
                options
                    .member_filter
                    .as_ref()
                    .is_none_or(|filter| member.name.to_lowercase().contains(&filter.to_lowercase()))
            })
            .collect();
        if selected.is_empty() {
            warn!("No members found to process");
            return Ok(BooksSummary::default());
        }
        info!("Found {} member(s) to process", selected.len());
        self.stats.members = selected.len();

        let content = read_bib_or_empty(bib_file)?;
        let mut keys = existing_keys(&content);
        let mut dois = existing_dois(&content);
        info!("Existing entries: {}, DOIs: {}", keys.len(), dois.len());

        let mut entries = Vec::new();
        for (i, member) in selected.iter().enumerate() {
            info!("[{}/{}] Processing: {}", i + 1, selected.len(), member.name);
            let Some(person) = member.person() else {
                debug!("  No family and given name in '{}'", member.publication_name());
                continue;
            };

            for work in self.search_member(&person, options.max_results) {
                if let Some(doi) = work.doi() {
                    if dois.contains(doi) {
                        debug!("  Skipping (DOI exists): {}", work.title());
                        continue;
                    }
                    dois.insert(doi.to_string());
                }
                entries.push(work_to_bibtex(&work, &mut keys));
                info!("  + NEW: [{}] {}", work.kind, work.title());
            }
        }
        self.stats.new_entries = entries.len();

        let written = !options.dry_run && !entries.is_empty();
        if written {
            append_entries(bib_file, &entries)?;
            info!("Appended {} new entries to {}", entries.len(), bib_file.display());
        }
        Ok(BooksSummary {
            stats: self.stats,
            entries,
            written,
        })
    }

    /// Queries by family name with initials, then with the given name, and
    /// keeps the matching works once per DOI.
    fn search_member(&mut self, person: &PersonName, rows: usize) -> Vec<Work> {
        debug!(
            "  Family: {}, Given: {}, Initials: {}",
            person.family, person.given, person.initials
        );
        let queries = [
            (!person.initials.is_empty()).then(|| format!("{} {}", person.family, person.initials)),
            (!person.given.is_empty()).then(|| format!("{} {}", person.family, person.given)),
        ];

        let mut seen = HashSet::new();
        let mut matches = Vec::new();
        for query in queries.into_iter().flatten() {
            debug!("  Query: {query}");
            self.stats.total_queries += 1;
            let works = match self.source.search_works(&query, rows) {
                Ok(works) => works,
                Err(e) => {
                    warn!("Error querying Crossref: {e}");
                    continue;
                }
            };
            self.stats.total_results += works.len();

            for work in works {
                if !matches_author(&work, person) {
                    continue;
                }
                if let Some(doi) = work.doi() {
                    if !seen.insert(doi.to_string()) {
                        continue;
                    }
                }
                self.stats.filtered_matches += 1;
                matches.push(work);
            }
        }
        debug!("  Found {} unique matches", matches.len());
        matches
    }
}
