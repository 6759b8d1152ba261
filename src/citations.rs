//! Citation counts: keeps a `citations = {N}` field on every entry with a DOI
//! in step with the count a [`CitationSource`] reports.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bibtex::{extract_citations, extract_doi, read_bib, scan_entries, write_bib};
use crate::rate_limit::RateLimiter;
use crate::regex::{literal, Regex};
use crate::{Error, Result};

static CITATIONS_FIELD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| literal(r"(?i)(\s+citations\s*=\s*\{)\d+(\},?\s*\n)"));

/// Progress is logged at info level once per this many DOI entries.
const PROGRESS_EVERY: usize = 50;

/// Anything that can report how often a DOI has been cited.
pub trait CitationSource {
    fn citation_count(&self, doi: &str) -> Result<u64>;
}

impl<S: CitationSource + ?Sized> CitationSource for &S {
    fn citation_count(&self, doi: &str) -> Result<u64> {
        (**self).citation_count(doi)
    }
}

/// What [`upsert_citations`] did to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationChange {
    Added,
    Updated,
}

/// Sets the `citations` field of one entry to `count`.
///
/// An existing field is rewritten in place. Otherwise the field is inserted
/// as the last field, or appended with a new closing brace when the entry
/// does not end in a line holding only `}`.
pub fn upsert_citations(entry: &str, count: u64) -> (String, CitationChange) {
    if CITATIONS_FIELD_REGEX.is_match(entry) {
        let replacement = format!("${{1}}{count}${{2}}");
        let updated = CITATIONS_FIELD_REGEX.replace_all(entry, replacement.as_str());
        return (updated.into_owned(), CitationChange::Updated);
    }

    let mut lines: Vec<String> = entry.trim_end().split('\n').map(str::to_string).collect();
    let closes_on_own_line = lines.last().is_some_and(|line| line.trim() == "}");
    if closes_on_own_line && lines.len() >= 2 {
        let insert_at = lines.len() - 1;
        let previous = &mut lines[insert_at - 1];
        if !previous.trim_end().ends_with(',') {
            *previous = format!("{},", previous.trim_end());
        }
        lines.insert(insert_at, format!("  citations = {{{count}}},"));
        (lines.join("\n"), CitationChange::Added)
    } else {
        (
            format!("{}\n  citations = {{{count}}},\n}}\n", entry.trim_end()),
            CitationChange::Added,
        )
    }
}

/// Counters for one citation update pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CitationStats {
    pub total_entries: usize,
    pub with_doi: usize,
    pub api_success: usize,
    pub api_failure: usize,
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl fmt::Display for CitationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total entries:        {}", self.total_entries)?;
        writeln!(f, "Entries with DOI:     {}", self.with_doi)?;
        writeln!(f, "API successful:       {}", self.api_success)?;
        writeln!(f, "API failed:           {}", self.api_failure)?;
        writeln!(f, "Citations added:      {}", self.added)?;
        writeln!(f, "Citations updated:    {}", self.updated)?;
        write!(f, "Citations unchanged:  {}", self.unchanged)
    }
}

/// Result of [`CitationUpdater::run`].
#[derive(Debug, Clone)]
pub struct CitationReport {
    pub stats: CitationStats,
    pub elapsed: Duration,
    /// Where the original file was copied, unless this was a dry run.
    pub backup: Option<PathBuf>,
}

/// Walks a bibliography and refreshes citation counts from a source.
pub struct CitationUpdater<S> {
    source: S,
    limiter: RateLimiter,
}

impl<S: CitationSource> CitationUpdater<S> {
    pub fn new(source: S, rate_limit: Duration) -> Self {
        Self {
            source,
            limiter: RateLimiter::new(rate_limit),
        }
    }

    /// Returns the updated content and the counters for this pass.
    ///
    /// With `limit = Some(n)` only the first `n` entries carrying a DOI are
    /// looked up. Everything after them is kept verbatim. A limit of 0 means
    /// no limit.
    pub fn update(&mut self, content: &str, limit: Option<usize>) -> (String, CitationStats) {
        let limit = limit.filter(|&limit| limit > 0);
        let spans = scan_entries(content);
        let mut stats = CitationStats {
            total_entries: spans.len(),
            ..CitationStats::default()
        };
        info!("Found {} entries", spans.len());

        let mut output = String::with_capacity(content.len());
        let mut copied_to = 0;

        for span in &spans {
            let entry = span.slice(content);
            if entry.trim().to_lowercase().starts_with("@comment") {
                continue;
            }
            let Some(doi) = extract_doi(entry) else {
                continue;
            };

            stats.with_doi += 1;
            if limit.is_some_and(|limit| stats.with_doi > limit) {
                stats.with_doi -= 1;
                info!("Reached limit of {} entries with DOI", stats.with_doi);
                break;
            }
            if stats.with_doi % PROGRESS_EVERY == 0 {
                info!("Processing {}/{}: DOI {doi}", stats.with_doi, stats.total_entries);
            } else {
                debug!("Processing {}/{}: DOI {doi}", stats.with_doi, stats.total_entries);
            }

            self.limiter.acquire();
            let count = match self.source.citation_count(doi) {
                Ok(count) => {
                    stats.api_success += 1;
                    count
                }
                Err(e) => {
                    stats.api_failure += 1;
                    warn!("Citation lookup failed for DOI {doi}: {e}");
                    continue;
                }
            };

            let current = extract_citations(entry);
            if current == Some(count) {
                stats.unchanged += 1;
                debug!("  Citations unchanged: {count}");
                continue;
            }

            let (updated, change) = upsert_citations(entry, count);
            match change {
                CitationChange::Added => stats.added += 1,
                CitationChange::Updated => stats.updated += 1,
            }
            debug!("  {change:?} citations: {current:?} -> {count}");

            output.push_str(&content[copied_to..span.start]);
            output.push_str(&updated);
            copied_to = span.end;
        }

        output.push_str(&content[copied_to..]);
        (output, stats)
    }

    /// Updates the file at `path`, keeping a copy of the original at
    /// `<path>.backup`. A dry run only reports.
    pub fn run(&mut self, path: &Path, limit: Option<usize>, dry_run: bool) -> Result<CitationReport> {
        let started = Instant::now();
        info!("Reading {}", path.display());
        let content = read_bib(path)?;
        let (updated, stats) = self.update(&content, limit);

        let backup = if dry_run {
            info!("Dry run, no changes written");
            None
        } else {
            let backup = backup_path(path);
            info!("Creating backup: {}", backup.display());
            std::fs::copy(path, &backup).map_err(|e| Error::io(&backup, e))?;
            info!("Writing updated file: {}", path.display());
            write_bib(path, &updated)?;
            Some(backup)
        };

        Ok(CitationReport {
            stats,
            elapsed: started.elapsed(),
            backup,
        })
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".backup");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeSource {
        counts: HashMap<&'static str, u64>,
        queried: RefCell<Vec<String>>,
    }

    impl FakeSource {
        fn new(counts: &[(&'static str, u64)]) -> Self {
            Self {
                counts: counts.iter().copied().collect(),
                queried: RefCell::new(Vec::new()),
            }
        }
    }

    impl CitationSource for FakeSource {
        fn citation_count(&self, doi: &str) -> Result<u64> {
            self.queried.borrow_mut().push(doi.to_string());
            self.counts.get(doi).copied().ok_or(Error::Api {
                service: "crossref",
                status: 404,
            })
        }
    }

    const BIB: &str = "@string{jama = {JAMA}}\n\n@article{A,\n  title = {One},\n  doi = {10.1/a}\n}\n\n@comment{doi = {10.1/c}}\n\n@article{B,\n  doi = {10.1/b},\n  citations = {3},\n}\n\n@article{C,\n  doi = {10.1/missing},\n}\n\n@article{D,\n  title = {No DOI},\n}\n";

    #[test]
    fn test_upsert_adds_field_with_comma() {
        let (updated, change) = upsert_citations("@article{A,\n  doi = {10.1/a}\n}", 7);
        assert_eq!(change, CitationChange::Added);
        assert_eq!(updated, "@article{A,\n  doi = {10.1/a},\n  citations = {7},\n}");
    }

    #[test]
    fn test_upsert_updates_existing_field() {
        let (updated, change) =
            upsert_citations("@article{A,\n  Citations = {2},\n  doi = {x},\n}", 9);
        assert_eq!(change, CitationChange::Updated);
        assert_eq!(updated, "@article{A,\n  Citations = {9},\n  doi = {x},\n}");
    }

    #[test]
    fn test_upsert_appends_when_closing_brace_is_inline() {
        let (updated, change) = upsert_citations("@article{A, doi = {x}}", 1);
        assert_eq!(change, CitationChange::Added);
        assert_eq!(updated, "@article{A, doi = {x}}\n  citations = {1},\n}\n");
    }

    #[test]
    fn test_update_counts_and_splices() {
        let source = FakeSource::new(&[("10.1/a", 5), ("10.1/b", 3), ("10.1/c", 1)]);
        let mut updater = CitationUpdater::new(&source, Duration::ZERO);
        let (updated, stats) = updater.update(BIB, None);

        assert_eq!(
            stats,
            CitationStats {
                total_entries: 6,
                with_doi: 3,
                api_success: 2,
                api_failure: 1,
                added: 1,
                updated: 0,
                unchanged: 1,
            }
        );
        assert_eq!(
            updated,
            BIB.replace(
                "  doi = {10.1/a}\n}",
                "  doi = {10.1/a},\n  citations = {5},\n}"
            )
        );
        assert_eq!(
            *source.queried.borrow(),
            vec!["10.1/a", "10.1/b", "10.1/missing"]
        );
    }

    #[test]
    fn test_update_respects_limit() {
        let source = FakeSource::new(&[("10.1/a", 5), ("10.1/b", 4)]);
        let mut updater = CitationUpdater::new(&source, Duration::ZERO);
        let (updated, stats) = updater.update(BIB, Some(1));

        assert_eq!(stats.with_doi, 1);
        assert_eq!(stats.added, 1);
        assert_eq!(*source.queried.borrow(), vec!["10.1/a"]);
        assert!(updated.contains("citations = {3}"));
    }

    #[test]
    fn test_zero_limit_means_all() {
        let source = FakeSource::new(&[("10.1/a", 5), ("10.1/b", 4)]);
        let mut updater = CitationUpdater::new(&source, Duration::ZERO);
        let (_, stats) = updater.update(BIB, Some(0));

        assert_eq!(stats.with_doi, 3);
        assert_eq!(
            *source.queried.borrow(),
            vec!["10.1/a", "10.1/b", "10.1/missing"]
        );
    }

    #[test]
    fn test_run_writes_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs.bib");
        std::fs::write(&path, BIB).unwrap();

        let source = FakeSource::new(&[("10.1/a", 5), ("10.1/b", 8)]);
        let report = CitationUpdater::new(&source, Duration::ZERO)
            .run(&path, None, false)
            .unwrap();

        assert_eq!(report.stats.updated, 1);
        assert_eq!(report.backup, Some(dir.path().join("refs.bib.backup")));
        assert_eq!(std::fs::read_to_string(dir.path().join("refs.bib.backup")).unwrap(), BIB);
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("citations = {8}"));
        assert!(written.contains("citations = {5}"));
    }

    #[test]
    fn test_dry_run_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs.bib");
        std::fs::write(&path, BIB).unwrap();

        let source = FakeSource::new(&[("10.1/a", 5)]);
        let report = CitationUpdater::new(&source, Duration::ZERO)
            .run(&path, None, true)
            .unwrap();

        assert_eq!(report.backup, None);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), BIB);
        assert!(!dir.path().join("refs.bib.backup").exists());
    }
}
