//! Adding a PhD thesis: a `@phdthesis` entry inserted in key order plus a
//! cover image named after the entry key.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::bibtex::{
    ascii_letters, escape_braces, existing_keys, preamble, read_bib_or_empty, split_entries,
    unique_key_within_alphabet, write_bib, EntryBuilder,
};
use crate::members::find_member;
use crate::{Error, Result};

const MIN_ABSTRACT_CHARS: usize = 50;

/// Who wrote the thesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThesisAuthor {
    /// A member slug; the name is read from the member's profile.
    Member(String),
    /// A name used as given.
    Name(String),
}

/// Everything needed to add one thesis.
#[derive(Debug, Clone)]
pub struct ThesisRequest {
    pub author: ThesisAuthor,
    pub title: String,
    pub year: i32,
    pub month: Option<u32>,
    pub school: String,
    pub promotor: String,
    pub copromotor: Option<String>,
    pub url: String,
    pub abstract_text: String,
    pub cover_image: PathBuf,
}

impl ThesisRequest {
    fn validate(&self) -> Result<()> {
        if !(1900..=2100).contains(&self.year) {
            return Err(Error::invalid("year", format!("{} seems invalid", self.year)));
        }
        if let Some(month) = self.month {
            if !(1..=12).contains(&month) {
                return Err(Error::invalid("month", "must be between 1 and 12"));
            }
        }
        if !self.cover_image.is_file() {
            return Err(Error::invalid(
                "cover image",
                format!("not found: {}", self.cover_image.display()),
            ));
        }
        let chars = self.abstract_text.chars().count();
        if chars < MIN_ABSTRACT_CHARS {
            warn!("Abstract is very short ({chars} chars)");
        }
        Ok(())
    }
}

/// What [`add_thesis`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThesisOutcome {
    pub key: String,
    pub author: String,
    pub cover: PathBuf,
}

/// `LastnameYYYY`, with a single-letter suffix when taken.
pub fn thesis_key(author: &str, year: i32, existing: &HashSet<String>) -> Result<String> {
    let last = author
        .split_whitespace()
        .last()
        .ok_or_else(|| Error::invalid("author", "name is empty"))?;
    let last = ascii_letters(last);
    if last.is_empty() {
        return Err(Error::invalid(
            "author",
            format!("could not extract a valid last name from '{author}'"),
        ));
    }
    let base = format!("{last}{year}");
    let key = unique_key_within_alphabet(&base, existing)?;
    if key != base {
        info!("{base} already exists, using {key}");
    }
    Ok(key)
}

/// Renders the `@phdthesis` entry.
pub fn render_thesis(key: &str, author: &str, request: &ThesisRequest) -> String {
    EntryBuilder::new("phdthesis", key)
        .field("author", author)
        .field("title", request.title.trim_end_matches('.'))
        .field("school", request.school.as_str())
        .field("year", request.year.to_string())
        .field("promotor", request.promotor.as_str())
        .optional("copromotor", request.copromotor.as_deref())
        .optional("optmonth", request.month.map(|m| m.to_string()).as_deref())
        .field("url", request.url.as_str())
        .field("abstract", escape_braces(&request.abstract_text))
        .field("journal", "PhD thesis")
        .build()
}

/// Inserts `entry` so that the entries stay sorted by key, ignoring case.
///
/// Text before the first entry, `@string` and `@preamble` blocks and blocks
/// without a key stay at the top in their original order. Entries are
/// separated by a blank line and the file ends with a newline.
pub fn insert_sorted(content: &str, key: &str, entry: &str) -> String {
    let mut header: Vec<&str> = Vec::new();
    let head = preamble(content);
    if !head.is_empty() {
        header.push(head);
    }

    let mut entries: Vec<(&str, &str)> = Vec::new();
    for raw in split_entries(content) {
        match raw.key {
            Some(existing) if raw.kind != "string" && raw.kind != "preamble" => {
                entries.push((existing, raw.text))
            }
            _ => header.push(raw.text),
        }
    }
    entries.push((key, entry));
    entries.sort_by_key(|(key, _)| key.to_lowercase());

    let mut rebuilt = header.join("\n\n");
    if !rebuilt.is_empty() {
        rebuilt.push_str("\n\n");
    }
    rebuilt.push_str(
        &entries
            .iter()
            .map(|(_, text)| *text)
            .collect::<Vec<_>>()
            .join("\n\n"),
    );
    rebuilt.push('\n');
    rebuilt
}

/// Copies the cover to `<dir>/<Key>.png`, creating `dir` if needed.
pub fn save_cover(source: &Path, key: &str, dir: &Path) -> Result<PathBuf> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        info!("Created directory: {}", dir.display());
    }
    let mut chars = key.chars();
    let file_name = match chars.next() {
        Some(first) => format!("{}{}.png", first.to_uppercase(), chars.as_str()),
        None => return Err(Error::invalid("key", "empty BibTeX key")),
    };
    let target = dir.join(file_name);
    std::fs::copy(source, &target).map_err(|e| Error::io(&target, e))?;
    info!("Saved cover image: {}", target.display());
    Ok(target)
}

/// Adds the thesis to `bib_file` and stores its cover under `theses_dir`.
pub fn add_thesis(
    members_dir: &Path,
    bib_file: &Path,
    theses_dir: &Path,
    request: &ThesisRequest,
) -> Result<ThesisOutcome> {
    let author = match &request.author {
        ThesisAuthor::Member(slug) => {
            let member = find_member(members_dir, slug)?;
            info!("Author (from member '{slug}'): {}", member.publication_name());
            member.publication_name().to_string()
        }
        ThesisAuthor::Name(name) => name.clone(),
    };
    request.validate()?;

    let content = read_bib_or_empty(bib_file)?;
    let keys = existing_keys(&content);
    info!("Found {} existing entries", keys.len());
    let key = thesis_key(&author, request.year, &keys)?;
    info!("Generated BibTeX key: {key}");

    let entry = render_thesis(&key, &author, request);
    let cover = save_cover(&request.cover_image, &key, theses_dir)?;

    if bib_file.exists() {
        write_bib(bib_file, &insert_sorted(&content, &key, &entry))?;
        info!("Added entry to {} (sorted by key)", bib_file.display());
    } else {
        write_bib(bib_file, &format!("{entry}\n"))?;
        info!("Created {} with new entry", bib_file.display());
    }

    Ok(ThesisOutcome { key, author, cover })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(cover: PathBuf) -> ThesisRequest {
        ThesisRequest {
            author: ThesisAuthor::Name("Thiago Ramos Grigio".to_string()),
            title: "Perioperative care.".to_string(),
            year: 2024,
            month: Some(6),
            school: "University of Groningen".to_string(),
            promotor: "Prof. A. B. Promotor".to_string(),
            copromotor: None,
            url: "https://research.rug.nl/thesis".to_string(),
            abstract_text: "A study of {things} that is long enough to avoid the warning.".to_string(),
            cover_image: cover,
        }
    }

    #[test]
    fn test_thesis_key() {
        let mut existing = HashSet::new();
        assert_eq!(thesis_key("Thiago Ramos Grigio", 2024, &existing).unwrap(), "Grigio2024");
        existing.insert("Grigio2024".to_string());
        assert_eq!(thesis_key("Thiago Ramos Grigio", 2024, &existing).unwrap(), "Grigio2024a");
        assert_eq!(thesis_key("Anna O'Neill", 2023, &existing).unwrap(), "ONeill2023");
        assert!(matches!(thesis_key("  ", 2024, &existing), Err(Error::InvalidArgument { .. })));
        assert!(matches!(thesis_key("Jan Ñ", 2024, &existing), Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_render_thesis() {
        let entry = render_thesis("Grigio2024", "Thiago Ramos Grigio", &request(PathBuf::new()));
        assert_eq!(
            entry,
            "@phdthesis{Grigio2024,\n  author = {Thiago Ramos Grigio},\n  title = {Perioperative care},\n  school = {University of Groningen},\n  year = {2024},\n  promotor = {Prof. A. B. Promotor},\n  optmonth = {6},\n  url = {https://research.rug.nl/thesis},\n  abstract = {A study of \\{things\\} that is long enough to avoid the warning.},\n  journal = {PhD thesis},\n}"
        );
    }

    #[test]
    fn test_insert_sorted_keeps_header_blocks() {
        let content = "% generated\n@string{rug = {University of Groningen}}\n\n@article{beta,\n}\n\n@article{Delta,\n}\n";
        let rebuilt = insert_sorted(content, "Charlie", "@phdthesis{Charlie,\n}");
        assert_eq!(
            rebuilt,
            "% generated\n\n@string{rug = {University of Groningen}}\n\n@article{beta,\n}\n\n@phdthesis{Charlie,\n}\n\n@article{Delta,\n}\n"
        );
    }

    #[test]
    fn test_add_thesis_creates_files() {
        let dir = tempfile::tempdir().unwrap();
        let cover = dir.path().join("cover.png");
        std::fs::write(&cover, b"png").unwrap();
        let bib = dir.path().join("refs.bib");
        std::fs::write(&bib, "@article{Grigio2024,\n}\n").unwrap();
        let theses = dir.path().join("images").join("theses");

        let outcome = add_thesis(dir.path(), &bib, &theses, &request(cover)).unwrap();

        assert_eq!(outcome.key, "Grigio2024a");
        assert_eq!(outcome.cover, theses.join("Grigio2024a.png"));
        assert_eq!(std::fs::read(&outcome.cover).unwrap(), b"png");
        let written = std::fs::read_to_string(&bib).unwrap();
        assert!(written.starts_with("@article{Grigio2024,\n}\n\n@phdthesis{Grigio2024a,\n"));
        assert!(written.ends_with("}\n"));
    }

    #[test]
    fn test_add_thesis_for_member_to_new_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rob-tolboom.md"),
            "name: Rob Tolboom\npub_name: Robert C. Tolboom\n",
        )
        .unwrap();
        let cover = dir.path().join("cover.png");
        std::fs::write(&cover, b"png").unwrap();
        let bib = dir.path().join("new.bib");

        let mut req = request(cover);
        req.author = ThesisAuthor::Member("rob-tolboom".to_string());
        let outcome = add_thesis(dir.path(), &bib, &dir.path().join("covers"), &req).unwrap();

        assert_eq!(outcome.key, "Tolboom2024");
        assert_eq!(outcome.author, "Robert C. Tolboom");
        let written = std::fs::read_to_string(&bib).unwrap();
        assert!(written.starts_with("@phdthesis{Tolboom2024,\n  author = {Robert C. Tolboom},"));
    }

    #[test]
    fn test_validation() {
        let dir = tempfile::tempdir().unwrap();
        let bib = dir.path().join("refs.bib");

        let missing_cover = request(dir.path().join("absent.png"));
        assert!(matches!(
            add_thesis(dir.path(), &bib, dir.path(), &missing_cover),
            Err(Error::InvalidArgument { field: "cover image", .. })
        ));

        let cover = dir.path().join("cover.png");
        std::fs::write(&cover, b"png").unwrap();
        let mut bad_year = request(cover.clone());
        bad_year.year = 1850;
        assert!(matches!(
            add_thesis(dir.path(), &bib, dir.path(), &bad_year),
            Err(Error::InvalidArgument { field: "year", .. })
        ));

        let mut bad_month = request(cover);
        bad_month.month = Some(13);
        assert!(matches!(
            add_thesis(dir.path(), &bib, dir.path(), &bad_month),
            Err(Error::InvalidArgument { field: "month", .. })
        ));
        assert!(!bib.exists());
    }
}
