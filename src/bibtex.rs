//! BibTeX entry tokenizer, field reader and entry writer.
//!
//! Two segmentations are offered because the maintenance tasks need different
//! guarantees:
//!
//! - [`scan_entries`] counts braces. It is used where an entry is edited in
//!   place and the bytes around it must survive untouched.
//! - [`split_entries`] cuts at `@type{` markers at the start of a line. It is
//!   used where whole entries are kept, dropped or reordered.
//!
//! # Example
//!
//! ```
//! use bibkeeper::bibtex::split_entries;
//!
//! let bib = "@article{Smith20,\n  pmid = {123},\n}\n\n@book{Doe21,\n}\n";
//! let entries = split_entries(bib);
//! assert_eq!(entries[0].key, Some("Smith20"));
//! assert_eq!(entries[0].pmid, Some("123"));
//! assert_eq!(entries[1].kind, "book");
//! ```

mod fields;
mod scan;
mod split;
mod writer;

use std::path::Path;

use crate::{Error, Result};

pub use fields::{
    existing_dois, existing_keys, existing_pmids, extract_citations, extract_doi, extract_key,
    extract_pmid, month_number, parse_entry, parse_strings, Fields, ParsedEntry,
};
pub use scan::{scan_entries, Span};
pub use split::{preamble, split_entries, RawEntry};
pub use writer::{ascii_letters, escape_braces, unique_key, unique_key_within_alphabet, EntryBuilder};

const BOM: char = '\u{feff}';

/// Reads a bibliography file, dropping a leading byte-order mark.
pub fn read_bib(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(match content.strip_prefix(BOM) {
        Some(stripped) => stripped.to_string(),
        None => content,
    })
}

/// Like [`read_bib`], but a missing file reads as an empty bibliography.
pub fn read_bib_or_empty(path: &Path) -> Result<String> {
    if path.exists() {
        read_bib(path)
    } else {
        Ok(String::new())
    }
}

/// Writes `content` to `path`.
pub fn write_bib(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| Error::io(path, e))
}

/// Appends new entries, each preceded by a blank line.
pub fn append_entries(path: &Path, entries: &[String]) -> Result<()> {
    use std::io::Write;

    if entries.is_empty() {
        return Ok(());
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::io(path, e))?;
    let block = format!("\n\n{}", entries.join("\n\n"));
    file.write_all(block.as_bytes())
        .map_err(|e| Error::io(path, e))
}
