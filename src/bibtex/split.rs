use std::sync::LazyLock;

use crate::bibtex::fields::{extract_key, extract_pmid};
use crate::regex::{literal, Regex};

static ENTRY_START: LazyLock<Regex> = LazyLock::new(|| literal(r"(?:^|\n)@(\w+)\s*\{"));

/// One entry of a BibTeX file, delimited by line-anchored `@type{` markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry<'a> {
    /// The entry text with trailing whitespace removed.
    pub text: &'a str,
    /// Byte offset of the `@`.
    pub start: usize,
    /// Byte offset where the next entry starts, or the end of the file.
    pub end: usize,
    /// Lowercased entry type, e.g. `article` or `string`.
    pub kind: String,
    pub key: Option<&'a str>,
    pub pmid: Option<&'a str>,
}

impl RawEntry<'_> {
    /// `@string`, `@preamble` and `@comment` blocks carry no publication.
    pub fn is_publication(&self) -> bool {
        !matches!(self.kind.as_str(), "string" | "preamble" | "comment")
    }
}

/// Splits `content` into entries whose `@` sits at the start of a line.
///
/// An `@` in the middle of a line (an e-mail address in an abstract, say) never
/// starts an entry. Each entry extends up to the line where the next one starts.
pub fn split_entries(content: &str) -> Vec<RawEntry<'_>> {
    let starts: Vec<(usize, String)> = ENTRY_START
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let mut start = whole.start();
            if content.as_bytes()[start] == b'\n' {
                start += 1;
            }
            Some((start, caps[1].to_lowercase()))
        })
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, (start, kind))| {
            let end = starts
                .get(i + 1)
                .map_or(content.len(), |(next_start, _)| *next_start);
            let text = content[*start..end].trim_end();
            RawEntry {
                text,
                start: *start,
                end,
                kind: kind.clone(),
                key: extract_key(text),
                pmid: extract_pmid(text),
            }
        })
        .collect()
}

/// Everything before the first line-anchored entry, with trailing whitespace removed.
pub fn preamble(content: &str) -> &str {
    ENTRY_START
        .find(content)
        .map_or(content, |m| &content[..m.start()])
        .trim_end()
}
