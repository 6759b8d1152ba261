//! Vancouver citation style, as used in medical and biomedical journals.
//!
//! ```
//! use std::collections::HashMap;
//! use bibkeeper::bibtex::parse_entry;
//! use bibkeeper::vancouver::format_vancouver;
//!
//! let entry = parse_entry(
//!     "@book{Tolboom24,\n  author = {Robert C. Tolboom},\n  title = {Title of Book},\n  address = {Amsterdam},\n  publisher = {Elsevier},\n  year = {2024},\n}",
//!     &HashMap::new(),
//! )
//! .unwrap();
//! assert_eq!(
//!     format_vancouver(&entry),
//!     "Tolboom RC. Title of Book. Amsterdam: Elsevier; 2024."
//! );
//! ```

use crate::author::{parse_names, Name};
use crate::bibtex::{Fields, ParsedEntry};

/// Authors listed before the list is cut short with `et al`.
pub const MAX_AUTHORS: usize = 6;

/// Formats one entry, choosing the layout from its type.
///
/// Types without a dedicated layout are formatted as articles.
pub fn format_vancouver(entry: &ParsedEntry) -> String {
    let authors = entry
        .fields
        .get("author")
        .map(parse_names)
        .unwrap_or_default();
    match entry.kind.as_str() {
        "book" => format_book(&authors, &entry.fields),
        "incollection" => format_incollection(&authors, &entry.fields),
        "phdthesis" | "mastersthesis" => format_thesis(&authors, &entry.fields),
        _ => format_article(&authors, &entry.fields),
    }
}

/// `Surname Initials` for each author, joined by `, `.
pub fn format_authors(authors: &[Name], max_authors: usize) -> String {
    let mut formatted = Vec::with_capacity(authors.len().min(max_authors + 1));
    for (idx, author) in authors.iter().enumerate() {
        if idx >= max_authors {
            formatted.push("et al".to_string());
            break;
        }
        let mut name = author.family();
        let initials = author.initials();
        if !initials.is_empty() {
            name.push(' ');
            name.push_str(&initials);
        }
        if !author.jr.is_empty() {
            name.push(' ');
            name.push_str(&author.jr);
        }
        formatted.push(name);
    }
    formatted.join(", ")
}

/// `Smith J, Doe J, editors` from a `John Smith and Jane Doe` field.
///
/// Editors are assumed to be written `FirstName LastName`.
pub fn format_editors(editors: &str) -> String {
    if editors.is_empty() {
        return String::new();
    }
    let formatted: Vec<String> = editors
        .split(" and ")
        .filter_map(|editor| {
            let parts: Vec<&str> = editor.split_whitespace().collect();
            match parts.as_slice() {
                [] => None,
                [single] => Some(single.to_string()),
                [first, .., last] => {
                    let initial: String = first.chars().take(1).flat_map(char::to_uppercase).collect();
                    Some(format!("{last} {initial}"))
                }
            }
        })
        .collect();
    let suffix = if formatted.len() == 1 { "editor" } else { "editors" };
    format!("{}, {suffix}", formatted.join(", "))
}

fn push_authors(parts: &mut Vec<String>, authors: &[Name], max_authors: usize) {
    let formatted = format_authors(authors, max_authors);
    if !formatted.is_empty() {
        parts.push(format!("{formatted}."));
    }
}

fn push_title(parts: &mut Vec<String>, fields: &Fields) {
    if let Some(title) = fields.get("title") {
        parts.push(format!("{}.", title.trim_end_matches('.')));
    }
}

fn pages(fields: &Fields) -> Option<String> {
    fields.get("pages").map(|pages| pages.replace("--", "-"))
}

/// `Place: Publisher; Year`, each part optional.
fn place_publisher_year(place: Option<&str>, publisher: Option<&str>, year: Option<&str>) -> Option<String> {
    let mut out: Option<String> = place.map(str::to_string);
    if let Some(publisher) = publisher {
        out = Some(match out {
            Some(place) => format!("{place}: {publisher}"),
            None => publisher.to_string(),
        });
    }
    if let Some(year) = year {
        out = Some(match out {
            Some(prefix) => format!("{prefix}; {year}"),
            None => year.to_string(),
        });
    }
    out
}

fn format_article(authors: &[Name], fields: &Fields) -> String {
    let mut parts = Vec::new();
    push_authors(&mut parts, authors, MAX_AUTHORS);
    push_title(&mut parts, fields);
    if let Some(journal) = fields.get("journal") {
        parts.push(format!("{journal}."));
    }

    // Year;Volume(Number):Pages
    let mut info: Vec<String> = Vec::new();
    if let Some(year) = fields.get("year") {
        info.push(year.to_string());
    }
    if let Some(volume) = fields.get("volume") {
        match fields.get("number") {
            Some(number) => info.push(format!("{volume}({number})")),
            None => info.push(volume.to_string()),
        }
    }
    if let Some(pages) = pages(fields) {
        match info.last_mut() {
            Some(last) => {
                last.push(':');
                last.push_str(&pages);
            }
            None => info.push(pages),
        }
    }
    if !info.is_empty() {
        parts.push(format!("{}.", info.join(";")));
    }
    parts.join(" ")
}

fn format_book(authors: &[Name], fields: &Fields) -> String {
    let mut parts = Vec::new();
    push_authors(&mut parts, authors, MAX_AUTHORS);
    push_title(&mut parts, fields);
    if let Some(imprint) = place_publisher_year(
        fields.get("address"),
        fields.get("publisher"),
        fields.get("year"),
    ) {
        parts.push(format!("{imprint}."));
    }
    parts.join(" ")
}

fn format_incollection(authors: &[Name], fields: &Fields) -> String {
    let mut parts = Vec::new();
    push_authors(&mut parts, authors, MAX_AUTHORS);
    push_title(&mut parts, fields);

    let mut in_part = String::from("In:");
    if let Some(editors) = fields.get("editor").map(format_editors) {
        if !editors.is_empty() {
            in_part.push_str(&format!(" {editors}."));
        }
    }
    if let Some(booktitle) = fields.get("booktitle") {
        in_part.push_str(&format!(" {}.", booktitle.trim_end_matches('.')));
    }
    parts.push(in_part);

    if let Some(imprint) = place_publisher_year(
        fields.get("address"),
        fields.get("publisher"),
        fields.get("year"),
    ) {
        parts.push(format!("{imprint}."));
    }
    if let Some(pages) = pages(fields) {
        parts.push(format!("p. {pages}."));
    }
    parts.join(" ")
}

fn format_thesis(authors: &[Name], fields: &Fields) -> String {
    let mut parts = Vec::new();
    push_authors(&mut parts, authors, 1);
    if let Some(title) = fields.get("title") {
        let is_masters = fields
            .get("type")
            .is_some_and(|kind| kind.to_lowercase().contains("master"));
        let label = if is_masters { "thesis" } else { "dissertation" };
        parts.push(format!("{} [{label}].", title.trim_end_matches('.')));
    }
    if let Some(imprint) = place_publisher_year(
        fields.get("address"),
        fields.get("school"),
        fields.get("year"),
    ) {
        parts.push(format!("{imprint}."));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bibtex::parse_entry;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::collections::HashMap;

    fn format(text: &str) -> String {
        format_vancouver(&parse_entry(text, &HashMap::new()).unwrap())
    }

    #[test]
    fn test_article() {
        let text = "@article{Tolboom24,\n  author = {Robert C. Tolboom and John Smith},\n  title = {Title of the article.},\n  journal = {Journal Name},\n  year = {2024},\n  volume = {15},\n  number = {3},\n  pages = {123--145},\n}";
        assert_eq!(
            format(text),
            "Tolboom RC, Smith J. Title of the article. Journal Name. 2024;15(3):123-145."
        );
    }

    #[test]
    fn test_article_pages_without_volume() {
        let text = "@article{a,\n  author = {Doe, Jane},\n  title = {T},\n  journal = {J},\n  year = {2020},\n  pages = {1--9},\n}";
        assert_eq!(format(text), "Doe J. T. J. 2020:1-9.");
    }

    #[test]
    fn test_book() {
        let text = "@book{a,\n  author = {Robert C. Tolboom},\n  title = {Title of Book},\n  publisher = {Elsevier},\n  year = {2024},\n}";
        assert_eq!(format(text), "Tolboom RC. Title of Book. Elsevier; 2024.");
    }

    #[test]
    fn test_incollection() {
        let text = "@incollection{a,\n  author = {Robert C. Tolboom},\n  title = {Chapter title},\n  editor = {John Smith and Jane Doe},\n  booktitle = {Book Title},\n  address = {Amsterdam},\n  publisher = {Elsevier},\n  year = {2024},\n  pages = {123--145},\n}";
        assert_eq!(
            format(text),
            "Tolboom RC. Chapter title. In: Smith J, Doe J, editors. Book Title. Amsterdam: Elsevier; 2024. p. 123-145."
        );
    }

    #[rstest]
    #[case("phdthesis", "", "Tolboom RC. Title [dissertation]. Groningen: University of Groningen; 2024.")]
    #[case("mastersthesis", "  type = {Master's thesis},\n", "Tolboom RC. Title [thesis]. Groningen: University of Groningen; 2024.")]
    fn test_thesis(#[case] kind: &str, #[case] extra: &str, #[case] expected: &str) {
        let text = format!(
            "@{kind}{{a,\n  author = {{Robert C. Tolboom}},\n  title = {{Title}},\n  address = {{Groningen}},\n  school = {{University of Groningen}},\n  year = {{2024}},\n{extra}}}"
        );
        assert_eq!(format(&text), expected);
    }

    #[test]
    fn test_unknown_type_uses_article_layout() {
        let text = "@misc{a,\n  author = {Jane Doe},\n  title = {Preprint},\n  year = {2023},\n}";
        assert_eq!(format(text), "Doe J. Preprint. 2023.");
    }

    #[test]
    fn test_authors_truncated_after_six() {
        let authors = parse_names("A One and B Two and C Three and D Four and E Five and F Six and G Seven and H Eight");
        assert_eq!(
            format_authors(&authors, MAX_AUTHORS),
            "One A, Two B, Three C, Four D, Five E, Six F, et al"
        );
    }

    #[test]
    fn test_authors_with_von_and_jr() {
        let authors = parse_names("van Ginneken, Bram and King, Jr, Martin Luther");
        assert_eq!(format_authors(&authors, MAX_AUTHORS), "van Ginneken B, King ML Jr");
    }

    #[rstest]
    #[case("John Smith", "Smith J, editor")]
    #[case("John Smith and Jane Doe", "Smith J, Doe J, editors")]
    #[case("WHO", "WHO, editor")]
    #[case("", "")]
    fn test_format_editors(#[case] editors: &str, #[case] expected: &str) {
        assert_eq!(format_editors(editors), expected);
    }
}
