use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::regex::{literal, Regex};

static KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| literal(r"@(\w+)\s*\{\s*([^,\s]+)\s*,"));
static PMID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| literal(r#"(?i)pmid\s*=\s*[{"]?(\d+)[}"]?"#));
static DOI_REGEX: LazyLock<Regex> = LazyLock::new(|| literal(r"(?i)doi\s*=\s*\{([^}]+)\}"));
static CITATIONS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| literal(r"(?i)citations\s*=\s*\{(\d+)\}"));

/// The citation key of the first entry header in `text`.
pub fn extract_key(text: &str) -> Option<&str> {
    KEY_REGEX
        .captures(text)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str())
}

/// The first `pmid` field value in `text`, quoted, braced or bare.
pub fn extract_pmid(text: &str) -> Option<&str> {
    PMID_REGEX
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// The first braced `doi` field value in `text`, trimmed.
pub fn extract_doi(text: &str) -> Option<&str> {
    DOI_REGEX
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|doi| !doi.is_empty())
}

/// The numeric `citations` field value in `text`.
pub fn extract_citations(text: &str) -> Option<u64> {
    CITATIONS_REGEX
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Month number for a month name, its three-letter abbreviation or a
/// number from 1 to 12. Case is ignored.
pub fn month_number(text: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];
    let text = text.trim().to_lowercase();
    if let Ok(number) = text.parse::<u32>() {
        return (1..=12).contains(&number).then_some(number);
    }
    MONTHS
        .iter()
        .position(|month| *month == text || (text.len() == 3 && month.starts_with(&text)))
        .and_then(|idx| u32::try_from(idx + 1).ok())
}

/// Every citation key declared anywhere in `content`.
pub fn existing_keys(content: &str) -> HashSet<String> {
    KEY_REGEX
        .captures_iter(content)
        .filter_map(|caps| caps.get(2).map(|m| m.as_str().to_string()))
        .collect()
}

/// Every PMID declared anywhere in `content`.
pub fn existing_pmids(content: &str) -> HashSet<String> {
    PMID_REGEX
        .captures_iter(content)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Every DOI declared anywhere in `content`.
pub fn existing_dois(content: &str) -> HashSet<String> {
    DOI_REGEX
        .captures_iter(content)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .collect()
}

/// Field names and values of one entry, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(String, String)>);

impl Fields {
    /// Value of the field `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Fields(
            iter.into_iter()
                .map(|(name, value)| (name.into().to_lowercase(), value.into()))
                .collect(),
        )
    }
}

/// A fully parsed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    pub kind: String,
    pub key: String,
    pub fields: Fields,
}

/// Parses an entry header and all of its fields.
///
/// Bare values that name an `@string` macro from `strings` are expanded and
/// `#` concatenations are joined. Whitespace inside values is collapsed.
pub fn parse_entry(text: &str, strings: &HashMap<String, String>) -> Option<ParsedEntry> {
    let rest = text.trim_start().strip_prefix('@')?;
    let open = rest.find(['{', '('])?;
    let kind = rest[..open].trim().to_lowercase();
    let body = &rest[open + 1..];
    let comma = body.find(',')?;
    let key = body[..comma].trim().to_string();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some(ParsedEntry {
        kind,
        key,
        fields: parse_field_list(&body[comma + 1..], strings),
    })
}

/// Reads `@string{name = value}` macros declared in `content`.
///
/// Macro names are lowercased. Later macros may refer to earlier ones.
pub fn parse_strings(content: &str) -> HashMap<String, String> {
    let mut strings = HashMap::new();
    for entry in super::split_entries(content) {
        if entry.kind != "string" {
            continue;
        }
        let Some(open) = entry.text.find(['{', '(']) else {
            continue;
        };
        let fields = parse_field_list(&entry.text[open + 1..], &strings);
        for (name, value) in fields.0 {
            strings.insert(name, value);
        }
    }
    strings
}

fn parse_field_list(body: &str, strings: &HashMap<String, String>) -> Fields {
    let mut cursor = Cursor::new(body);
    let mut fields = Vec::new();

    loop {
        cursor.skip_while(|c| c.is_whitespace() || c == ',');
        match cursor.peek() {
            None | Some('}') | Some(')') => break,
            _ => (),
        }
        let name = cursor.take_while(|c| c != '=' && c != '}' && c != ',');
        let name = name.trim().to_lowercase();
        if cursor.peek() != Some('=') {
            // malformed field without a value
            continue;
        }
        cursor.bump();
        let value = read_value(&mut cursor, strings);
        if !name.is_empty() {
            fields.push((name, collapse_whitespace(&value)));
        }
    }
    Fields(fields)
}

fn read_value(cursor: &mut Cursor<'_>, strings: &HashMap<String, String>) -> String {
    let mut value = String::new();
    loop {
        cursor.skip_while(char::is_whitespace);
        match cursor.peek() {
            Some('{') => {
                cursor.bump();
                value.push_str(&cursor.take_balanced('}'));
            }
            Some('"') => {
                cursor.bump();
                value.push_str(&cursor.take_balanced('"'));
            }
            Some(_) => {
                let token = cursor.take_while(|c| !(c == ',' || c == '}' || c == '#' || c.is_whitespace()));
                if token.is_empty() {
                    break;
                }
                match strings.get(&token.to_lowercase()) {
                    Some(expanded) => value.push_str(expanded),
                    None => value.push_str(&token),
                }
            }
            None => break,
        }
        cursor.skip_while(char::is_whitespace);
        if cursor.peek() == Some('#') {
            cursor.bump();
        } else {
            break;
        }
    }
    value
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn skip_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    /// Reads up to `close` at brace depth zero and consumes the delimiter.
    /// Inner braces are kept, the delimiter is not. A backslash escapes the
    /// following character.
    fn take_balanced(&mut self, close: char) -> String {
        let mut out = String::new();
        let mut depth = 0usize;
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    out.push(c);
                    if let Some(next) = self.bump() {
                        out.push(next);
                    }
                }
                c if c == close && depth == 0 => break,
                '{' => {
                    depth += 1;
                    out.push(c);
                }
                '}' => {
                    depth = depth.saturating_sub(1);
                    out.push(c);
                }
                _ => out.push(c),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("@article{Smith20,\n", Some("Smith20"))]
    #[case("@article { Smith20 ,", Some("Smith20"))]
    #[case("@string{jama = {JAMA}}", None)]
    fn test_extract_key(#[case] text: &str, #[case] expected: Option<&str>) {
        assert_eq!(extract_key(text), expected);
    }

    #[rstest]
    #[case("  pmid = {12345},", Some("12345"))]
    #[case("  PMID = \"12345\",", Some("12345"))]
    #[case("  pmid=12345,", Some("12345"))]
    #[case("  title = {No id},", None)]
    fn test_extract_pmid(#[case] text: &str, #[case] expected: Option<&str>) {
        assert_eq!(extract_pmid(text), expected);
    }

    #[test]
    fn test_extract_doi_and_citations() {
        let text = "@article{a,\n  DOI = { 10.1000/xyz },\n  citations = {17},\n}";
        assert_eq!(extract_doi(text), Some("10.1000/xyz"));
        assert_eq!(extract_citations(text), Some(17));
        assert_eq!(extract_citations("@article{a,\n}"), None);
    }

    #[rstest]
    #[case("Jan", Some(1))]
    #[case("september", Some(9))]
    #[case("SEP", Some(9))]
    #[case("05", Some(5))]
    #[case("13", None)]
    #[case("Spring", None)]
    #[case("ju", None)]
    fn test_month_number(#[case] text: &str, #[case] expected: Option<u32>) {
        assert_eq!(month_number(text), expected);
    }

    #[test]
    fn test_existing_sets() {
        let content = "@article{A1,\n  pmid = {1},\n  doi = {10.1/a},\n}\n@book{B2,\n  pmid = {2},\n}\n";
        assert_eq!(existing_keys(content), HashSet::from(["A1".to_string(), "B2".to_string()]));
        assert_eq!(existing_pmids(content), HashSet::from(["1".to_string(), "2".to_string()]));
        assert_eq!(existing_dois(content), HashSet::from(["10.1/a".to_string()]));
    }

    #[test]
    fn test_parse_entry_values() {
        let strings = HashMap::from([("jama".to_string(), "JAMA".to_string())]);
        let text = "@Article{Smith20,\n  author = {Smith, John and {World Health Organization}},\n  title = \"A {GPU} study\n     of things\",\n  journal = jama,\n  year = 2020,\n  month = jan,\n  note = {Part } # jama,\n}";
        let entry = parse_entry(text, &strings).unwrap();
        assert_eq!(entry.kind, "article");
        assert_eq!(entry.key, "Smith20");
        assert_eq!(
            entry.fields.get("author"),
            Some("Smith, John and {World Health Organization}")
        );
        assert_eq!(entry.fields.get("title"), Some("A {GPU} study of things"));
        assert_eq!(entry.fields.get("journal"), Some("JAMA"));
        assert_eq!(entry.fields.get("YEAR"), Some("2020"));
        assert_eq!(entry.fields.get("month"), Some("jan"));
        assert_eq!(entry.fields.get("note"), Some("Part JAMA"));
        assert_eq!(entry.fields.len(), 6);
    }

    #[test]
    fn test_parse_entry_escaped_braces() {
        let text = "@phdthesis{Doe2024,\n  abstract = {Uses \\{braces\\} inline},\n}";
        let entry = parse_entry(text, &HashMap::new()).unwrap();
        assert_eq!(entry.fields.get("abstract"), Some("Uses \\{braces\\} inline"));
    }

    #[test]
    fn test_parse_entry_rejects_headerless_text() {
        assert_eq!(parse_entry("not an entry", &HashMap::new()), None);
        assert_eq!(parse_entry("@article{no key here}", &HashMap::new()), None);
    }

    #[test]
    fn test_parse_strings() {
        let content = "@string{jama = {JAMA}}\n@STRING{full = jama # { Network}}\n@article{a,\n  journal = full,\n}";
        let strings = parse_strings(content);
        assert_eq!(strings.get("jama").map(String::as_str), Some("JAMA"));
        assert_eq!(strings.get("full").map(String::as_str), Some("JAMA Network"));
        assert_eq!(strings.len(), 2);
    }
}
