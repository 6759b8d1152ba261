//! Author names: BibTeX name parsing and the loose matching used to decide
//! whether a fetched record belongs to a group member.

use serde::{Deserialize, Serialize};

/// One BibTeX author split into its four name parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub first: String,
    pub von: String,
    pub last: String,
    pub jr: String,
}

impl Name {
    /// Parses one name in any of the BibTeX forms
    /// `First von Last`, `von Last, First` or `von Last, Jr, First`.
    pub fn parse(raw: &str) -> Self {
        let parts: Vec<String> = split_top_level(raw, |rest| rest.starts_with(','), 1)
            .into_iter()
            .map(|p| p.trim().to_string())
            .collect();

        match parts.as_slice() {
            [single] => Self::parse_first_von_last(single),
            [von_last, first] => {
                let (von, last) = split_von_last(&words(von_last));
                Self {
                    first: strip_braces(first),
                    von,
                    last,
                    jr: String::new(),
                }
            }
            [von_last, jr, first, ..] => {
                let (von, last) = split_von_last(&words(von_last));
                Self {
                    first: strip_braces(first),
                    von,
                    last,
                    jr: strip_braces(jr),
                }
            }
            [] => Self::default(),
        }
    }

    fn parse_first_von_last(raw: &str) -> Self {
        let words = words(raw);
        let Some((last_word, init)) = words.split_last() else {
            return Self::default();
        };
        // the von part starts at the first lowercase word before the last one
        match init.iter().position(|w| is_lowercase_word(w)) {
            Some(von_start) => {
                let (von, last) = split_von_last(&words[von_start..]);
                Self {
                    first: join_stripped(&words[..von_start]),
                    von,
                    last,
                    jr: String::new(),
                }
            }
            None => Self {
                first: join_stripped(init),
                von: String::new(),
                last: strip_braces(last_word),
                jr: String::new(),
            },
        }
    }

    /// The `von` and `last` parts together, e.g. `van Ginneken`.
    pub fn family(&self) -> String {
        [self.von.as_str(), self.last.as_str()]
            .iter()
            .filter(|p| !p.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Initials of the first names, uppercased, without dots or spaces.
    pub fn initials(&self) -> String {
        initials(&self.first)
    }
}

/// Splits a BibTeX `author`/`editor` field on ` and ` outside braces.
pub fn parse_names(field: &str) -> Vec<Name> {
    split_top_level(field, |rest| starts_with_and(rest), 5)
        .into_iter()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .map(|part| Name::parse(&part))
        .collect()
}

/// First letter of every first-name part, dots removed: `Robert C.` → `RC`.
pub fn initials(first: &str) -> String {
    first
        .replace('.', "")
        .split_whitespace()
        .filter_map(|part| part.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

/// A member's name as used when searching and filtering external records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonName {
    pub family: String,
    pub given: String,
    pub initials: String,
}

impl PersonName {
    /// Splits a display name such as `Robert C. Tolboom`.
    ///
    /// The last word is the family name and the first word the given name.
    /// Initials come from every other capitalised word, so particles such as
    /// `van` do not contribute one. Single-word names cannot be matched
    /// reliably and yield `None`.
    pub fn from_display(name: &str) -> Option<Self> {
        let parts: Vec<&str> = name.split_whitespace().collect();
        let (family, rest) = parts.split_last()?;
        let given = rest.first()?;
        let initials = rest
            .iter()
            .filter(|part| !is_lowercase_word(part))
            .filter_map(|part| part.replace('.', "").trim().chars().next())
            .flat_map(char::to_uppercase)
            .collect();
        Some(Self {
            family: family.to_string(),
            given: given.to_string(),
            initials,
        })
    }

    /// Whether a record author with `family` and `given` names is this person.
    ///
    /// The family name must match exactly, ignoring case. Then either this
    /// person's initials appear among the capitals of the given name, or this
    /// person's given name appears inside it.
    pub fn matches(&self, family: &str, given: &str) -> bool {
        if family.to_lowercase() != self.family.to_lowercase() {
            return false;
        }

        if !self.initials.is_empty() {
            let candidate: String = given.chars().filter(char::is_ascii_uppercase).collect();
            let target: String = self
                .initials
                .chars()
                .filter(|c| *c != '.' && !c.is_whitespace())
                .flat_map(char::to_uppercase)
                .collect();
            if candidate.contains(&target) {
                return true;
            }
        }

        !self.given.is_empty() && given.to_lowercase().contains(&self.given.to_lowercase())
    }

    /// Matches against a parsed BibTeX name, with or without its `von` part.
    pub fn matches_name(&self, name: &Name) -> bool {
        self.matches(&name.last, &name.first) || self.matches(&name.family(), &name.first)
    }
}

fn starts_with_and(rest: &str) -> bool {
    rest.len() >= 5
        && rest.is_char_boundary(5)
        && rest[..5].eq_ignore_ascii_case(" and ")
}

/// Splits `text` wherever `at` matches outside braces, skipping `width` bytes
/// of separator.
fn split_top_level(text: &str, at: impl Fn(&str) -> bool, width: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    let mut skip = 0usize;

    for (i, c) in text.char_indices() {
        if skip > 0 {
            skip -= c.len_utf8();
            continue;
        }
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 && at(&text[i..]) => {
                parts.push(std::mem::take(&mut current));
                skip = width.saturating_sub(c.len_utf8());
                continue;
            }
            _ => (),
        }
        current.push(c);
    }
    parts.push(current);
    parts
}

fn words(text: &str) -> Vec<String> {
    split_top_level(text, |rest| rest.starts_with(char::is_whitespace), 1)
        .into_iter()
        .filter(|w| !w.trim().is_empty())
        .map(|w| w.trim().to_string())
        .collect()
}

fn is_lowercase_word(word: &str) -> bool {
    word.chars().next().is_some_and(char::is_lowercase)
}

/// Leading lowercase words form the `von` part. The last word always
/// belongs to the family name.
fn split_von_last(words: &[String]) -> (String, String) {
    let Some((last_word, init)) = words.split_last() else {
        return (String::new(), String::new());
    };
    let von_len = init.iter().take_while(|w| is_lowercase_word(w)).count();
    let von = join_stripped(&words[..von_len]);
    let mut last = join_stripped(&init[von_len..]);
    if !last.is_empty() {
        last.push(' ');
    }
    last.push_str(&strip_braces(last_word));
    (von, last)
}

fn join_stripped(words: &[String]) -> String {
    words
        .iter()
        .map(|w| strip_braces(w))
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_braces(text: &str) -> String {
    text.chars().filter(|c| *c != '{' && *c != '}').collect::<String>().trim().to_string()
}
