use std::collections::HashSet;

use crate::{Error, Result};

/// Renders a new entry in the layout used throughout the bibliography:
///
/// ```plain
/// @article{Smith20,
///   author = {John Smith},
///   year = {2020},
/// }
/// ```
#[derive(Debug, Clone)]
pub struct EntryBuilder {
    kind: String,
    key: String,
    fields: Vec<(String, String)>,
}

impl EntryBuilder {
    #[must_use]
    pub fn new(kind: &str, key: &str) -> Self {
        Self {
            kind: kind.to_string(),
            key: key.to_string(),
            fields: Vec::new(),
        }
    }

    /// Adds a field unconditionally.
    #[must_use]
    pub fn field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.push((name.to_string(), value.into()));
        self
    }

    /// Adds a field only when `value` is non-empty.
    #[must_use]
    pub fn non_empty(self, name: &str, value: &str) -> Self {
        if value.is_empty() {
            self
        } else {
            self.field(name, value)
        }
    }

    /// Adds a field only when `value` is present and non-empty.
    #[must_use]
    pub fn optional(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.non_empty(name, value),
            None => self,
        }
    }

    pub fn build(&self) -> String {
        let mut lines = Vec::with_capacity(self.fields.len() + 2);
        lines.push(format!("@{}{{{},", self.kind, self.key));
        for (name, value) in &self.fields {
            lines.push(format!("  {name} = {{{value}}},"));
        }
        lines.push("}".to_string());
        lines.join("\n")
    }
}

/// Escapes literal braces so free text cannot unbalance an entry.
pub fn escape_braces(text: &str) -> String {
    text.replace('{', "\\{").replace('}', "\\}")
}

/// Keeps only ASCII letters, the alphabet citation keys are built from.
pub fn ascii_letters(text: &str) -> String {
    text.chars().filter(char::is_ascii_alphabetic).collect()
}

/// Returns `base` or the first of `base`a, `base`b, ... that is not in `existing`,
/// and records the result in `existing`.
///
/// After `z` the suffixes continue as `aa`, `ab`, ...
pub fn unique_key(base: &str, existing: &mut HashSet<String>) -> String {
    let mut candidate = base.to_string();
    let mut n = 0usize;
    while existing.contains(&candidate) {
        candidate = format!("{base}{}", alpha_suffix(n));
        n += 1;
    }
    existing.insert(candidate.clone());
    candidate
}

/// Like [`unique_key`], but only the single letters `a` to `z` are tried.
pub fn unique_key_within_alphabet(base: &str, existing: &HashSet<String>) -> Result<String> {
    if !existing.contains(base) {
        return Ok(base.to_string());
    }
    ('a'..='z')
        .map(|suffix| format!("{base}{suffix}"))
        .find(|candidate| !existing.contains(candidate))
        .ok_or_else(|| Error::KeysExhausted(base.to_string()))
}

/// Bijective base-26 letters: 0 → a, 25 → z, 26 → aa.
fn alpha_suffix(mut n: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(char::from(b'a' + (n % 26) as u8));
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.iter().rev().collect()
}
