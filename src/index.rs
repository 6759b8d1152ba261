//! Regenerates the JSON files the website templates read.
//!
//! For a bibliography `content/<name>.bib` three files are written next to it:
//!
//! - `bibitems_<name>.json`: every entry by key, with its fields, parsed
//!   authors and a preformatted Vancouver citation.
//! - `authorkeys_<name>.json`: per member slug, entry keys grouped by year.
//! - `groupkeys_<name>.json`: the same per research group.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::author::{parse_names, Name};
use crate::bibtex::{month_number, parse_entry, parse_strings, read_bib, split_entries, ParsedEntry};
use crate::members::{load_members, Member};
use crate::vancouver::format_vancouver;
use crate::{Error, Result};

/// Publication types in the order the website lists them.
pub const TYPE_ORDER: [&str; 9] = [
    "article",
    "preprint",
    "inproceedings",
    "conference",
    "phdthesis",
    "mastersthesis",
    "book",
    "incollection",
    "other",
];

/// The group that only the lab bibliography feeds.
const LAB_GROUP: &str = "cara-lab";
const LAB_BIBLIOGRAPHY: &str = "cara";
const DEFAULT_GROUP: &str = "anes";

/// Macro file read alongside every bibliography.
pub const STRINGS_FILE: &str = "fullstrings.bib";

/// One bibliography entry as written to `bibitems_<name>.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct BibItem {
    pub key: String,
    pub kind: String,
    pub authors: Vec<Name>,
    /// The year as written, empty when missing.
    pub year: String,
    pub month: u32,
    /// The numeric PMID, 0 when missing.
    pub pmid: u64,
    pub json: Map<String, Value>,
}

impl BibItem {
    pub fn from_entry(entry: &ParsedEntry) -> Self {
        let fields = &entry.fields;
        let authors = fields.get("author").map(parse_names).unwrap_or_default();
        let year = fields.get("year").unwrap_or_default().to_string();
        let month = fields.get("month").and_then(month_number).unwrap_or(0);
        let pmid = fields
            .get("pmid")
            .and_then(|pmid| pmid.trim().parse().ok())
            .unwrap_or(0);

        let mut json = Map::new();
        for (name, value) in fields.iter() {
            let value = match name {
                "author" => Value::Array(authors.iter().map(name_parts).collect()),
                "year" => match value.parse::<i64>() {
                    Ok(year) => json!(year),
                    Err(_) => json!(value),
                },
                _ => json!(value),
            };
            json.insert(name.to_string(), value);
        }
        json.insert("type".to_string(), json!(entry.kind));
        json.insert("pmidnumber".to_string(), json!(pmid));
        json.insert("vancouver_citation".to_string(), json!(format_vancouver(entry)));

        Self {
            key: entry.key.clone(),
            kind: entry.kind.clone(),
            authors,
            year,
            month,
            pmid,
            json,
        }
    }

    /// The numeric year, if the year field is a number.
    pub fn year_number(&self) -> Option<i64> {
        self.year.trim().parse().ok()
    }

    /// Newest first: year, then month, then PMID, all descending.
    fn sort_key(&self) -> (Reverse<i64>, Reverse<u32>, Reverse<u64>) {
        (
            Reverse(self.year_number().unwrap_or(0)),
            Reverse(self.month),
            Reverse(self.pmid),
        )
    }
}

fn name_parts(name: &Name) -> Value {
    json!([name.first, name.von, name.last, name.jr])
}

/// Parses every publication in `content`, expanding `@string` macros from
/// `strings` and from `content` itself. A later entry with an existing key
/// replaces the earlier one.
pub fn parse_items(content: &str, strings: &str) -> Vec<BibItem> {
    let mut macros = parse_strings(strings);
    macros.extend(parse_strings(content));

    let mut items: Vec<BibItem> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for raw in split_entries(content) {
        if !raw.is_publication() {
            continue;
        }
        let Some(entry) = parse_entry(raw.text, &macros) else {
            debug!("Skipping unparsable entry at byte {}", raw.start);
            continue;
        };
        let item = BibItem::from_entry(&entry);
        match positions.get(&item.key) {
            Some(&idx) => items[idx] = item,
            None => {
                positions.insert(item.key.clone(), items.len());
                items.push(item);
            }
        }
    }
    items
}

/// Keys of the entries each member authored, by slug.
///
/// Members without publications are left out. An entry belongs to a member
/// when any of its authors passes the name heuristic against the member's
/// publication name.
pub fn author_keys<'a>(items: &'a [BibItem], members: &[Member]) -> Vec<(String, Vec<&'a str>)> {
    members
        .iter()
        .filter_map(|member| {
            let person = member.person()?;
            let keys: Vec<&str> = items
                .iter()
                .filter(|item| item.authors.iter().any(|name| person.matches_name(name)))
                .map(|item| item.key.as_str())
                .collect();
            (!keys.is_empty()).then(|| (member.slug.clone(), keys))
        })
        .collect()
}

/// Groups `keys` by year, newest first, with the `__years__` and
/// `__types__` summaries the templates iterate over.
pub fn by_year(keys: &HashSet<&str>, items: &[BibItem]) -> Map<String, Value> {
    let mut selected: Vec<&BibItem> = items
        .iter()
        .filter(|item| keys.contains(item.key.as_str()))
        .collect();
    selected.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()).then_with(|| a.key.cmp(&b.key)));

    let mut index = Map::new();
    let mut years = BTreeSet::new();
    let mut types = HashSet::new();
    for item in selected {
        if let Value::Array(keys) = index
            .entry(item.year.clone())
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            keys.push(json!(item.key));
        }
        if let Some(year) = item.year_number() {
            years.insert(year);
        }
        types.insert(item.kind.as_str());
    }

    index.insert(
        "__years__".to_string(),
        json!(years.into_iter().rev().collect::<Vec<_>>()),
    );
    index.insert(
        "__types__".to_string(),
        json!(
            TYPE_ORDER
                .iter()
                .filter(|kind| types.contains(*kind))
                .collect::<Vec<_>>()
        ),
    );
    index
}

/// Per-member index, keyed by slug.
pub fn author_index(authored: &[(String, Vec<&str>)], items: &[BibItem]) -> Map<String, Value> {
    authored
        .iter()
        .map(|(slug, keys)| {
            let keys: HashSet<&str> = keys.iter().copied().collect();
            (slug.clone(), Value::Object(by_year(&keys, items)))
        })
        .collect()
}

/// Per-group index.
///
/// A group collects the publications of its members. With
/// `include_all_publications` every publication is also added to the groups
/// the bibliography feeds: the lab group for the lab bibliography, every
/// other group otherwise. The lab group is only filled from the lab
/// bibliography and stays empty for the others.
pub fn group_index(
    authored: &[(String, Vec<&str>)],
    items: &[BibItem],
    members: &[Member],
    bibliography: &str,
    include_all_publications: bool,
) -> Map<String, Value> {
    let by_slug: HashMap<&str, &Member> = members.iter().map(|m| (m.slug.as_str(), m)).collect();
    let mut groups: Vec<String> = Vec::new();
    let mut group_keys: HashMap<String, HashSet<&str>> = HashMap::new();

    for (slug, keys) in authored {
        let Some(member) = by_slug.get(slug.as_str()) else {
            continue;
        };
        for group in &member.groups {
            if !groups.contains(group) {
                groups.push(group.clone());
            }
            group_keys
                .entry(group.clone())
                .or_default()
                .extend(keys.iter().copied());
        }
    }

    let is_lab = bibliography == LAB_BIBLIOGRAPHY;
    if include_all_publications {
        let mut targets: Vec<String> = groups
            .iter()
            .filter(|group| (group.as_str() == LAB_GROUP) == is_lab)
            .cloned()
            .collect();
        if targets.is_empty() {
            let group = if is_lab { LAB_GROUP } else { DEFAULT_GROUP };
            targets.push(group.to_string());
        }
        for group in targets {
            if !groups.contains(&group) {
                groups.push(group.clone());
            }
            group_keys
                .entry(group)
                .or_default()
                .extend(items.iter().map(|item| item.key.as_str()));
        }
    }

    let empty = HashSet::new();
    groups
        .into_iter()
        .map(|group| {
            let index = if group != LAB_GROUP || is_lab {
                by_year(group_keys.get(&group).unwrap_or(&empty), items)
            } else {
                Map::new()
            };
            (group, Value::Object(index))
        })
        .collect()
}

/// Where [`write_index`] put its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    pub items: usize,
    pub authors: usize,
    pub groups: usize,
    pub files: Vec<PathBuf>,
}

/// Reads `<content_dir>/<name>.bib` and writes the three JSON files.
pub fn write_index(
    content_dir: &Path,
    members_dir: &Path,
    name: &str,
    include_all_publications: bool,
) -> Result<IndexSummary> {
    info!("Parsing bib file");
    let content = read_bib(&content_dir.join(format!("{name}.bib")))?;
    let strings_path = content_dir.join(STRINGS_FILE);
    let strings = if strings_path.exists() {
        read_bib(&strings_path)?
    } else {
        String::new()
    };
    let items = parse_items(&content, &strings);
    info!("Parsed {} entries", items.len());

    info!("Retrieving list of members");
    let members = load_members(members_dir, false)?;
    info!("Mapping bib keys to {} members", members.len());
    let authored = author_keys(&items, &members);

    let bibitems: Map<String, Value> = items
        .iter()
        .map(|item| (item.key.clone(), Value::Object(item.json.clone())))
        .collect();
    let authors = author_index(&authored, &items);
    let groups = group_index(&authored, &items, &members, name, include_all_publications);

    let outputs = [
        (format!("bibitems_{name}.json"), &bibitems),
        (format!("authorkeys_{name}.json"), &authors),
        (format!("groupkeys_{name}.json"), &groups),
    ];
    let mut files = Vec::with_capacity(outputs.len());
    for (file_name, map) in outputs {
        let path = content_dir.join(file_name);
        info!("Saving {}", path.display());
        let json = serde_json::to_string(map)?;
        std::fs::write(&path, json).map_err(|e| Error::io(&path, e))?;
        files.push(path);
    }

    Ok(IndexSummary {
        items: items.len(),
        authors: authors.len(),
        groups: groups.len(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BIB: &str = r#"@string{bja = {Br J Anaesth}}

@article{Tolboom24,
  author = {Tolboom, Robert C. and Smit, Jan},
  title = {Propofol},
  journal = bja,
  year = {2024},
  month = {mar},
  pmid = {300},
}

@article{Tolboom24a,
  author = {Tolboom, R. C.},
  title = {Airway},
  journal = {Anesthesiology},
  year = {2024},
  month = {11},
  pmid = {200},
}

@book{Smit20,
  author = {Smit, Jan},
  title = {Handbook},
  publisher = {Springer},
  year = {2020},
}

@misc{Other19,
  author = {Doe, John},
  title = {Notes},
  year = {2019},
}
"#;

    fn member(slug: &str, name: &str, groups: &[&str]) -> Member {
        Member {
            slug: slug.to_string(),
            name: name.to_string(),
            pub_name: None,
            orcid: None,
            active: true,
            groups: groups.iter().map(|g| g.to_string()).collect(),
            path: PathBuf::new(),
        }
    }

    fn members() -> Vec<Member> {
        vec![
            member("jan-smit", "Jan Smit", &["anes"]),
            member("rob-tolboom", "Robert C. Tolboom", &["anes", "cara-lab"]),
            member("solo", "Solo", &["anes"]),
        ]
    }

    #[test]
    fn test_item_json() {
        let items = parse_items(BIB, "");
        assert_eq!(items.len(), 4);
        let first = &items[0];
        assert_eq!(first.month, 3);
        assert_eq!(first.pmid, 300);
        assert_eq!(first.json["journal"], json!("Br J Anaesth"));
        assert_eq!(first.json["year"], json!(2024));
        assert_eq!(first.json["type"], json!("article"));
        assert_eq!(
            first.json["author"],
            json!([["Robert C.", "", "Tolboom", ""], ["Jan", "", "Smit", ""]])
        );
        assert_eq!(items[2].json["pmidnumber"], json!(0));
        assert!(first.json["vancouver_citation"]
            .as_str()
            .unwrap()
            .starts_with("Tolboom RC, Smit J. Propofol."));
    }

    #[test]
    fn test_macros_from_strings_file() {
        let bib = "@article{A20,\n  journal = lancet,\n  year = {2020},\n}\n";
        let items = parse_items(bib, "@string{lancet = {Lancet}}\n");
        assert_eq!(items[0].json["journal"], json!("Lancet"));
    }

    #[test]
    fn test_author_index_sorted_newest_first() {
        let items = parse_items(BIB, "");
        let members = members();
        let authored = author_keys(&items, &members);
        assert_eq!(
            authored,
            vec![
                ("jan-smit".to_string(), vec!["Tolboom24", "Smit20"]),
                ("rob-tolboom".to_string(), vec!["Tolboom24", "Tolboom24a"]),
            ]
        );

        let index = author_index(&authored, &items);
        assert_eq!(
            Value::Object(index),
            json!({
                "jan-smit": {
                    "2024": ["Tolboom24"],
                    "2020": ["Smit20"],
                    "__years__": [2024, 2020],
                    "__types__": ["article", "book"],
                },
                "rob-tolboom": {
                    "2024": ["Tolboom24a", "Tolboom24"],
                    "__years__": [2024],
                    "__types__": ["article"],
                },
            })
        );
    }

    #[test]
    fn test_group_index_adds_all_publications() {
        let items = parse_items(BIB, "");
        let members = members();
        let authored = author_keys(&items, &members);

        let groups = group_index(&authored, &items, &members, "umcg-anes", true);
        assert_eq!(groups.keys().collect::<Vec<_>>(), ["anes", "cara-lab"]);
        assert_eq!(
            groups["anes"]["__years__"],
            json!([2024, 2020, 2019])
        );
        assert_eq!(groups["anes"]["2019"], json!(["Other19"]));
        assert_eq!(groups["cara-lab"], json!({}));

        let groups = group_index(&authored, &items, &members, "cara", true);
        assert_eq!(groups["cara-lab"]["__years__"], json!([2024, 2020, 2019]));
        assert_eq!(groups["anes"]["__years__"], json!([2024, 2020]));
    }

    #[test]
    fn test_group_index_default_group() {
        let items = parse_items(BIB, "");
        let groups = group_index(&[], &items, &[], "umcg-anes", true);
        assert_eq!(groups.keys().collect::<Vec<_>>(), ["anes"]);
        assert!(group_index(&[], &items, &[], "umcg-anes", false).is_empty());
    }

    #[test]
    fn test_write_index() {
        let dir = tempfile::tempdir().unwrap();
        let content = dir.path().join("content");
        let members_dir = content.join("pages").join("members");
        std::fs::create_dir_all(&members_dir).unwrap();
        std::fs::write(content.join("umcg-anes.bib"), BIB).unwrap();
        std::fs::write(
            members_dir.join("jan-smit.md"),
            "name: Jan Smit\ngroups: anes\n",
        )
        .unwrap();

        let summary = write_index(&content, &members_dir, "umcg-anes", true).unwrap();
        assert_eq!(summary.items, 4);
        assert_eq!(summary.authors, 1);
        assert_eq!(summary.groups, 1);

        let bibitems: Value = serde_json::from_str(
            &std::fs::read_to_string(content.join("bibitems_umcg-anes.json")).unwrap(),
        )
        .unwrap();
        let keys: Vec<&String> = bibitems.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["Tolboom24", "Tolboom24a", "Smit20", "Other19"]);
        assert!(content.join("authorkeys_umcg-anes.json").exists());
        assert!(content.join("groupkeys_umcg-anes.json").exists());
    }
}
