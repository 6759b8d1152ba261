//! Group member profiles.
//!
//! A profile is a Markdown file named `<slug>.md` whose header carries
//! `key: value` lines. Only the handful of keys the maintenance tasks need are
//! read, each with a line-anchored lookup.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use itertools::Itertools;
use strsim::jaro_winkler;
use tracing::{debug, warn};

use crate::author::PersonName;
use crate::regex::{literal, Regex};
use crate::{Error, Result};

static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| literal(r"(?m)^name:[ \t]*(.+)$"));
static PUB_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| literal(r"(?m)^pub_name:[ \t]*(.+)$"));
static ORCID_REGEX: LazyLock<Regex> = LazyLock::new(|| literal(r"(?m)^orcid:[ \t]*(.+)$"));
static ACTIVE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| literal(r"(?mi)^active:[ \t]*(yes|true)[ \t\r]*$"));
static GROUPS_REGEX: LazyLock<Regex> = LazyLock::new(|| literal(r"(?m)^groups:[ \t]*(.+)$"));

/// How many slugs a "member not found" error suggests.
const SUGGESTIONS: usize = 10;

/// A group member as described by their profile file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub slug: String,
    pub name: String,
    pub pub_name: Option<String>,
    pub orcid: Option<String>,
    pub active: bool,
    pub groups: Vec<String>,
    pub path: PathBuf,
}

impl Member {
    /// Reads a member from profile text. Profiles without `name:` are not members.
    pub fn parse(slug: &str, path: &Path, content: &str) -> Option<Self> {
        let name = capture(&NAME_REGEX, content)?;
        Some(Self {
            slug: slug.to_string(),
            name,
            pub_name: capture(&PUB_NAME_REGEX, content),
            orcid: capture(&ORCID_REGEX, content),
            active: ACTIVE_REGEX.is_match(content),
            groups: capture(&GROUPS_REGEX, content)
                .map(|groups| parse_groups(&groups))
                .unwrap_or_default(),
            path: path.to_path_buf(),
        })
    }

    /// The name the member publishes under: `pub_name` when set, else `name`.
    pub fn publication_name(&self) -> &str {
        self.pub_name.as_deref().unwrap_or(&self.name)
    }

    /// The publication name split for author matching.
    pub fn person(&self) -> Option<PersonName> {
        PersonName::from_display(self.publication_name())
    }
}

fn capture(regex: &Regex, content: &str) -> Option<String> {
    regex
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Accepts `a, b`, `[a, b]` and quoted items.
fn parse_groups(raw: &str) -> Vec<String> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|group| group.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|group| !group.is_empty())
        .collect()
}

/// Slugs of every profile in `dir`, sorted.
pub fn member_slugs(dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    let slugs = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|file| file.ends_with(".md") && !file.starts_with('.'))
        .map(|file| file.trim_end_matches(".md").to_string())
        .sorted()
        .collect();
    Ok(slugs)
}

/// Every member profile in `dir`, sorted by slug.
///
/// Unreadable profiles are logged and skipped.
pub fn load_members(dir: &Path, active_only: bool) -> Result<Vec<Member>> {
    let mut members = Vec::new();
    for slug in member_slugs(dir)? {
        let path = dir.join(format!("{slug}.md"));
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Skipping unreadable profile {}: {e}", path.display());
                continue;
            }
        };
        match Member::parse(&slug, &path, &content) {
            Some(member) if member.active || !active_only => members.push(member),
            Some(_) => debug!("Skipping inactive member {slug}"),
            None => debug!("Profile {} has no name, skipping", path.display()),
        }
    }
    Ok(members)
}

/// Loads the member with `slug`.
///
/// When the profile does not exist the error lists the closest slugs found in
/// `dir`.
pub fn find_member(dir: &Path, slug: &str) -> Result<Member> {
    let path = dir.join(format!("{slug}.md"));
    if !path.is_file() {
        let available = member_slugs(dir).unwrap_or_default();
        let remaining = available.len().saturating_sub(SUGGESTIONS);
        let suggestions = available
            .into_iter()
            .sorted_by(|a, b| jaro_winkler(b, slug).total_cmp(&jaro_winkler(a, slug)))
            .take(SUGGESTIONS)
            .collect();
        return Err(Error::MemberNotFound {
            slug: slug.to_string(),
            expected: path,
            available: suggestions,
            remaining,
        });
    }

    let content = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
    Member::parse(slug, &path, &content).ok_or_else(|| {
        Error::invalid("member", format!("no 'name' field found in {}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PROFILE: &str = "---\nname: Rob Tolboom\npub_name: Robert C. Tolboom\norcid: https://orcid.org/0000-0002-1825-0097\nactive: Yes\ngroups: [anes, \"cara-lab\"]\n---\n\nBio text.\n";

    fn write_profiles(dir: &Path) {
        std::fs::write(dir.join("rob-tolboom.md"), PROFILE).unwrap();
        std::fs::write(dir.join("jane-doe.md"), "name: Jane Doe\nactive: no\n").unwrap();
        std::fs::write(dir.join("nameless.md"), "title: Not a member\n").unwrap();
        std::fs::write(dir.join(".hidden.md"), "name: Hidden\n").unwrap();
        std::fs::write(dir.join("notes.txt"), "name: Text\n").unwrap();
    }

    #[test]
    fn test_parse_member() {
        let member = Member::parse("rob-tolboom", Path::new("rob-tolboom.md"), PROFILE).unwrap();
        assert_eq!(member.name, "Rob Tolboom");
        assert_eq!(member.publication_name(), "Robert C. Tolboom");
        assert_eq!(
            member.orcid.as_deref(),
            Some("https://orcid.org/0000-0002-1825-0097")
        );
        assert!(member.active);
        assert_eq!(member.groups, vec!["anes", "cara-lab"]);

        let person = member.person().unwrap();
        assert_eq!(person.family, "Tolboom");
        assert_eq!(person.initials, "RC");
    }

    #[test]
    fn test_active_requires_yes_or_true() {
        let member = Member::parse("x", Path::new("x.md"), "name: X Y\nactive: TRUE\r\n").unwrap();
        assert!(member.active);
        let member = Member::parse("x", Path::new("x.md"), "name: X Y\nactive: no\n").unwrap();
        assert!(!member.active);
        let member = Member::parse("x", Path::new("x.md"), "name: X Y\n").unwrap();
        assert!(!member.active);
    }

    #[test]
    fn test_member_slugs_and_load() {
        let dir = tempfile::tempdir().unwrap();
        write_profiles(dir.path());

        assert_eq!(
            member_slugs(dir.path()).unwrap(),
            vec!["jane-doe", "nameless", "rob-tolboom"]
        );

        let all = load_members(dir.path(), false).unwrap();
        assert_eq!(
            all.iter().map(|m| m.slug.as_str()).collect::<Vec<_>>(),
            vec!["jane-doe", "rob-tolboom"]
        );

        let active = load_members(dir.path(), true).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].slug, "rob-tolboom");
    }

    #[test]
    fn test_find_member() {
        let dir = tempfile::tempdir().unwrap();
        write_profiles(dir.path());

        let member = find_member(dir.path(), "rob-tolboom").unwrap();
        assert_eq!(member.name, "Rob Tolboom");

        match find_member(dir.path(), "rob-tolbom") {
            Err(Error::MemberNotFound {
                available,
                remaining,
                ..
            }) => {
                assert_eq!(available[0], "rob-tolboom");
                assert_eq!(available.len(), 3);
                assert_eq!(remaining, 0);
            }
            other => panic!("expected MemberNotFound, got {other:?}"),
        }

        assert!(matches!(
            find_member(dir.path(), "nameless"),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_missing_members_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_members(&dir.path().join("absent"), false),
            Err(Error::Io { .. })
        ));
    }
}
