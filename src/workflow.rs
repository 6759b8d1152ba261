//! Keeps the member dropdown of the exclusion CI workflow in sync with the
//! member profiles.

use std::path::Path;
use std::sync::LazyLock;

use tracing::info;

use crate::members::member_slugs;
use crate::regex::{literal, Captures, Regex};
use crate::{Error, Result};

static MEMBER_OPTIONS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    literal(
        r"(?m)(member:\s+description:.*?\n\s+required:.*?\n\s+type:\s+choice\s+options:\n)((?:\s+- [^\n]+\n)+)",
    )
});

/// Replaces the options of the workflow's `member` choice input with `members`.
///
/// Returns `None` when the content would not change.
pub fn update_member_options(content: &str, members: &[String]) -> Option<String> {
    let options: String = members
        .iter()
        .map(|member| format!("          - {member}\n"))
        .collect();
    let updated = MEMBER_OPTIONS_REGEX.replace_all(content, |caps: &Captures| {
        format!("{}{options}", &caps[1])
    });
    (updated != content).then(|| updated.into_owned())
}

/// Rewrites the workflow file at `workflow_file` with every slug in
/// `members_dir`. Returns how many members were written, or `None` when the
/// file was already up to date.
pub fn sync_workflow_members(members_dir: &Path, workflow_file: &Path) -> Result<Option<usize>> {
    let members = member_slugs(members_dir)?;
    if members.is_empty() {
        return Err(Error::NoMembers {
            dir: members_dir.to_path_buf(),
        });
    }
    info!("Found {} members", members.len());

    let content = std::fs::read_to_string(workflow_file).map_err(|e| Error::io(workflow_file, e))?;
    match update_member_options(&content, &members) {
        Some(updated) => {
            std::fs::write(workflow_file, updated).map_err(|e| Error::io(workflow_file, e))?;
            info!("Updated {} with {} members", workflow_file.display(), members.len());
            Ok(Some(members.len()))
        }
        None => {
            info!("No changes needed, member list is up to date");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const WORKFLOW: &str = "on:\n  workflow_dispatch:\n    inputs:\n      pmid:\n        description: 'PubMed ID'\n        required: true\n      member:\n        description: 'Member'\n        required: true\n        type: choice\n        options:\n          - old-member\n          - rob-tolboom\n      reason:\n        required: true\n";

    #[test]
    fn test_update_member_options() {
        let members = vec!["jane-doe".to_string(), "rob-tolboom".to_string()];
        let updated = update_member_options(WORKFLOW, &members).unwrap();
        assert_eq!(
            updated,
            WORKFLOW.replace(
                "          - old-member\n          - rob-tolboom\n",
                "          - jane-doe\n          - rob-tolboom\n"
            )
        );
        assert_eq!(update_member_options(&updated, &members), None);
    }

    #[test]
    fn test_content_without_member_input_is_untouched() {
        assert_eq!(
            update_member_options("name: build\n", &["a".to_string()]),
            None
        );
    }

    #[test]
    fn test_sync_workflow_members() {
        let dir = tempfile::tempdir().unwrap();
        let members = dir.path().join("members");
        std::fs::create_dir(&members).unwrap();
        std::fs::write(members.join("rob-tolboom.md"), "name: Rob\n").unwrap();
        std::fs::write(members.join("jane-doe.md"), "name: Jane\n").unwrap();
        let workflow = dir.path().join("exclude-publication.yml");
        std::fs::write(&workflow, WORKFLOW).unwrap();

        assert_eq!(sync_workflow_members(&members, &workflow).unwrap(), Some(2));
        assert!(std::fs::read_to_string(&workflow).unwrap().contains("          - jane-doe\n"));
        assert_eq!(sync_workflow_members(&members, &workflow).unwrap(), None);
    }

    #[test]
    fn test_empty_members_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let workflow = dir.path().join("w.yml");
        std::fs::write(&workflow, WORKFLOW).unwrap();
        assert!(matches!(
            sync_workflow_members(dir.path(), &workflow),
            Err(Error::NoMembers { dir: empty }) if empty == dir.path()
        ));
    }
}
