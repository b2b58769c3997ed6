//! Checked-out branch lookup for the `branch` command.

use crate::registry::BranchInfo;
use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use git2::Repository;
use std::path::Path;

/// Branch name and last-commit time of the repository containing `dir`.
pub fn read_branch(dir: &Path) -> Result<BranchInfo> {
    let repo = Repository::discover(dir).context("Failed to open git repository")?;
    let head = repo.head().context("Repository has no HEAD")?;

    let branch = if head.is_branch() {
        head.shorthand().unwrap_or("HEAD").to_string()
    } else {
        // Detached: show the short commit id instead of "HEAD".
        match head.target() {
            Some(oid) => format!("detached at {}", &oid.to_string()[..7]),
            None => "HEAD".to_string(),
        }
    };

    let last_commit = head
        .peel_to_commit()
        .ok()
        .and_then(|c| Local.timestamp_opt(c.time().seconds(), 0).single());

    Ok(BranchInfo {
        branch,
        last_commit,
    })
}

/// `N days ago` style age, or `unknown`.
pub fn format_age(info: Option<&BranchInfo>, now: chrono::DateTime<Local>) -> String {
    let Some(when) = info.and_then(|i| i.last_commit) else {
        return "unknown".to_string();
    };
    let days = (now - when).num_days();
    match days {
        d if d <= 0 => "today".to_string(),
        1 => "1 day ago".to_string(),
        d => format!("{} days ago", d),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use git2::Signature;
    use tempfile::tempdir;

    fn commit_all(repo: &Repository) {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("dev", "dev@localhost").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
    }

    #[test]
    fn test_reads_branch_of_repository() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join("README"), "hi").unwrap();
        commit_all(&repo);
        let expected = repo.head().unwrap().shorthand().unwrap().to_string();

        let info = read_branch(dir.path()).unwrap();
        assert_eq!(info.branch, expected);
        assert!(info.last_commit.is_some());
    }

    #[test]
    fn test_subdirectory_discovers_repository() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::create_dir(dir.path().join("app")).unwrap();
        std::fs::write(dir.path().join("app/main.py"), "print()").unwrap();
        commit_all(&repo);

        assert!(read_branch(&dir.path().join("app")).is_ok());
    }

    #[test]
    fn test_not_a_repository() {
        let dir = tempdir().unwrap();
        assert!(read_branch(dir.path()).is_err());
    }

    #[test]
    fn test_format_age() {
        let now = Local::now();
        let info = |days| BranchInfo {
            branch: "main".into(),
            last_commit: Some(now - Duration::days(days)),
        };
        assert_eq!(format_age(Some(&info(0)), now), "today");
        assert_eq!(format_age(Some(&info(1)), now), "1 day ago");
        assert_eq!(format_age(Some(&info(12)), now), "12 days ago");
        assert_eq!(format_age(None, now), "unknown");
    }
}
