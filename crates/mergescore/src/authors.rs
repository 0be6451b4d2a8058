//! Author set used to select which subsumed commits are scored

use std::collections::BTreeSet;
use std::path::Path;

use mergescore_git::Commit;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Which commit authors count towards a merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorFilter {
    /// Every author
    #[default]
    Any,
    /// Only these names (or emails, for entries containing `@`)
    Only(BTreeSet<String>),
}

impl AuthorFilter {
    /// Build a filter from an inline comma list and/or an author file
    ///
    /// Both sources are combined. With neither, every author matches.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::AuthorsFile` if the file cannot be read and
    /// `ConfigError::EmptyAuthorSet` if the sources name nobody.
    pub fn from_sources(inline: Option<&str>, file: Option<&Path>) -> Result<Self, ConfigError> {
        if inline.is_none() && file.is_none() {
            return Ok(Self::Any);
        }

        let mut names = BTreeSet::new();
        if let Some(list) = inline {
            names.extend(parse_inline(list));
        }
        if let Some(path) = file {
            let text =
                std::fs::read_to_string(path).map_err(|source| ConfigError::AuthorsFile {
                    path: path.to_path_buf(),
                    source,
                })?;
            names.extend(parse_file(&text));
        }

        if names.is_empty() {
            return Err(ConfigError::EmptyAuthorSet);
        }
        Ok(Self::Only(names))
    }

    /// Filter accepting exactly `names`
    #[must_use]
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(names.into_iter().map(Into::into).collect())
    }

    /// Whether `commit`'s author is in the set
    #[must_use]
    pub fn matches(&self, commit: &Commit) -> bool {
        match self {
            Self::Any => true,
            Self::Only(names) => {
                names.contains(&commit.author)
                    || (!commit.author_email.is_empty() && names.contains(&commit.author_email))
            }
        }
    }

    /// Number of configured names, `None` for [`AuthorFilter::Any`]
    #[must_use]
    pub fn configured(&self) -> Option<usize> {
        match self {
            Self::Any => None,
            Self::Only(names) => Some(names.len()),
        }
    }
}

fn parse_inline(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn parse_file(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use similar_asserts::assert_eq;

    fn commit(author: &str, email: &str) -> Commit {
        Commit {
            sha: "a".repeat(40),
            message: "work".to_string(),
            author: author.to_string(),
            author_email: email.to_string(),
            timestamp: Utc::now(),
            parents: vec![],
        }
    }

    #[test]
    fn test_no_sources_is_any() {
        let filter = AuthorFilter::from_sources(None, None).expect("filter");
        assert_eq!(filter, AuthorFilter::Any);
        assert!(filter.matches(&commit("anyone", "")));
        assert_eq!(filter.configured(), None);
    }

    #[test]
    fn test_inline_list_trims_and_skips_blanks() {
        let filter = AuthorFilter::from_sources(Some(" alice , bob,,"), None).expect("filter");
        assert_eq!(filter, AuthorFilter::only(["alice", "bob"]));
    }

    #[test]
    fn test_inline_only_commas_is_empty_set() {
        let result = AuthorFilter::from_sources(Some(" , "), None);
        assert!(matches!(result, Err(ConfigError::EmptyAuthorSet)));
    }

    #[test]
    fn test_file_skips_comments_and_blank_lines() {
        let text = "# team\nalice\n\n   # former\n  bob  \n";
        let names: Vec<String> = parse_file(text).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[test]
    fn test_missing_file_is_error() {
        let result =
            AuthorFilter::from_sources(None, Some(Path::new("/nonexistent/authors-12345.txt")));
        assert!(matches!(result, Err(ConfigError::AuthorsFile { .. })));
    }

    #[test]
    fn test_file_and_inline_are_combined() {
        let path = std::env::temp_dir().join(format!("mergescore-authors-{}.txt", std::process::id()));
        std::fs::write(&path, "# comment\ncarol\n").expect("write");

        let filter = AuthorFilter::from_sources(Some("alice"), Some(&path)).expect("filter");
        assert_eq!(filter, AuthorFilter::only(["alice", "carol"]));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_matches_by_name_or_email() {
        let filter = AuthorFilter::only(["alice", "bob@example.com"]);
        assert!(filter.matches(&commit("alice", "a@example.com")));
        assert!(filter.matches(&commit("Robert", "bob@example.com")));
        assert!(!filter.matches(&commit("Alice", "other@example.com")));
        assert!(!filter.matches(&commit("mallory", "")));
    }
}
