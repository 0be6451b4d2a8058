//! Integration tests for mergescore-git
//!
//! These tests build small repositories with real merge topology and verify
//! merge discovery, subsumed-commit computation and diff rendering.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{TimeZone, Utc};
use git2::{Oid, Repository, Signature, Time};
use mergescore_git::{CommitRange, GitError, GitRepo, MergeQuery};
use similar_asserts::assert_eq;

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// A repository in a temp directory, removed on drop
struct Scratch {
    dir: PathBuf,
    repo: Repository,
}

impl Scratch {
    fn new(name: &str) -> Self {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "mergescore-git-{}-{}-{}",
            name,
            std::process::id(),
            n
        ));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let repo = Repository::init(&dir).expect("init repo");
        Self { dir, repo }
    }

    fn path(&self) -> &Path {
        &self.dir
    }

    /// Commit `files` on top of the first parent's tree
    fn commit(
        &self,
        parents: &[Oid],
        author: &str,
        when: i64,
        files: &[(&str, &str)],
        message: &str,
    ) -> Oid {
        let parent_commits: Vec<git2::Commit<'_>> = parents
            .iter()
            .map(|oid| self.repo.find_commit(*oid).expect("parent"))
            .collect();
        let base_tree = parent_commits.first().map(|c| c.tree().expect("tree"));

        let mut builder = self
            .repo
            .treebuilder(base_tree.as_ref())
            .expect("treebuilder");
        for (name, content) in files {
            let blob = self.repo.blob(content.as_bytes()).expect("blob");
            builder.insert(name, blob, 0o100644).expect("insert");
        }
        let tree = self
            .repo
            .find_tree(builder.write().expect("write tree"))
            .expect("find tree");

        let sig = Signature::new(author, &format!("{author}@example.com"), &Time::new(when, 0))
            .expect("signature");
        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();
        self.repo
            .commit(None, &sig, &sig, message, &tree, &parent_refs)
            .expect("commit")
    }

    fn set_head(&self, oid: Oid) {
        self.repo
            .reference("refs/heads/main", oid, true, "test")
            .expect("reference");
        self.repo.set_head("refs/heads/main").expect("set head");
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

const T0: i64 = 1_767_225_600; // 2026-01-01T00:00:00Z
const HOUR: i64 = 3600;

/// base <- main1 ----------- merge
///     \- feat1 <- feat2 --/
struct Topology {
    scratch: Scratch,
    feat1: Oid,
    feat2: Oid,
    main1: Oid,
    merge: Oid,
}

fn single_merge(name: &str) -> Topology {
    let scratch = Scratch::new(name);
    let base = scratch.commit(&[], "carol", T0, &[("README.md", "hello\n")], "Initial");
    let feat1 = scratch.commit(
        &[base],
        "alice",
        T0 + HOUR,
        &[("login.rs", "fn login() {}\n")],
        "Add login",
    );
    let feat2 = scratch.commit(
        &[feat1],
        "bob",
        T0 + 2 * HOUR,
        &[("logout.rs", "fn logout() {}\n")],
        "Add logout",
    );
    let main1 = scratch.commit(
        &[base],
        "carol",
        T0 + 90 * 60,
        &[("CHANGELOG.md", "v1\n")],
        "Changelog",
    );
    let merge = scratch.commit(
        &[main1, feat2],
        "carol",
        T0 + 3 * HOUR,
        &[
            ("login.rs", "fn login() {}\n"),
            ("logout.rs", "fn logout() {}\n"),
        ],
        "Merge branch 'auth'\n\nAdds login and logout.",
    );
    scratch.set_head(merge);

    Topology {
        scratch,
        feat1,
        feat2,
        main1,
        merge,
    }
}

#[test]
fn test_open_non_repository_is_fatal() {
    let dir = std::env::temp_dir().join(format!("mergescore-not-a-repo-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create dir");
    let result = GitRepo::open(&dir);
    let _ = std::fs::remove_dir_all(&dir);
    assert!(matches!(result, Err(GitError::NotARepository { .. })));
}

#[test]
fn test_empty_repository_has_no_merges() {
    let scratch = Scratch::new("empty");
    let repo = GitRepo::open(scratch.path()).expect("open");
    let merges = repo
        .list_merges(&MergeQuery::default())
        .expect("list merges");
    assert!(merges.is_empty());
}

#[test]
fn test_list_merges_finds_the_merge() {
    let topo = single_merge("list");
    let repo = GitRepo::open(topo.scratch.path()).expect("open");

    let merges = repo
        .list_merges(&MergeQuery::default())
        .expect("list merges");

    assert_eq!(merges.len(), 1);
    let merge = &merges[0];
    assert_eq!(merge.sha(), topo.merge.to_string());
    assert_eq!(merge.subject(), "Merge branch 'auth'");
    assert_eq!(merge.merge.author, "carol");
    assert_eq!(
        merge.merge.parents,
        vec![topo.main1.to_string(), topo.feat2.to_string()]
    );
    assert_eq!(
        merge.timestamp(),
        Utc.timestamp_opt(T0 + 3 * HOUR, 0).unwrap()
    );
}

#[test]
fn test_subsumed_commits_are_second_parent_only_oldest_first() {
    let topo = single_merge("subsumed");
    let repo = GitRepo::open(topo.scratch.path()).expect("open");
    let merge = repo.get_merge(&topo.merge.to_string()).expect("get merge");

    let shas: Vec<&str> = merge.subsumed.iter().map(|c| c.sha.as_str()).collect();
    assert_eq!(
        shas,
        vec![topo.feat1.to_string().as_str(), topo.feat2.to_string().as_str()]
    );

    let authors: Vec<&str> = merge.subsumed.iter().map(|c| c.author.as_str()).collect();
    assert_eq!(authors, vec!["alice", "bob"]);
    assert!(
        merge
            .subsumed
            .iter()
            .all(|c| c.sha.len() == 40 && c.sha.chars().all(|ch| ch.is_ascii_hexdigit()))
    );
}

#[test]
fn test_merge_diff_is_first_parent_diff() {
    let topo = single_merge("diff");
    let repo = GitRepo::open(topo.scratch.path()).expect("open");
    let merge = repo.get_merge("HEAD").expect("get merge");

    assert_eq!(merge.diff.files_changed, 2);
    assert_eq!(merge.diff.insertions, 2);
    assert_eq!(merge.diff.deletions, 0);
    let mut paths: Vec<&str> = merge.diff.files.iter().map(|f| f.path.as_str()).collect();
    paths.sort_unstable();
    assert_eq!(paths, vec!["login.rs", "logout.rs"]);
    assert!(merge.diff.files.iter().all(|f| f.status == "added"));

    assert!(merge.diff_text.contains("login.rs"));
    assert!(merge.diff_text.contains("+fn logout() {}"));
    // Changelog landed on the first-parent side and is not part of the merge
    assert!(!merge.diff_text.contains("CHANGELOG.md"));
}

#[test]
fn test_since_excludes_older_merges() {
    let topo = single_merge("since");
    let repo = GitRepo::open(topo.scratch.path()).expect("open");

    let after = Utc.timestamp_opt(T0 + 4 * HOUR, 0).unwrap();
    let merges = repo
        .list_merges(&MergeQuery::since(after))
        .expect("list merges");
    assert!(merges.is_empty());

    let before = Utc.timestamp_opt(T0 + 3 * HOUR, 0).unwrap();
    let merges = repo
        .list_merges(&MergeQuery::since(before))
        .expect("list merges");
    assert_eq!(merges.len(), 1, "lower bound is inclusive");
}

#[test]
fn test_merges_are_listed_oldest_first() {
    let topo = single_merge("order");
    let s = &topo.scratch;
    let topic = s.commit(
        &[topo.merge],
        "dave",
        T0 + 4 * HOUR,
        &[("search.rs", "fn search() {}\n")],
        "Add search",
    );
    let mainline = s.commit(
        &[topo.merge],
        "carol",
        T0 + 4 * HOUR,
        &[("VERSION", "2\n")],
        "Bump",
    );
    let second = s.commit(
        &[mainline, topic],
        "carol",
        T0 + 5 * HOUR,
        &[("search.rs", "fn search() {}\n")],
        "Merge branch 'search'",
    );
    s.set_head(second);

    let repo = GitRepo::open(s.path()).expect("open");
    let merges = repo
        .list_merges(&MergeQuery::default())
        .expect("list merges");

    let shas: Vec<String> = merges.iter().map(|m| m.sha().to_string()).collect();
    assert_eq!(shas, vec![topo.merge.to_string(), second.to_string()]);
    assert_eq!(merges[1].subsumed.len(), 1);
    assert_eq!(merges[1].subsumed[0].author, "dave");
}

#[test]
fn test_get_merge_rejects_plain_commit() {
    let topo = single_merge("not-merge");
    let repo = GitRepo::open(topo.scratch.path()).expect("open");
    let result = repo.get_merge(&topo.feat1.to_string());
    assert!(matches!(
        result,
        Err(GitError::NotAMerge { parents: 1, .. })
    ));
}

#[test]
fn test_get_merge_invalid_reference() {
    let topo = single_merge("bad-ref");
    let repo = GitRepo::open(topo.scratch.path()).expect("open");
    let result = repo.get_merge("no-such-branch");
    assert!(matches!(result, Err(GitError::InvalidReference { .. })));
}

#[test]
fn test_diff_text_for_explicit_range() {
    let topo = single_merge("range");
    let repo = GitRepo::open(topo.scratch.path()).expect("open");
    let range = CommitRange::new(topo.feat1.to_string(), topo.feat2.to_string());

    let text = repo.diff_text(&range).expect("diff text");
    assert!(text.contains("logout.rs"));
    assert!(!text.contains("login.rs |"));
}

#[test]
fn test_display_diff_truncates() {
    let topo = single_merge("display");
    let repo = GitRepo::open(topo.scratch.path()).expect("open");

    let full = repo.display_diff("HEAD", 10_000).expect("full diff");
    assert!(!full.contains("truncated"));

    let cut = repo.display_diff("HEAD", 3).expect("cut diff");
    assert_eq!(cut.lines().filter(|l| !l.is_empty()).count(), 4);
    assert!(cut.ends_with("... (diff truncated after 3 lines) ..."));
}
