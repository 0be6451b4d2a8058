//! Scoring rubric and prompt construction

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// System message sent with every request
pub const SYSTEM_PROMPT: &str = "You are an expert at analyzing software engineering merges \
and scoring them based on the DX AI Measurement Framework.";

/// Fixed rubric describing the five dimensions, their weights and the reply format
pub const RUBRIC: &str = r#"You are analyzing a software engineering merge (equivalent to a Pull Request).

Score the merge on each dimension from 0 to 10:

- ai_utilization (weight 25%): evidence that AI tooling accelerated or improved the work
- code_quality_impact (weight 25%): effect on correctness, readability, tests and maintainability
- delivery_velocity (weight 20%): how efficiently the change moved from first commit to merge
- innovation_level (weight 15%): novelty of the approach, new capabilities or systems
- team_collaboration (weight 15%): review activity, shared ownership, co-authored work

overall_score is the weighted sum of the five dimensions scaled to 0-100:
(ai_utilization*25 + code_quality_impact*25 + delivery_velocity*20 + innovation_level*15 + team_collaboration*15) / 10

Reply with exactly one JSON object and nothing else:
{
  "ai_utilization": <0-10>,
  "code_quality_impact": <0-10>,
  "delivery_velocity": <0-10>,
  "innovation_level": <0-10>,
  "team_collaboration": <0-10>,
  "overall_score": <0-100>,
  "rationale": "<150-250 character explanation of the scores>"
}"#;

/// A subsumed commit as shown to the scorer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitLine {
    /// Commit subject
    pub subject: String,
    /// Commit time
    pub timestamp: DateTime<Utc>,
}

/// Everything about a merge that goes into the prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeContext {
    /// Merge subject line
    pub subject: String,
    /// Full merge message
    pub message: String,
    /// Author credited with the change
    pub primary_author: String,
    /// Author-filtered subsumed commits, oldest first
    pub commits: Vec<CommitLine>,
    /// Lines added
    pub additions: usize,
    /// Lines deleted
    pub deletions: usize,
    /// Files touched
    pub files_changed: usize,
    /// First to last commit, in hours
    pub development_hours: f64,
    /// Last commit to merge, in hours
    pub review_hours: f64,
    /// Merge time
    pub merged_at: DateTime<Utc>,
    /// Diff text, already cut to the budget; `None` leaves it out
    pub diff: Option<String>,
}

/// A rendered request: system message plus user message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// System message
    pub system: String,
    /// User message: rubric followed by the merge context
    pub user: String,
}

impl Prompt {
    /// Render the prompt for `ctx`
    #[must_use]
    pub fn for_merge(ctx: &MergeContext) -> Self {
        let mut user = String::with_capacity(RUBRIC.len() + 1024);
        user.push_str(RUBRIC);
        user.push_str("\n\n");
        render_context(&mut user, ctx);
        user.push_str("\n\nProvide the analysis in the exact JSON format specified above.");

        Self {
            system: SYSTEM_PROMPT.to_string(),
            user,
        }
    }

    /// Text that identifies this request for caching
    #[must_use]
    pub fn cache_payload(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

fn render_context(out: &mut String, ctx: &MergeContext) {
    out.push_str(&format!(
        "Merge Analysis:\n\
         - Subject: {}\n\
         - Author: {}\n\
         - Commits: {}\n\
         - Lines Added: {}\n\
         - Lines Deleted: {}\n\
         - Files Changed: {}\n\
         - Development Time: {:.2} hours\n\
         - Review Time: {:.2} hours\n\
         - Merge Date: {}",
        ctx.subject,
        ctx.primary_author,
        ctx.commits.len(),
        ctx.additions,
        ctx.deletions,
        ctx.files_changed,
        ctx.development_hours,
        ctx.review_hours,
        ctx.merged_at.format("%Y-%m-%d %H:%M:%S")
    ));

    if !ctx.commits.is_empty() {
        out.push_str("\n\nCommits:");
        for commit in &ctx.commits {
            out.push_str(&format!(
                "\n- {} ({})",
                commit.subject,
                commit.timestamp.format("%Y-%m-%d %H:%M")
            ));
        }
    }

    let message = ctx.message.trim();
    if !message.is_empty() && message != ctx.subject {
        out.push_str(&format!("\n\nFull Commit Message:\n{message}"));
    }

    if let Some(diff) = ctx.diff.as_deref().filter(|d| !d.trim().is_empty()) {
        out.push_str(&format!("\n\nCode Changes (Diff):\n```diff\n{diff}\n```"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn context() -> MergeContext {
        MergeContext {
            subject: "Merge pull request #42 from acme/login".to_string(),
            message: "Merge pull request #42 from acme/login\n\nAdd login page".to_string(),
            primary_author: "alice".to_string(),
            commits: vec![
                CommitLine {
                    subject: "Add login form".to_string(),
                    timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
                },
                CommitLine {
                    subject: "Validate password".to_string(),
                    timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 14, 5, 0).unwrap(),
                },
            ],
            additions: 120,
            deletions: 8,
            files_changed: 4,
            development_hours: 4.583,
            review_hours: 20.0,
            merged_at: Utc.with_ymd_and_hms(2026, 3, 2, 10, 5, 0).unwrap(),
            diff: Some("+fn login() {}".to_string()),
        }
    }

    #[test]
    fn test_prompt_starts_with_rubric() {
        let prompt = Prompt::for_merge(&context());
        assert!(prompt.user.starts_with(RUBRIC));
        assert_eq!(prompt.system, SYSTEM_PROMPT);
        assert!(prompt.user.ends_with("exact JSON format specified above."));
    }

    #[test]
    fn test_prompt_contains_merge_context() {
        let user = Prompt::for_merge(&context()).user;
        assert!(user.contains("- Author: alice"));
        assert!(user.contains("- Commits: 2"));
        assert!(user.contains("- Lines Added: 120"));
        assert!(user.contains("- Development Time: 4.58 hours"));
        assert!(user.contains("- Add login form (2026-03-01 09:30)"));
        assert!(user.contains("Full Commit Message:"));
        assert!(user.contains("```diff\n+fn login() {}\n```"));
    }

    #[test]
    fn test_context_header_lines() {
        let mut out = String::new();
        render_context(&mut out, &context());
        let header: Vec<&str> = out.lines().take(10).collect();
        similar_asserts::assert_eq!(
            header,
            vec![
                "Merge Analysis:",
                "- Subject: Merge pull request #42 from acme/login",
                "- Author: alice",
                "- Commits: 2",
                "- Lines Added: 120",
                "- Lines Deleted: 8",
                "- Files Changed: 4",
                "- Development Time: 4.58 hours",
                "- Review Time: 20.00 hours",
                "- Merge Date: 2026-03-02 10:05:00",
            ]
        );
    }

    #[test]
    fn test_diff_omitted_when_absent() {
        let mut ctx = context();
        ctx.diff = None;
        let user = Prompt::for_merge(&ctx).user;
        assert!(!user.contains("Code Changes"));
    }

    #[test]
    fn test_message_equal_to_subject_not_repeated() {
        let mut ctx = context();
        ctx.message = ctx.subject.clone();
        let user = Prompt::for_merge(&ctx).user;
        assert!(!user.contains("Full Commit Message"));
    }

    #[test]
    fn test_prompt_changes_with_diff() {
        let a = Prompt::for_merge(&context());
        let mut ctx = context();
        ctx.diff = Some("+fn logout() {}".to_string());
        let b = Prompt::for_merge(&ctx);
        assert_ne!(a.cache_payload(), b.cache_payload());
    }
}
