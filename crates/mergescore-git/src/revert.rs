// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Revert-chain detection
//!
//! A change that is merged, reverted and re-landed shows up as several merges
//! with the same underlying subject. Only the merge that last left the change
//! active carries net impact; the others are superseded.

use std::collections::{BTreeMap, HashSet};

/// Peel any number of revert prefixes off a subject
///
/// Handles `Revert "…"`, `Revert '…'`, `Revert: …` and bare `Revert …`, in
/// any nesting. Returns the innermost subject and whether a revert prefix
/// was present.
#[must_use]
pub fn original_subject(subject: &str) -> (String, bool) {
    let mut current = subject;
    let mut is_revert = false;

    loop {
        if let Some(rest) = strip_revert_prefix(current, ':') {
            current = rest.trim();
            is_revert = true;
            continue;
        }

        let Some(rest) = strip_revert_prefix(current, ' ') else {
            break;
        };

        match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => match rest.rfind(quote) {
                Some(close) if close > 0 => {
                    current = &rest[1..close];
                    is_revert = true;
                }
                // Unterminated quote
                _ => break,
            },
            _ => {
                current = rest;
                is_revert = true;
            }
        }
    }

    (current.to_string(), is_revert)
}

/// Original subject with a trailing `(#123)` pull-request suffix removed
#[must_use]
pub fn normalized_subject(subject: &str) -> (String, bool) {
    let (original, is_revert) = original_subject(subject);
    (strip_pr_suffix(&original).to_string(), is_revert)
}

/// SHAs of merges that are superseded within a revert chain
///
/// `merges` yields `(sha, subject)` pairs in chronological order. Only groups
/// of two or more merges that contain at least one revert form a chain;
/// merges that merely share a subject are left alone.
pub fn superseded<'a, I>(merges: I) -> HashSet<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut groups: BTreeMap<String, Vec<(&'a str, bool)>> = BTreeMap::new();
    for (sha, subject) in merges {
        let (normalized, is_revert) = normalized_subject(subject);
        groups.entry(normalized).or_default().push((sha, is_revert));
    }

    let mut out = HashSet::new();
    let chains = groups
        .values()
        .filter(|chain| chain.len() > 1 && chain.iter().any(|&(_, is_revert)| is_revert));
    for chain in chains {
        let mut active = false;
        let mut net: Option<&str> = None;

        for &(sha, is_revert) in chain {
            active = if is_revert { !active } else { true };
            net = active.then_some(sha);
        }

        out.extend(
            chain
                .iter()
                .filter(|(sha, _)| Some(*sha) != net)
                .map(|(sha, _)| (*sha).to_string()),
        );
    }
    out
}

/// `Revert<sep>rest` with a case-insensitive leading `R`
fn strip_revert_prefix(subject: &str, sep: char) -> Option<&str> {
    let rest = subject
        .strip_prefix("Revert")
        .or_else(|| subject.strip_prefix("revert"))?;
    rest.strip_prefix(sep)
}

fn strip_pr_suffix(subject: &str) -> &str {
    let trimmed = subject.trim_end();
    let Some(inner) = trimmed.strip_suffix(')') else {
        return subject;
    };
    let Some(open) = inner.rfind("(#") else {
        return subject;
    };
    let digits = &inner[open + 2..];
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return subject;
    }
    inner[..open].trim_end()
}
