//! Candidate name lists.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

fn is_graphql_name(word: &str) -> bool {
    let mut chars = word.chars();
    chars
        .next()
        .is_some_and(|first| first == '_' || first.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Parses one candidate per line. Lines are trimmed; blanks and words that
/// cannot be GraphQL names are dropped, and duplicates keep their first
/// position.
pub fn parse_wordlist(contents: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut words = Vec::new();
    let mut skipped = 0usize;

    for line in contents.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if !is_graphql_name(line) {
            skipped += 1;
            continue;
        }
        if seen.insert(line) {
            words.push(line.to_string());
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, "Dropped wordlist entries that are not GraphQL names");
    }
    words
}

#[tracing::instrument(fields(path = %path.display()))]
pub fn load_wordlist(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read wordlist {}", path.display()))?;
    let words = parse_wordlist(&contents);
    if words.is_empty() {
        anyhow::bail!("Wordlist {} has no usable names", path.display());
    }
    tracing::info!(words = words.len(), "Wordlist loaded");
    Ok(words)
}
