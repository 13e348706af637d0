//! Filter pipeline - derives the eligible pool from comments, rules, and winners
//!
//! Pure and deterministic. Stages run in a fixed order: keyword, level,
//! author dedupe, winner exclusion.

use std::collections::HashSet;

use crate::model::{CanonicalComment, FilterConfig, Winner};

/// How many comments survived each stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub input: usize,
    pub after_keywords: usize,
    pub after_level: usize,
    pub after_dedupe: usize,
    pub eligible: usize,
}

/// Compute the eligible pool
pub fn eligible_pool(
    comments: &[CanonicalComment],
    config: &FilterConfig,
    winners: &[Winner],
) -> Vec<CanonicalComment> {
    eligible_pool_with_stats(comments, config, winners).0
}

/// Compute the eligible pool along with per-stage counts
pub fn eligible_pool_with_stats(
    comments: &[CanonicalComment],
    config: &FilterConfig,
    winners: &[Winner],
) -> (Vec<CanonicalComment>, FilterStats) {
    let mut stats = FilterStats {
        input: comments.len(),
        ..Default::default()
    };

    let pool: Vec<&CanonicalComment> = comments
        .iter()
        .filter(|c| matches_keywords(c, &config.keywords))
        .collect();
    stats.after_keywords = pool.len();

    let pool: Vec<&CanonicalComment> = pool
        .into_iter()
        .filter(|c| meets_level(c, config.min_level))
        .collect();
    stats.after_level = pool.len();

    let pool = if config.dedupe_by_author {
        dedupe_by_author(pool)
    } else {
        pool
    };
    stats.after_dedupe = pool.len();

    let pool = exclude_winners(pool, winners);
    stats.eligible = pool.len();

    (pool.into_iter().cloned().collect(), stats)
}

/// Keep if no keywords are set or any keyword is a substring of the text
pub fn matches_keywords(comment: &CanonicalComment, keywords: &[String]) -> bool {
    keywords.is_empty() || keywords.iter().any(|k| comment.text.contains(k.as_str()))
}

pub fn meets_level(comment: &CanonicalComment, min_level: u32) -> bool {
    comment.level >= min_level
}

/// Keep the first comment per author, in input order
pub fn dedupe_by_author<'a>(comments: Vec<&'a CanonicalComment>) -> Vec<&'a CanonicalComment> {
    let mut seen = HashSet::new();
    comments
        .into_iter()
        .filter(|&c| seen.insert(c.author_id.as_str()))
        .collect()
}

/// Drop comments whose author or comment ID already won
pub fn exclude_winners<'a>(
    comments: Vec<&'a CanonicalComment>,
    winners: &[Winner],
) -> Vec<&'a CanonicalComment> {
    if winners.is_empty() {
        return comments;
    }

    let won_authors: HashSet<&str> = winners
        .iter()
        .map(|w| w.comment.author_id.as_str())
        .collect();
    let won_comments: HashSet<&str> = winners
        .iter()
        .map(|w| w.comment.comment_id.as_str())
        .collect();

    comments
        .into_iter()
        .filter(|c| {
            !won_authors.contains(c.author_id.as_str())
                && !won_comments.contains(c.comment_id.as_str())
        })
        .collect()
}
