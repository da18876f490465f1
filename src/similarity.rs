// 🔍 Similarity Engine - warn before near-duplicate names are created
//
// "P.1" vs "p 1 " or "Nakato Grace" vs "Nakato  Gracee" are probably the same thing typed
// twice. Exact duplicates of class names are rejected by the database; this engine only
// produces advisory matches.
//
// Score: Ratcliff/Obershelp ratio 2*M / (|a| + |b|) over normalised strings, where M is
// the number of characters matched by recursively taking the longest common block.

use serde::{Deserialize, Serialize};

// ============================================================================
// NORMALISATION
// ============================================================================

/// Lowercase, trim and collapse runs of whitespace to a single space.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// SIMILAR MATCH RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarMatch {
    /// Existing name, as stored
    pub existing: String,

    /// Similarity score (0.0 - 1.0)
    pub score: f64,
}

// ============================================================================
// SIMILARITY ENGINE
// ============================================================================

pub struct SimilarityEngine {
    /// Minimum score for a match (default: 0.82)
    pub threshold: f64,
}

impl SimilarityEngine {
    pub fn new() -> Self {
        SimilarityEngine { threshold: 0.82 }
    }

    /// Ratio in [0, 1] between two strings after normalisation.
    /// Two blank strings score 0.0: nothing to compare.
    pub fn ratio(&self, a: &str, b: &str) -> f64 {
        let a: Vec<char> = normalize_text(a).chars().collect();
        let b: Vec<char> = normalize_text(b).chars().collect();

        let total = a.len() + b.len();
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let matched = matching_chars(&a, &b);
        2.0 * matched as f64 / total as f64
    }

    /// Existing names whose score meets the threshold, most similar first.
    pub fn find_similar<'a, I>(&self, candidate: &str, existing: I) -> Vec<SimilarMatch>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut matches: Vec<SimilarMatch> = existing
            .into_iter()
            .filter_map(|name| {
                let score = self.ratio(candidate, name);
                if score >= self.threshold {
                    Some(SimilarMatch {
                        existing: name.to_string(),
                        score,
                    })
                } else {
                    None
                }
            })
            .collect();

        matches.sort_by(|x, y| {
            y.score
                .partial_cmp(&x.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| x.existing.cmp(&y.existing))
        });
        matches
    }
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Characters matched by recursive longest-common-block decomposition.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (start_a, start_b, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }

    len + matching_chars(&a[..start_a], &b[..start_b])
        + matching_chars(&a[start_a + len..], &b[start_b + len..])
}

/// Longest common contiguous block; earliest in `a`, then earliest in `b`, on ties.
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    // prev[j + 1] = length of common suffix ending at a[i - 1], b[j]
    let mut prev = vec![0usize; b.len() + 1];

    for i in 0..a.len() {
        let mut current = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            if a[i] == b[j] {
                let len = prev[j] + 1;
                current[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = current;
    }

    best
}

// ============================================================================
// TESTS
// ============================================================================
