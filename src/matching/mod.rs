//! Cross-run stage matching.
//!
//! Stage ids are meaningless across runs: the same logical stage can be
//! stage 4 in one run and stage 17 in the next. The matcher pairs stages by
//! what they *are* instead: a similarity score over name and duration,
//! accepted greedily one-to-one from the best-scoring candidate pair down.
//!
//! The score is a fixed, documented formula:
//!
//! ```text
//! score = 0.7 × name_similarity + 0.3 × duration_proximity
//! ```
//!
//! where `name_similarity` is the Jaccard index over case-insensitive
//! whitespace tokens and `duration_proximity` is `min(dₐ,d_b)/max(dₐ,d_b)`.
//! When either duration is unknown the proximity term contributes 0; when
//! both are unknown the weights renormalize and the score is name-only
//! (two pending stages with identical names still score 1.0).
//!
//! Ranking candidates globally (rather than picking a partner per stage of
//! run A in order) keeps pairing symmetric: swapping the runs yields the
//! same pairs mirrored.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::snapshot::StageRecord;

/// Weight of name similarity in the combined score.
const NAME_WEIGHT: f64 = 0.7;

/// Weight of duration proximity in the combined score.
const DURATION_WEIGHT: f64 = 0.3;

/// One accepted stage pairing.
///
/// Indices point into the stage lists the matcher was given. Each index
/// appears in at most one match per side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageMatch {
    /// Index into run A's stage list.
    pub index_a: usize,
    /// Index into run B's stage list.
    pub index_b: usize,
    /// Combined similarity score in `[0, 1]`.
    pub score: f64,
}

/// Outcome of matching two runs' stage lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Accepted pairs, best score first.
    pub matches: Vec<StageMatch>,
    /// Stage count in run A.
    pub stage_count_a: usize,
    /// Stage count in run B.
    pub stage_count_b: usize,
    /// Advice when nothing matched. Zero matches is an expected outcome
    /// (renamed pipelines, refactored jobs), not an error.
    pub suggestion: Option<String>,
}

impl MatchReport {
    /// Matched share of the smaller run, in `[0, 1]`. 0.0 when either run
    /// has no stages.
    #[must_use]
    pub fn match_fraction(&self) -> f64 {
        let denominator = self.stage_count_a.min(self.stage_count_b);
        if denominator == 0 {
            return 0.0;
        }
        self.matches.len() as f64 / denominator as f64
    }
}

/// Case-insensitive token-set Jaccard similarity of two stage names.
///
/// `"map at Etl.scala:42"` and `"MAP at Etl.scala:42"` score 1.0; names
/// with no tokens in common score 0.0.
#[must_use]
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let tokens_a: HashSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let tokens_b: HashSet<String> = b.split_whitespace().map(str::to_lowercase).collect();
    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Combined similarity score for one candidate stage pair.
#[must_use]
pub fn similarity_score(a: &StageRecord, b: &StageRecord) -> f64 {
    let name = name_similarity(&a.name, &b.name);
    match (a.duration_seconds(), b.duration_seconds()) {
        (Some(da), Some(db)) => {
            let proximity = duration_proximity(da, db);
            NAME_WEIGHT * name + DURATION_WEIGHT * proximity
        }
        (None, None) => name,
        _ => NAME_WEIGHT * name,
    }
}

fn duration_proximity(da: f64, db: f64) -> f64 {
    let max = da.max(db);
    if max <= 0.0 {
        // Both instantaneous: identical as far as duration goes.
        return 1.0;
    }
    da.min(db) / max
}

/// Pair stages across two runs, one-to-one, best score first.
///
/// All A×B candidate pairs are scored; pairs at or above
/// `similarity_threshold` are accepted greedily in descending score order,
/// skipping any pair whose stage on either side is already taken.
#[must_use]
pub fn match_stages(
    stages_a: &[StageRecord],
    stages_b: &[StageRecord],
    similarity_threshold: f64,
) -> MatchReport {
    let mut candidates: Vec<StageMatch> = Vec::new();
    for (index_a, stage_a) in stages_a.iter().enumerate() {
        for (index_b, stage_b) in stages_b.iter().enumerate() {
            let score = similarity_score(stage_a, stage_b);
            if score >= similarity_threshold {
                candidates.push(StageMatch {
                    index_a,
                    index_b,
                    score,
                });
            }
        }
    }

    // Descending by score; index order breaks ties so matching is
    // deterministic.
    candidates.sort_by(|x, y| {
        y.score
            .partial_cmp(&x.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| x.index_a.cmp(&y.index_a))
            .then_with(|| x.index_b.cmp(&y.index_b))
    });

    let mut used_a = vec![false; stages_a.len()];
    let mut used_b = vec![false; stages_b.len()];
    let mut matches = Vec::new();
    for candidate in candidates {
        if used_a[candidate.index_a] || used_b[candidate.index_b] {
            continue;
        }
        used_a[candidate.index_a] = true;
        used_b[candidate.index_b] = true;
        matches.push(candidate);
    }

    debug!(
        matched = matches.len(),
        stages_a = stages_a.len(),
        stages_b = stages_b.len(),
        threshold = similarity_threshold,
        "stage matching complete"
    );

    let suggestion = if matches.is_empty() && !stages_a.is_empty() && !stages_b.is_empty() {
        Some(format!(
            "No stage pair scored at or above the similarity threshold ({similarity_threshold}). \
             Lower similarity_threshold to pair stages whose names changed between runs."
        ))
    } else {
        None
    };

    MatchReport {
        matches,
        stage_count_a: stages_a.len(),
        stage_count_b: stages_b.len(),
        suggestion,
    }
}
