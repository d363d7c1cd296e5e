//! Adaptive rank-gap truncation.
//!
//! Given a score-sorted result list, find the largest gap between
//! consecutive scores inside the `[min_results, max_results]` band and cut
//! there when the gap is significant relative to the scores around it.
//! Otherwise fall back to the `max_results` cap. Equal scores are never
//! split: a tie at the cap extends the kept prefix.
//!
//! Significance: the largest gap must reach `min(30% of the score at the
//! cut point, 0.1)` — the relative rule for high-score regimes, the absolute
//! rule for low ones, whichever bites first.

use serde::Serialize;

use crate::store::Hit;

/// Truncation bounds. Defaults: keep at most 10, never cut below 3.
#[derive(Debug, Clone, Copy)]
pub struct AutocutOptions {
    pub max_results: usize,
    pub min_results: usize,
}

impl Default for AutocutOptions {
    fn default() -> Self {
        Self {
            max_results: 10,
            min_results: 3,
        }
    }
}

impl AutocutOptions {
    /// Bounds for a caller-supplied result cap.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            max_results: limit,
            min_results: limit.min(3),
        }
    }
}

/// What the cut did, attached to every autocut response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutocutMetadata {
    pub original_count: usize,
    pub kept_count: usize,
    pub gap_found: bool,
    pub largest_gap: f64,
}

/// Truncate `hits` (already sorted by descending score) at the largest
/// significant score gap.
pub fn autocut(hits: Vec<Hit>, opts: &AutocutOptions) -> (Vec<Hit>, AutocutMetadata) {
    let original_count = hits.len();

    let finish = |kept: Vec<Hit>, gap_found: bool, largest_gap: f64| {
        let meta = AutocutMetadata {
            original_count,
            kept_count: kept.len(),
            gap_found,
            largest_gap,
        };
        (kept, meta)
    };

    if original_count == 0 {
        return finish(hits, false, 0.0);
    }
    if original_count < opts.min_results {
        return finish(hits, false, 0.0);
    }

    let window = original_count.min(opts.max_results.saturating_mul(3));
    let scores: Vec<f64> = hits[..window].iter().map(|h| h.score).collect();

    if scores.iter().all(|s| *s == 0.0) {
        let mut kept = hits;
        kept.truncate(opts.min_results);
        return finish(kept, false, 0.0);
    }

    // Gaps are only considered between min_results and max_results: cutting
    // earlier would starve the caller, later never happens anyway.
    let mut largest_gap = 0.0_f64;
    let mut cut_index: Option<usize> = None;
    let lo = opts.min_results.saturating_sub(1);
    let hi = opts.max_results.saturating_sub(1);
    for i in lo..=hi {
        if i + 1 >= window {
            break;
        }
        let gap = scores[i] - scores[i + 1];
        if gap > largest_gap {
            largest_gap = gap;
            cut_index = Some(i);
        }
    }

    if let Some(i) = cut_index {
        let significance = (0.3 * scores[i]).min(0.1);
        if largest_gap >= significance {
            let mut kept = hits;
            kept.truncate(i + 1);
            return finish(kept, true, largest_gap);
        }
    }

    // No significant gap: keep max_results, extending across an exact tie
    // at the boundary.
    let mut keep = original_count.min(opts.max_results);
    while keep < original_count && hits[keep].score == hits[keep - 1].score {
        keep += 1;
    }
    let mut kept = hits;
    kept.truncate(keep);
    finish(kept, false, largest_gap)
}
