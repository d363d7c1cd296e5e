//! Reflexive search controller.
//!
//! Runs up to four search strategies in sequence against a caller-supplied
//! search function, each with its own keyword/vector blend and query
//! reformulation, and stops as soon as one attempt reaches the quality
//! threshold. Results from all attempts are merged, deduplicated by
//! `(filePath, name)`, and returned score-descending.
//!
//! | # | Strategy | α | Transform |
//! |---|----------|---|-----------|
//! | 1 | `balanced-semantic` | 0.7 | identity |
//! | 2 | `keyword-expanded` | 0.3 | append curated synonyms per token |
//! | 3 | `semantic-simplified` | 0.9 | drop closed-class noise words |
//! | 4 | `code-identifiers` | 0.5 | append identifier-style variants |
//!
//! Strategies run **sequentially**: early termination and bounded store
//! load depend on it, and later attempts never start once quality is met.
//! Per-attempt errors are recorded and the loop continues; if every attempt
//! fails the merged list is empty and `quality_met` is false — a soft
//! failure, never a crash. Cancellation propagates by dropping the future,
//! which can only happen at a strategy boundary await.

use std::collections::HashMap;
use std::future::Future;

use serde::Serialize;

use crate::error::Result;
use crate::rewrite::{camel_case, domain_synonyms, kebab_case, pascal_case, snake_case};
use crate::store::Hit;

pub const DEFAULT_THRESHOLD: f64 = 0.7;
pub const DEFAULT_MAX_ATTEMPTS: usize = 4;

/// Closed-class words dropped by the `simplify` transform.
const NOISE_WORDS: &[&str] = &[
    "a", "an", "and", "are", "do", "does", "for", "how", "i", "in", "is", "me", "my", "of",
    "on", "that", "the", "this", "to", "what", "where", "with",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTransform {
    Identity,
    Expand,
    Simplify,
    CodeStyle,
}

/// One row of the strategy table.
#[derive(Debug, Clone, Copy)]
pub struct Strategy {
    pub name: &'static str,
    pub alpha: f64,
    pub transform: QueryTransform,
}

pub const STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "balanced-semantic",
        alpha: 0.7,
        transform: QueryTransform::Identity,
    },
    Strategy {
        name: "keyword-expanded",
        alpha: 0.3,
        transform: QueryTransform::Expand,
    },
    Strategy {
        name: "semantic-simplified",
        alpha: 0.9,
        transform: QueryTransform::Simplify,
    },
    Strategy {
        name: "code-identifiers",
        alpha: 0.5,
        transform: QueryTransform::CodeStyle,
    },
];

#[derive(Debug, Clone, Copy)]
pub struct ReflexionOptions {
    /// Top score an attempt must reach to stop the sweep.
    pub threshold: f64,
    pub max_attempts: usize,
}

impl Default for ReflexionOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Record of one executed strategy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub strategy: &'static str,
    pub alpha: f64,
    pub query: String,
    pub top_score: f64,
    pub result_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a reflexion sweep.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflexionOutcome {
    #[serde(skip)]
    pub results: Vec<Hit>,
    pub best_attempt: Option<Attempt>,
    pub attempts: Vec<Attempt>,
    pub quality_met: bool,
    pub best_score: f64,
    pub threshold: f64,
    pub total_attempts: usize,
}

/// Apply a strategy's query reformulation.
pub fn transform_query(query: &str, transform: QueryTransform) -> String {
    match transform {
        QueryTransform::Identity => query.to_string(),
        QueryTransform::Expand => expand(query),
        QueryTransform::Simplify => simplify(query),
        QueryTransform::CodeStyle => code_style(query),
    }
}

fn expand(query: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    for token in query.split_whitespace() {
        parts.push(token.to_string());
        if let Some(synonyms) = domain_synonyms(&token.to_lowercase()) {
            for synonym in synonyms.iter().take(2) {
                if !parts.iter().any(|p| p == synonym) {
                    parts.push((*synonym).to_string());
                }
            }
        }
    }
    parts.join(" ")
}

fn simplify(query: &str) -> String {
    let kept: Vec<&str> = query
        .split_whitespace()
        .filter(|t| !NOISE_WORDS.contains(&t.to_lowercase().as_str()))
        .collect();
    if kept.is_empty() {
        query.to_string()
    } else {
        kept.join(" ")
    }
}

fn code_style(query: &str) -> String {
    let tokens: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();
    if tokens.is_empty() {
        return query.to_string();
    }

    let pascal = pascal_case(&tokens);
    let mut parts = vec![query.to_string()];
    for variant in [
        camel_case(&tokens),
        pascal.clone(),
        snake_case(&tokens),
        kebab_case(&tokens),
        format!("use{pascal}"),
        format!("handle{pascal}"),
    ] {
        if !parts.iter().any(|p| *p == variant) {
            parts.push(variant);
        }
    }
    parts.join(" ")
}

/// Run the strategy sweep against `search`, a function of
/// `(query, alpha) → hits` capturing whatever filters the caller needs.
pub async fn run_reflexion<F, Fut>(
    query: &str,
    opts: &ReflexionOptions,
    mut search: F,
) -> ReflexionOutcome
where
    F: FnMut(String, f64) -> Fut,
    Fut: Future<Output = Result<Vec<Hit>>>,
{
    let count = STRATEGIES.len().min(opts.max_attempts);
    let mut attempts: Vec<Attempt> = Vec::with_capacity(count);
    let mut attempt_hits: Vec<Vec<Hit>> = Vec::with_capacity(count);

    for strategy in &STRATEGIES[..count] {
        let rewritten = transform_query(query, strategy.transform);

        match search(rewritten.clone(), strategy.alpha).await {
            Ok(hits) => {
                let top_score = hits.iter().map(|h| h.score).fold(0.0_f64, f64::max);
                tracing::debug!(
                    strategy = strategy.name,
                    top_score,
                    results = hits.len(),
                    "reflexion attempt"
                );
                attempts.push(Attempt {
                    strategy: strategy.name,
                    alpha: strategy.alpha,
                    query: rewritten,
                    top_score,
                    result_count: hits.len(),
                    error: None,
                });
                attempt_hits.push(hits);
                if top_score >= opts.threshold {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(strategy = strategy.name, error = %e, "reflexion attempt failed");
                attempts.push(Attempt {
                    strategy: strategy.name,
                    alpha: strategy.alpha,
                    query: rewritten,
                    top_score: 0.0,
                    result_count: 0,
                    error: Some(e.to_string()),
                });
                attempt_hits.push(Vec::new());
            }
        }
    }

    let results = merge_hits(attempt_hits);

    let best_attempt = attempts
        .iter()
        .filter(|a| a.error.is_none())
        .max_by(|a, b| {
            a.top_score
                .partial_cmp(&b.top_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned();
    let best_score = best_attempt.as_ref().map_or(0.0, |a| a.top_score);

    ReflexionOutcome {
        results,
        quality_met: best_score >= opts.threshold,
        best_score,
        best_attempt,
        threshold: opts.threshold,
        total_attempts: attempts.len(),
        attempts,
    }
}

/// Deduplicate the union of all attempts by `(filePath, name)`, keeping the
/// highest score per key, sorted score-descending (key ascending on ties so
/// overlapping attempts produce a stable list).
///
/// Also used by the façade to enforce the no-duplicates guarantee on
/// single-shot searches.
pub(crate) fn merge_hits(attempt_hits: Vec<Vec<Hit>>) -> Vec<Hit> {
    let mut merged: HashMap<(String, String), Hit> = HashMap::new();

    for hits in attempt_hits {
        for hit in hits {
            let key = hit_key(&hit);
            match merged.get_mut(&key) {
                Some(existing) => {
                    if hit.score > existing.score {
                        *existing = hit;
                    }
                }
                None => {
                    merged.insert(key, hit);
                }
            }
        }
    }

    let mut results: Vec<(String, String, Hit)> = merged
        .into_iter()
        .map(|((file, name), hit)| (file, name, hit))
        .collect();
    results.sort_by(|a, b| {
        b.2.score
            .partial_cmp(&a.2.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
            .then_with(|| a.1.cmp(&b.1))
    });
    results.into_iter().map(|(_, _, hit)| hit).collect()
}

fn hit_key(hit: &Hit) -> (String, String) {
    let file = hit
        .properties
        .get("filePath")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let name = hit
        .properties
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    (file, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn hit(file: &str, name: &str, score: f64) -> Hit {
        Hit {
            properties: serde_json::json!({"filePath": file, "name": name}),
            score,
        }
    }

    #[tokio::test]
    async fn test_early_exit_on_quality() {
        let calls = AtomicUsize::new(0);
        let outcome = run_reflexion(
            "user auth",
            &ReflexionOptions {
                threshold: 0.6,
                max_attempts: 4,
            },
            |_q, _a| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(vec![hit("src/auth.ts", "useAuth", 0.81)]) }
            },
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.total_attempts, 1);
        assert!(outcome.quality_met);
        assert_eq!(outcome.best_attempt.unwrap().strategy, "balanced-semantic");
    }

    #[tokio::test]
    async fn test_threshold_zero_single_identity_attempt() {
        let outcome = run_reflexion(
            "anything",
            &ReflexionOptions {
                threshold: 0.0,
                max_attempts: 4,
            },
            |_q, _a| async { Ok(Vec::new()) },
        )
        .await;

        // Empty hits give top score 0, which meets a zero threshold.
        assert_eq!(outcome.total_attempts, 1);
        assert_eq!(outcome.attempts[0].query, "anything");
    }

    #[tokio::test]
    async fn test_full_sweep_merges_all_attempts() {
        let calls = AtomicUsize::new(0);
        let outcome = run_reflexion(
            "auth",
            &ReflexionOptions {
                threshold: 0.99,
                max_attempts: 4,
            },
            |_q, _a| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    Ok(match n {
                        0 => vec![hit("a.ts", "alpha", 0.5), hit("b.ts", "beta", 0.4)],
                        1 => vec![hit("a.ts", "alpha", 0.7)],
                        2 => vec![hit("c.ts", "gamma", 0.3)],
                        _ => vec![],
                    })
                }
            },
        )
        .await;

        assert_eq!(outcome.total_attempts, 4);
        assert!(!outcome.quality_met);
        assert!((outcome.best_score - 0.7).abs() < 1e-9);
        assert!(outcome.best_score < 0.99);

        // Union of dedup'd hits, highest score per key, sorted descending.
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.results[0].properties["name"], "alpha");
        assert!((outcome.results[0].score - 0.7).abs() < 1e-9);
        assert_eq!(outcome.results[1].properties["name"], "beta");
        assert_eq!(outcome.results[2].properties["name"], "gamma");
    }

    #[tokio::test]
    async fn test_best_score_equals_max_attempt_score() {
        let calls = AtomicUsize::new(0);
        let outcome = run_reflexion(
            "q",
            &ReflexionOptions {
                threshold: 1.1,
                max_attempts: 4,
            },
            |_q, _a| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(vec![hit("f.ts", "x", 0.2 + n as f64 * 0.1)]) }
            },
        )
        .await;

        let max = outcome
            .attempts
            .iter()
            .map(|a| a.top_score)
            .fold(0.0_f64, f64::max);
        assert!((outcome.best_score - max).abs() < 1e-9);
        assert!(!outcome.quality_met);
    }

    #[tokio::test]
    async fn test_errors_recorded_and_loop_continues() {
        let calls = AtomicUsize::new(0);
        let outcome = run_reflexion(
            "q",
            &ReflexionOptions {
                threshold: 0.9,
                max_attempts: 3,
            },
            |_q, _a| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(Error::Transient("store down".to_string()))
                    } else {
                        Ok(vec![hit("f.ts", "x", 0.4)])
                    }
                }
            },
        )
        .await;

        assert_eq!(outcome.total_attempts, 3);
        assert!(outcome.attempts[0].error.is_some());
        assert!(outcome.attempts[1].error.is_none());
        assert!(!outcome.results.is_empty());
    }

    #[tokio::test]
    async fn test_all_attempts_error_is_soft_failure() {
        let outcome = run_reflexion(
            "q",
            &ReflexionOptions::default(),
            |_q, _a| async { Err(Error::Transient("down".to_string())) },
        )
        .await;

        assert!(outcome.results.is_empty());
        assert!(!outcome.quality_met);
        assert!((outcome.best_score - 0.0).abs() < f64::EPSILON);
        assert_eq!(outcome.total_attempts, STRATEGIES.len());
        assert!(outcome.best_attempt.is_none());
    }

    #[tokio::test]
    async fn test_max_attempts_caps_strategies() {
        let calls = AtomicUsize::new(0);
        let outcome = run_reflexion(
            "q",
            &ReflexionOptions {
                threshold: 0.99,
                max_attempts: 2,
            },
            |_q, _a| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(Vec::new()) }
            },
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.total_attempts, 2);
    }

    #[test]
    fn test_transform_expand_appends_synonyms() {
        let expanded = transform_query("fetch state", QueryTransform::Expand);
        assert!(expanded.starts_with("fetch"));
        assert!(expanded.contains("get"));
        assert!(expanded.contains("store"));
    }

    #[test]
    fn test_transform_simplify_drops_noise() {
        assert_eq!(
            transform_query("how do i fetch the user", QueryTransform::Simplify),
            "fetch user"
        );
        // All-noise queries survive untouched.
        assert_eq!(
            transform_query("how do i", QueryTransform::Simplify),
            "how do i"
        );
    }

    #[test]
    fn test_transform_code_style_variants() {
        let styled = transform_query("auth button", QueryTransform::CodeStyle);
        assert!(styled.contains("authButton"));
        assert!(styled.contains("AuthButton"));
        assert!(styled.contains("auth_button"));
        assert!(styled.contains("auth-button"));
        assert!(styled.contains("useAuthButton"));
        assert!(styled.contains("handleAuthButton"));
    }

    #[test]
    fn test_strategy_table_order() {
        let names: Vec<&str> = STRATEGIES.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            [
                "balanced-semantic",
                "keyword-expanded",
                "semantic-simplified",
                "code-identifiers"
            ]
        );
        let alphas: Vec<f64> = STRATEGIES.iter().map(|s| s.alpha).collect();
        assert_eq!(alphas, [0.7, 0.3, 0.9, 0.5]);
    }
}
