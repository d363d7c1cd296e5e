//! Search façade: the public entry points behind the agent tools.
//!
//! | Entry point | Pipeline |
//! |-------------|----------|
//! | [`basic_search`] | optional rewrite → one hybrid call → optional autocut |
//! | [`advanced_search`] | reflexion sweep → merge → autocut |
//! | [`similarity_search`] | near-text with a certainty floor |
//! | [`type_search`] | hybrid over `TypeDefinition` |
//! | [`memory_search`] | hybrid over `ConversationMemory` |
//!
//! All entry points share the result guarantees: sorted by descending score,
//! no `(filePath, name)` duplicates, never more than the requested limit
//! (autocut may exceed it only across an exact score tie, which it never
//! splits). Each is shared by the CLI `run_*` wrappers and the HTTP server.

use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::autocut::{autocut, AutocutMetadata, AutocutOptions};
use crate::error::{Error, Result};
use crate::models::{ChunkType, CodeChunk, ConversationMemory, TypeDefinition};
use crate::reflexion::{merge_hits, run_reflexion, Attempt, ReflexionOptions};
use crate::rewrite::{self, RewrittenQuery};
use crate::store::{collections, Filter, Hit, Store};

const TYPE_SEARCH_ALPHA: f64 = 0.7;
const MEMORY_SEARCH_ALPHA: f64 = 0.7;
const SIMILARITY_CERTAINTY: f64 = 0.7;
const JS_DOC_PREVIEW_CHARS: usize = 200;
const TYPE_PROPERTIES_CAP: usize = 10;
const AUTOCUT_MIN_FETCH: usize = 30;

// ============ Options ============

#[derive(Debug, Clone)]
pub struct BasicSearchOptions {
    pub project: String,
    pub limit: usize,
    pub chunk_types: Option<Vec<ChunkType>>,
    pub alpha: f64,
    pub rewrite: bool,
    pub autocut: bool,
}

impl BasicSearchOptions {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            limit: 10,
            chunk_types: None,
            alpha: 0.5,
            rewrite: false,
            autocut: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdvancedSearchOptions {
    pub project: String,
    pub limit: usize,
    pub chunk_types: Option<Vec<ChunkType>>,
    pub threshold: f64,
    pub max_attempts: usize,
}

impl AdvancedSearchOptions {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            limit: 10,
            chunk_types: None,
            threshold: 0.5,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimilarityOptions {
    pub project: String,
    pub limit: usize,
}

impl SimilarityOptions {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            limit: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypeSearchOptions {
    pub project: String,
    pub limit: usize,
}

impl TypeSearchOptions {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            limit: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemorySearchOptions {
    pub project: Option<String>,
    pub limit: usize,
}

impl Default for MemorySearchOptions {
    fn default() -> Self {
        Self {
            project: None,
            limit: 5,
        }
    }
}

// ============ Response shapes ============

/// One ranked code result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub rank: usize,
    pub name: String,
    #[serde(rename = "type")]
    pub chunk_type: String,
    /// `path:lineStart` of the chunk.
    pub file: String,
    pub signature: String,
    pub js_doc: String,
    pub score: f64,
    pub content: String,
}

/// Rewrite details attached when `rewrite` was requested.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteMetadata {
    pub original: String,
    pub rewritten: String,
    pub variants: Vec<String>,
    pub synonyms_used: Vec<String>,
    pub confidence: f64,
    pub used_llm: bool,
}

impl From<RewrittenQuery> for RewriteMetadata {
    fn from(r: RewrittenQuery) -> Self {
        Self {
            original: r.original,
            rewritten: r.primary,
            variants: r.variants,
            synonyms_used: r.synonyms_used,
            confidence: r.confidence,
            used_llm: r.used_llm,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// The query actually sent to the store.
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_query: Option<String>,
    pub project: String,
    pub result_count: usize,
    pub results: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewrite_metadata: Option<RewriteMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autocut_metadata: Option<AutocutMetadata>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedMetadata {
    pub total_attempts: usize,
    pub quality_met: bool,
    pub best_score: f64,
    pub threshold: f64,
    pub best_attempt: Option<Attempt>,
    pub attempts: Vec<Attempt>,
    pub autocut: AutocutMetadata,
    pub elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedSearchResponse {
    pub query: String,
    pub project: String,
    pub result_count: usize,
    pub results: Vec<SearchHit>,
    pub metadata: AdvancedMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarHit {
    pub name: String,
    #[serde(rename = "type")]
    pub chunk_type: String,
    pub file: String,
    /// Pass-through certainty from the store, in `[0, 1]`.
    pub similarity: f64,
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarResponse {
    pub project: String,
    pub result_count: usize,
    pub results: Vec<SimilarHit>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeHit {
    pub name: String,
    pub kind: String,
    pub file: String,
    /// First ten property names.
    pub properties: Vec<String>,
    pub extends: Vec<String>,
    pub from_db: bool,
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSearchResponse {
    pub query: String,
    pub project: String,
    pub result_count: usize,
    pub results: Vec<TypeHit>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryHit {
    pub session_id: String,
    pub summary: String,
    pub decisions: Vec<String>,
    pub files: Vec<String>,
    pub project: String,
    pub topics: Vec<String>,
    /// Session date, `YYYY-MM-DD`.
    pub date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySearchResponse {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub result_count: usize,
    pub results: Vec<MemoryHit>,
}

// ============ Entry points ============

/// Single hybrid search with optional rewrite and autocut.
///
/// The rewrite here is the deterministic lexicon pass only, so a basic
/// search stays reproducible for a given store state. Callers that want the
/// LLM-layered rewrite use [`rewrite::rewrite`] directly.
pub async fn basic_search(
    store: &dyn Store,
    query: &str,
    opts: &BasicSearchOptions,
) -> Result<SearchResponse> {
    let (store_query, original_query, rewrite_metadata) = if opts.rewrite {
        let rewritten = rewrite::rewrite_query(query);
        (
            rewritten.primary.clone(),
            Some(query.to_string()),
            Some(RewriteMetadata::from(rewritten)),
        )
    } else {
        (query.to_string(), None, None)
    };

    let filter = chunk_filter(&opts.project, opts.chunk_types.as_deref());
    let fetch_limit = if opts.autocut {
        (opts.limit * 3).max(AUTOCUT_MIN_FETCH)
    } else {
        opts.limit
    };

    let hits = store
        .hybrid_search(
            collections::CODE_CHUNK,
            &store_query,
            opts.alpha,
            Some(&filter),
            fetch_limit,
            &[],
        )
        .await?;
    let hits = merge_hits(vec![hits]);

    let (hits, autocut_metadata) = if opts.autocut {
        let (kept, meta) = autocut(hits, &AutocutOptions::with_limit(opts.limit));
        (kept, Some(meta))
    } else {
        let mut hits = hits;
        hits.truncate(opts.limit);
        (hits, None)
    };

    let results = shape_code_hits(&hits)?;
    Ok(SearchResponse {
        query: store_query,
        original_query,
        project: opts.project.clone(),
        result_count: results.len(),
        results,
        rewrite_metadata,
        autocut_metadata,
    })
}

/// Reflexion-driven search: strategy sweep, merge, autocut.
pub async fn advanced_search(
    store: &dyn Store,
    query: &str,
    opts: &AdvancedSearchOptions,
) -> Result<AdvancedSearchResponse> {
    let started = Instant::now();
    let filter = chunk_filter(&opts.project, opts.chunk_types.as_deref());
    let fetch_limit = opts.limit * 2;

    let outcome = run_reflexion(
        query,
        &ReflexionOptions {
            threshold: opts.threshold,
            max_attempts: opts.max_attempts,
        },
        |q, alpha| {
            let filter = filter.clone();
            async move {
                store
                    .hybrid_search(
                        collections::CODE_CHUNK,
                        &q,
                        alpha,
                        Some(&filter),
                        fetch_limit,
                        &[],
                    )
                    .await
            }
        },
    )
    .await;

    let (hits, autocut_meta) = autocut(outcome.results, &AutocutOptions::with_limit(opts.limit));
    let results = shape_code_hits(&hits)?;

    Ok(AdvancedSearchResponse {
        query: query.to_string(),
        project: opts.project.clone(),
        result_count: results.len(),
        results,
        metadata: AdvancedMetadata {
            total_attempts: outcome.total_attempts,
            quality_met: outcome.quality_met,
            best_score: outcome.best_score,
            threshold: outcome.threshold,
            best_attempt: outcome.best_attempt,
            attempts: outcome.attempts,
            autocut: autocut_meta,
            elapsed_ms: started.elapsed().as_millis() as u64,
        },
    })
}

/// Find chunks similar to a code snippet via pure-vector search.
pub async fn similarity_search(
    store: &dyn Store,
    code: &str,
    opts: &SimilarityOptions,
) -> Result<SimilarResponse> {
    let filter = Filter::eq("project", opts.project.as_str());
    let hits = store
        .near_text(
            collections::CODE_CHUNK,
            code,
            SIMILARITY_CERTAINTY,
            Some(&filter),
            opts.limit,
        )
        .await?;

    let results = hits
        .iter()
        .map(|hit| {
            let chunk: CodeChunk = parse_properties(&hit.properties)?;
            Ok(SimilarHit {
                name: chunk.name,
                chunk_type: chunk.chunk_type.as_str().to_string(),
                file: format!("{}:{}", chunk.file_path, chunk.line_start),
                similarity: hit.score,
                content: chunk.content,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SimilarResponse {
        project: opts.project.clone(),
        result_count: results.len(),
        results,
    })
}

/// Search type definitions.
pub async fn type_search(
    store: &dyn Store,
    query: &str,
    opts: &TypeSearchOptions,
) -> Result<TypeSearchResponse> {
    let filter = Filter::eq("project", opts.project.as_str());
    let hits = store
        .hybrid_search(
            collections::TYPE_DEFINITION,
            query,
            TYPE_SEARCH_ALPHA,
            Some(&filter),
            opts.limit,
            &[],
        )
        .await?;

    let results = hits
        .iter()
        .map(|hit| {
            let def: TypeDefinition = parse_properties(&hit.properties)?;
            let mut properties = def.properties;
            properties.truncate(TYPE_PROPERTIES_CAP);
            Ok(TypeHit {
                name: def.name,
                kind: def.type_kind.as_str().to_string(),
                file: def.file_path,
                properties,
                extends: def.extends_types,
                from_db: def.from_database,
                content: def.content,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(TypeSearchResponse {
        query: query.to_string(),
        project: opts.project.clone(),
        result_count: results.len(),
        results,
    })
}

/// Search conversation memories.
pub async fn memory_search(
    store: &dyn Store,
    query: &str,
    opts: &MemorySearchOptions,
) -> Result<MemorySearchResponse> {
    let filter = opts
        .project
        .as_deref()
        .map(|p| Filter::contains_any("project", [p]));
    let hits = store
        .hybrid_search(
            collections::CONVERSATION_MEMORY,
            query,
            MEMORY_SEARCH_ALPHA,
            filter.as_ref(),
            opts.limit,
            &[],
        )
        .await?;

    let results = hits
        .iter()
        .map(|hit| {
            let memory: ConversationMemory = parse_properties(&hit.properties)?;
            Ok(MemoryHit {
                session_id: memory.session_id,
                summary: memory.summary,
                decisions: memory.decisions,
                files: memory.files_modified,
                project: memory.project,
                topics: memory.topics,
                date: memory.timestamp.format("%Y-%m-%d").to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(MemorySearchResponse {
        query: query.to_string(),
        project: opts.project.clone(),
        result_count: results.len(),
        results,
    })
}

// ============ Shared shaping ============

fn chunk_filter(project: &str, chunk_types: Option<&[ChunkType]>) -> Filter {
    let mut parts = vec![Filter::eq("project", project)];
    if let Some(types) = chunk_types {
        if !types.is_empty() {
            parts.push(Filter::contains_any(
                "chunkType",
                types.iter().map(|t| t.as_str()),
            ));
        }
    }
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        Filter::and(parts)
    }
}

fn parse_properties<T: DeserializeOwned>(value: &serde_json::Value) -> Result<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| Error::Schema(format!("malformed store document: {e}")))
}

fn shape_code_hits(hits: &[Hit]) -> Result<Vec<SearchHit>> {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let chunk: CodeChunk = parse_properties(&hit.properties)?;
            Ok(SearchHit {
                rank: i + 1,
                name: chunk.name,
                chunk_type: chunk.chunk_type.as_str().to_string(),
                file: format!("{}:{}", chunk.file_path, chunk.line_start),
                signature: chunk.signature,
                js_doc: rewrite::truncate_chars(&chunk.js_doc, JS_DOC_PREVIEW_CHARS),
                score: hit.score,
                content: chunk.content,
            })
        })
        .collect()
}

// ============ CLI entry points ============

/// CLI wrapper: run a basic search and print results to stdout.
pub async fn run_basic_search(
    store: &dyn Store,
    query: &str,
    opts: &BasicSearchOptions,
) -> anyhow::Result<()> {
    let response = basic_search(store, query, opts).await?;

    if let Some(ref meta) = response.rewrite_metadata {
        println!("query: {} (rewritten from \"{}\")", response.query, meta.original);
    }
    if response.results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for hit in &response.results {
        print_search_hit(hit);
    }
    if let Some(ref meta) = response.autocut_metadata {
        println!(
            "autocut: kept {} of {} (gap: {})",
            meta.kept_count,
            meta.original_count,
            if meta.gap_found { "yes" } else { "no" }
        );
    }
    Ok(())
}

/// CLI wrapper: run an advanced search and print results plus attempt log.
pub async fn run_advanced_search(
    store: &dyn Store,
    query: &str,
    opts: &AdvancedSearchOptions,
) -> anyhow::Result<()> {
    let response = advanced_search(store, query, opts).await?;

    if response.results.is_empty() {
        println!("No results.");
    }
    for hit in &response.results {
        print_search_hit(hit);
    }

    let meta = &response.metadata;
    println!(
        "reflexion: {} attempt{}, best score {:.2} (threshold {:.2}, quality {})",
        meta.total_attempts,
        if meta.total_attempts == 1 { "" } else { "s" },
        meta.best_score,
        meta.threshold,
        if meta.quality_met { "met" } else { "not met" }
    );
    for attempt in &meta.attempts {
        match &attempt.error {
            Some(e) => println!("  {} (α={}): error: {}", attempt.strategy, attempt.alpha, e),
            None => println!(
                "  {} (α={}): top {:.2}, {} result{}",
                attempt.strategy,
                attempt.alpha,
                attempt.top_score,
                attempt.result_count,
                if attempt.result_count == 1 { "" } else { "s" }
            ),
        }
    }
    println!("elapsed: {} ms", meta.elapsed_ms);
    Ok(())
}

/// CLI wrapper: similarity search.
pub async fn run_similarity_search(
    store: &dyn Store,
    code: &str,
    opts: &SimilarityOptions,
) -> anyhow::Result<()> {
    let response = similarity_search(store, code, opts).await?;
    if response.results.is_empty() {
        println!("No similar code found.");
        return Ok(());
    }
    for (i, hit) in response.results.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} ({})",
            i + 1,
            hit.similarity,
            hit.name,
            hit.chunk_type
        );
        println!("    file: {}", hit.file);
    }
    Ok(())
}

/// CLI wrapper: type search.
pub async fn run_type_search(
    store: &dyn Store,
    query: &str,
    opts: &TypeSearchOptions,
) -> anyhow::Result<()> {
    let response = type_search(store, query, opts).await?;
    if response.results.is_empty() {
        println!("No types found.");
        return Ok(());
    }
    for (i, hit) in response.results.iter().enumerate() {
        println!("{}. {} ({})", i + 1, hit.name, hit.kind);
        println!("    file: {}", hit.file);
        if !hit.properties.is_empty() {
            println!("    properties: {}", hit.properties.join(", "));
        }
        if !hit.extends.is_empty() {
            println!("    extends: {}", hit.extends.join(", "));
        }
    }
    Ok(())
}

/// CLI wrapper: memory search.
pub async fn run_memory_search(
    store: &dyn Store,
    query: &str,
    opts: &MemorySearchOptions,
) -> anyhow::Result<()> {
    let response = memory_search(store, query, opts).await?;
    if response.results.is_empty() {
        println!("No memories found.");
        return Ok(());
    }
    for (i, hit) in response.results.iter().enumerate() {
        println!("{}. [{}] {} ({})", i + 1, hit.date, hit.session_id, hit.project);
        println!("    {}", hit.summary.replace('\n', " "));
        if !hit.decisions.is_empty() {
            println!("    decisions: {}", hit.decisions.join("; "));
        }
    }
    Ok(())
}

fn print_search_hit(hit: &SearchHit) {
    println!("{}. [{:.2}] {} ({})", hit.rank, hit.score, hit.name, hit.chunk_type);
    println!("    file: {}", hit.file);
    if !hit.signature.is_empty() {
        println!("    {}", hit.signature);
    }
    if !hit.js_doc.is_empty() {
        println!("    {}", hit.js_doc.replace('\n', " "));
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    fn chunk_value(
        name: &str,
        chunk_type: &str,
        file: &str,
        line: i64,
        content: &str,
    ) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "chunkType": chunk_type,
            "filePath": file,
            "project": "webapp",
            "lineStart": line,
            "lineEnd": line + 10,
            "lineCount": 11,
            "signature": format!("function {name}()"),
            "jsDoc": "",
            "content": content,
            "isExported": true,
        })
    }

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert(
                collections::CODE_CHUNK,
                chunk_value(
                    "useAuth",
                    "hook",
                    "src/hooks/useAuth.ts",
                    12,
                    "authentication login session hook",
                ),
            )
            .await
            .unwrap();
        store
            .insert(
                collections::CODE_CHUNK,
                chunk_value(
                    "LoginButton",
                    "component",
                    "src/components/LoginButton.tsx",
                    5,
                    "authentication button component",
                ),
            )
            .await
            .unwrap();
        store
            .insert(
                collections::CODE_CHUNK,
                chunk_value(
                    "fetchOrders",
                    "function",
                    "src/api/orders.ts",
                    40,
                    "load orders from the api",
                ),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_basic_search_shapes_and_ranks() {
        let store = seeded_store().await;
        let opts = BasicSearchOptions::new("webapp");
        let response = basic_search(&store, "authentication hook", &opts)
            .await
            .unwrap();

        assert!(response.result_count >= 1);
        let top = &response.results[0];
        assert_eq!(top.rank, 1);
        assert_eq!(top.name, "useAuth");
        assert_eq!(top.chunk_type, "hook");
        assert_eq!(top.file, "src/hooks/useAuth.ts:12");
        assert!(response.original_query.is_none());

        // Ranked output is sorted, deduped, and within the limit.
        for pair in response.results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!(response.results.len() <= opts.limit);
    }

    #[tokio::test]
    async fn test_basic_search_rewrite_metadata() {
        let store = seeded_store().await;
        let mut opts = BasicSearchOptions::new("webapp");
        opts.rewrite = true;

        let response = basic_search(&store, "auth btn click", &opts)
            .await
            .unwrap();

        let meta = response.rewrite_metadata.expect("rewrite metadata");
        assert!(meta.rewritten.contains("authentication"));
        assert!(meta.rewritten.contains("button"));
        assert!(meta.variants.iter().any(|v| v == "AuthBtnClick"));
        assert_eq!(response.original_query.as_deref(), Some("auth btn click"));
        assert_eq!(response.query, meta.rewritten);
        // The expanded query now matches the login button component.
        assert!(response.results.iter().any(|r| r.name == "LoginButton"));
    }

    #[tokio::test]
    async fn test_basic_search_chunk_type_filter() {
        let store = seeded_store().await;
        let mut opts = BasicSearchOptions::new("webapp");
        opts.chunk_types = Some(vec![ChunkType::Hook]);

        let response = basic_search(&store, "authentication", &opts)
            .await
            .unwrap();
        assert!(response.results.iter().all(|r| r.chunk_type == "hook"));
        assert!(response.results.iter().any(|r| r.name == "useAuth"));
    }

    #[tokio::test]
    async fn test_basic_search_other_project_empty() {
        let store = seeded_store().await;
        let opts = BasicSearchOptions::new("mobile");
        let response = basic_search(&store, "authentication", &opts)
            .await
            .unwrap();
        assert_eq!(response.result_count, 0);
    }

    #[tokio::test]
    async fn test_advanced_search_metadata() {
        let store = seeded_store().await;
        let opts = AdvancedSearchOptions::new("webapp");
        let response = advanced_search(&store, "authentication hook", &opts)
            .await
            .unwrap();

        let meta = &response.metadata;
        assert!(meta.total_attempts >= 1);
        assert!(meta.quality_met);
        assert_eq!(
            meta.best_attempt.as_ref().map(|a| a.strategy),
            Some("balanced-semantic")
        );
        assert!((meta.threshold - 0.5).abs() < f64::EPSILON);
        assert!(response.results.len() <= opts.limit);

        // No (file, name) duplicates across merged attempts.
        let mut keys: Vec<(&str, &str)> = response
            .results
            .iter()
            .map(|r| (r.file.as_str(), r.name.as_str()))
            .collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), response.results.len());
    }

    #[tokio::test]
    async fn test_type_search_shape() {
        let store = InMemoryStore::new();
        store
            .insert(
                collections::TYPE_DEFINITION,
                serde_json::json!({
                    "name": "UserProfile",
                    "typeKind": "interface",
                    "filePath": "src/types/user.ts",
                    "project": "webapp",
                    "properties": ["id", "email", "displayName"],
                    "extendsTypes": ["BaseEntity"],
                    "fromDatabase": true,
                    "content": "interface UserProfile extends BaseEntity { id: string }",
                    "isExported": true,
                }),
            )
            .await
            .unwrap();

        let response = type_search(
            &store,
            "user profile",
            &TypeSearchOptions::new("webapp"),
        )
        .await
        .unwrap();

        assert_eq!(response.result_count, 1);
        let hit = &response.results[0];
        assert_eq!(hit.name, "UserProfile");
        assert_eq!(hit.kind, "interface");
        assert_eq!(hit.extends, vec!["BaseEntity".to_string()]);
        assert!(hit.from_db);
    }

    #[tokio::test]
    async fn test_memory_search_project_filter() {
        let store = InMemoryStore::new();
        for (project, summary) in [
            ("webapp", "refactored the login flow"),
            ("api", "tuned database indexes for login audit"),
        ] {
            store
                .insert(
                    collections::CONVERSATION_MEMORY,
                    serde_json::json!({
                        "sessionId": format!("s-{project}"),
                        "summary": summary,
                        "project": project,
                        "decisions": ["keep sessions server-side"],
                        "filesModified": ["src/auth.ts"],
                        "topics": ["auth"],
                        "timestamp": "2026-06-01T10:00:00Z",
                    }),
                )
                .await
                .unwrap();
        }

        let response = memory_search(
            &store,
            "login",
            &MemorySearchOptions {
                project: Some("webapp".to_string()),
                limit: 5,
            },
        )
        .await
        .unwrap();

        assert_eq!(response.result_count, 1);
        assert_eq!(response.results[0].session_id, "s-webapp");
        assert_eq!(response.results[0].date, "2026-06-01");
    }

    #[tokio::test]
    async fn test_similarity_search_passes_certainty() {
        let store = seeded_store().await;
        let response = similarity_search(
            &store,
            "authentication login session hook",
            &SimilarityOptions::new("webapp"),
        )
        .await
        .unwrap();

        assert!(response.result_count >= 1);
        assert_eq!(response.results[0].name, "useAuth");
        assert!(response.results[0].similarity >= 0.7);
    }

    #[test]
    fn test_chunk_filter_composition() {
        let plain = chunk_filter("webapp", None);
        assert_eq!(plain, Filter::eq("project", "webapp"));

        let with_types = chunk_filter("webapp", Some(&[ChunkType::Hook, ChunkType::Component]));
        match with_types {
            Filter::And(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[0], Filter::eq("project", "webapp"));
            }
            other => panic!("expected And filter, got {other:?}"),
        }
    }
}
