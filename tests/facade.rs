//! End-to-end tests of the search façade, context bundler, memory
//! compactor, and status tool over the in-memory store backend.

use chrono::{Duration, Utc};

use code_scout::context::{build_context, ContextOptions};
use code_scout::memory::{run_compaction, save_memory, CompactionOptions};
use code_scout::models::{ChunkType, ConversationMemory};
use code_scout::search::{
    advanced_search, basic_search, memory_search, AdvancedSearchOptions, BasicSearchOptions,
    MemorySearchOptions,
};
use code_scout::status::collect_status;
use code_scout::store::collections;
use code_scout::store::memory::InMemoryStore;
use code_scout::store::Store;

fn chunk(
    name: &str,
    chunk_type: &str,
    file: &str,
    line_start: i64,
    content: &str,
    dependencies: &[&str],
) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "chunkType": chunk_type,
        "filePath": file,
        "project": "webapp",
        "lineStart": line_start,
        "lineEnd": line_start + 14,
        "lineCount": 15,
        "signature": format!("function {name}()"),
        "jsDoc": format!("Handles {name}."),
        "content": content,
        "imports": dependencies,
        "dependencies": dependencies,
        "usedTypes": [],
        "isExported": true,
        "isAsync": false,
        "complexity": 2,
    })
}

async fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store
        .insert(
            collections::CODE_CHUNK,
            chunk(
                "useAuth",
                "hook",
                "src/hooks/useAuth.ts",
                12,
                "authentication hook with login and logout state",
                &[],
            ),
        )
        .await
        .unwrap();
    store
        .insert(
            collections::CODE_CHUNK,
            chunk(
                "formatCurrency",
                "function",
                "src/utils/money.ts",
                3,
                "format a number as currency",
                &[],
            ),
        )
        .await
        .unwrap();
    store
}

// Scenario: a query for "authentication hook" finds the stored hook first,
// with the tool-facing shape intact.
#[tokio::test]
async fn basic_hit_ranks_the_hook_first() {
    let store = seeded_store().await;

    let response = basic_search(
        &store,
        "authentication hook",
        &BasicSearchOptions::new("webapp"),
    )
    .await
    .unwrap();

    assert!(response.result_count >= 1);
    let top = &response.results[0];
    assert_eq!(top.rank, 1);
    assert_eq!(top.name, "useAuth");
    assert_eq!(top.chunk_type, "hook");
    assert_eq!(top.file, "src/hooks/useAuth.ts:12");
    assert!(top.score > 0.0);
}

// Scenario: mutual imports between two files produce a bundle with each
// file exactly once and no re-expansion.
#[tokio::test]
async fn context_cycle_bundles_each_file_once() {
    let store = InMemoryStore::new();
    store
        .insert(
            collections::CODE_CHUNK,
            chunk("pageA", "function", "src/a.ts", 1, "page a", &["./b.ts"]),
        )
        .await
        .unwrap();
    store
        .insert(
            collections::CODE_CHUNK,
            chunk("pageB", "function", "src/b.ts", 1, "page b", &["./a.ts"]),
        )
        .await
        .unwrap();

    let bundle = build_context(&store, "src/a.ts", &ContextOptions::new("webapp"))
        .await
        .unwrap();

    assert_eq!(bundle.main_file.path, "src/a.ts");
    assert_eq!(bundle.related_files.len(), 1);
    assert_eq!(bundle.related_files[0].path, "src/b.ts");
    assert_eq!(bundle.total_lines, 30);
}

#[tokio::test]
async fn advanced_search_reports_reflexion_and_autocut() {
    let store = seeded_store().await;

    let mut opts = AdvancedSearchOptions::new("webapp");
    opts.threshold = 0.99; // no partial match reaches this, forcing the full sweep
    let response = advanced_search(&store, "authentication flux", &opts)
        .await
        .unwrap();

    let meta = &response.metadata;
    assert_eq!(meta.total_attempts, 3);
    assert_eq!(meta.attempts.len(), meta.total_attempts);
    assert!(!meta.quality_met);
    let max_attempt_score = meta
        .attempts
        .iter()
        .map(|a| a.top_score)
        .fold(0.0_f64, f64::max);
    assert!((meta.best_score - max_attempt_score).abs() < 1e-9);
    assert_eq!(meta.autocut.original_count, response.result_count);

    for pair in response.results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn advanced_with_chunk_type_filter_stays_scoped() {
    let store = seeded_store().await;

    let mut opts = AdvancedSearchOptions::new("webapp");
    opts.chunk_types = Some(vec![ChunkType::Hook]);
    let response = advanced_search(&store, "authentication currency", &opts)
        .await
        .unwrap();

    assert!(response.results.iter().all(|r| r.chunk_type == "hook"));
}

#[tokio::test]
async fn saved_memories_are_searchable_then_compacted() {
    let store = InMemoryStore::new();

    // Save recent memories through the runtime write path.
    for i in 0..2 {
        save_memory(
            &store,
            ConversationMemory {
                session_id: format!("recent-{i}"),
                summary: "added payment form validation".to_string(),
                decisions: vec!["validate card numbers client-side".to_string()],
                files_modified: vec!["src/forms/payment.ts".to_string()],
                project: "webapp".to_string(),
                topics: vec!["payments".to_string()],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    let found = memory_search(
        &store,
        "payment validation",
        &MemorySearchOptions {
            project: Some("webapp".to_string()),
            limit: 5,
        },
    )
    .await
    .unwrap();
    assert_eq!(found.result_count, 2);
    assert!(found.results[0]
        .decisions
        .contains(&"validate card numbers client-side".to_string()));

    // Age five more memories past the cutoff and compact them.
    for i in 0..5 {
        let mut aged = ConversationMemory {
            session_id: format!("old-{i}"),
            summary: format!("legacy session {i}"),
            project: "webapp".to_string(),
            ..Default::default()
        };
        aged.timestamp = Utc::now() - Duration::days(90);
        store
            .insert(
                collections::CONVERSATION_MEMORY,
                serde_json::to_value(&aged).unwrap(),
            )
            .await
            .unwrap();
    }

    let report = run_compaction(&store, None, "summary-model", &CompactionOptions::default())
        .await
        .unwrap();

    assert_eq!(report.memories_fetched, 5);
    assert_eq!(report.groups_compacted, 1);
    assert_eq!(report.memories_deleted, 5);
    assert!(report.errors.is_empty());

    // Recent memories survive; the aged five are now one compacted record.
    let total = store
        .aggregate_count(collections::CONVERSATION_MEMORY, None)
        .await
        .unwrap();
    assert_eq!(total, 3);
}

// When reflexion terminates on strategy 1 (identity query), advanced search
// agrees with a basic autocut search at the same blend.
#[tokio::test]
async fn advanced_matches_basic_when_first_strategy_wins() {
    let store = seeded_store().await;

    let advanced = advanced_search(
        &store,
        "authentication hook",
        &AdvancedSearchOptions::new("webapp"),
    )
    .await
    .unwrap();
    let best = advanced.metadata.best_attempt.as_ref().unwrap();
    assert_eq!(best.strategy, "balanced-semantic");
    assert_eq!(best.query, "authentication hook");

    let mut opts = BasicSearchOptions::new("webapp");
    opts.autocut = true;
    opts.alpha = best.alpha;
    let basic = basic_search(&store, "authentication hook", &opts)
        .await
        .unwrap();

    let advanced_names: Vec<&str> = advanced.results.iter().map(|r| r.name.as_str()).collect();
    let basic_names: Vec<&str> = basic.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(advanced_names, basic_names);
}

#[tokio::test]
async fn status_reflects_seeded_collections() {
    let store = seeded_store().await;
    store
        .insert(
            collections::TYPE_DEFINITION,
            serde_json::json!({"name": "AuthState", "project": "webapp"}),
        )
        .await
        .unwrap();

    let report = collect_status(&store).await;
    assert_eq!(report.status, "ok");
    assert_eq!(report.total_chunks["CodeChunk"], 2);
    assert_eq!(report.total_chunks["TypeDefinition"], 1);
    assert_eq!(report.by_project["webapp"], 2);
}
