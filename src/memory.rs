//! Conversation memory: the save path and the offline compactor.
//!
//! Agents save one [`ConversationMemory`] per session; reads go through the
//! search façade. Left alone, memories accumulate forever, so the compactor
//! periodically folds aged per-session records into one summary record per
//! project:
//!
//! 1. Fetch up to 1000 memories older than the cutoff.
//! 2. Group by project (`"general"` fallback).
//! 3. For each group of at least `min_group_size`: collect the preserved
//!    information (decisions, files, topics, cost/token sums), summarise via
//!    the LLM (deterministic fallback on failure), insert the compacted
//!    record, then delete the sources in batches.
//!
//! Compaction is **best-effort, not atomic**: the insert lands before the
//! deletes, so a failed delete leaves both the compacted record and some
//! sources behind. That is acceptable — memories are idempotent for search —
//! and every such failure is counted in the report. `dry_run` performs no
//! writes while reporting the work that would have happened.
//!
//! The loop awaits between projects, so cancelling the caller's future stops
//! compaction at a project boundary, never mid-delete-batch.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::llm::{ChatRequest, LlmClient};
use crate::models::ConversationMemory;
use crate::store::{collections, Filter, Store};

const FETCH_CAP: usize = 1000;
const DELETE_BATCH: usize = 100;
const FILES_CAP: usize = 100;
const FALLBACK_SESSION_BULLETS: usize = 10;
const FALLBACK_FILES_SHOWN: usize = 30;
const SUMMARY_TEMPERATURE: f32 = 0.3;
const SUMMARY_MAX_TOKENS: u32 = 2048;

const SUMMARY_SYSTEM_PROMPT: &str = "You compact coding-agent session memories. \
Produce a concise but comprehensive technical summary of the sessions below. \
Preserve every decision and every file reference. Group related work \
thematically. Reply with the summary only.";

#[derive(Debug, Clone, Copy)]
pub struct CompactionOptions {
    pub older_than_days: i64,
    pub min_group_size: usize,
    pub dry_run: bool,
}

impl Default for CompactionOptions {
    fn default() -> Self {
        Self {
            older_than_days: 30,
            min_group_size: 5,
            dry_run: false,
        }
    }
}

/// Per-project outcome inside a [`CompactionReport`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    pub memories_found: usize,
    pub compacted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// What a compaction run did (or, under `dry_run`, would have done).
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionReport {
    pub memories_fetched: usize,
    pub projects_processed: usize,
    pub groups_compacted: usize,
    pub memories_deleted: usize,
    pub memories_created: usize,
    pub errors: Vec<String>,
    pub project_details: BTreeMap<String, ProjectDetail>,
}

/// Save a new session memory. The timestamp is stamped here; everything
/// else is the caller's.
pub async fn save_memory(store: &dyn Store, mut memory: ConversationMemory) -> Result<String> {
    memory.timestamp = Utc::now();
    if memory.project.trim().is_empty() {
        memory.project = "general".to_string();
    }
    let properties = serde_json::to_value(&memory)
        .map_err(|e| Error::Schema(format!("unserializable memory: {e}")))?;
    store
        .insert(collections::CONVERSATION_MEMORY, properties)
        .await
}

/// Run one compaction pass over aged memories.
pub async fn run_compaction(
    store: &dyn Store,
    llm: Option<&LlmClient>,
    summarise_model: &str,
    opts: &CompactionOptions,
) -> Result<CompactionReport> {
    let mut report = CompactionReport::default();

    let cutoff = Utc::now() - Duration::days(opts.older_than_days);
    // Same Z-suffixed RFC 3339 form the memories are stored with, so the
    // store's less-than comparison stays purely chronological.
    let filter = Filter::lt(
        "timestamp",
        cutoff.to_rfc3339_opts(SecondsFormat::Micros, true),
    );
    let objects = store
        .filter_fetch(collections::CONVERSATION_MEMORY, &filter, FETCH_CAP, &[])
        .await?;
    report.memories_fetched = objects.len();

    // Group by project, insertion order within each group preserved.
    let mut groups: BTreeMap<String, Vec<(String, ConversationMemory)>> = BTreeMap::new();
    for object in objects {
        match serde_json::from_value::<ConversationMemory>(object.properties.clone()) {
            Ok(memory) => {
                let project = if memory.project.trim().is_empty() {
                    "general".to_string()
                } else {
                    memory.project.clone()
                };
                groups.entry(project).or_default().push((object.id, memory));
            }
            Err(e) => {
                report
                    .errors
                    .push(format!("unparseable memory {}: {e}", object.id));
            }
        }
    }

    for (project, mut group) in groups {
        report.projects_processed += 1;
        let found = group.len();

        if found < opts.min_group_size {
            report.project_details.insert(
                project,
                ProjectDetail {
                    memories_found: found,
                    compacted: false,
                    reason: Some(format!(
                        "group of {found} below minimum size {}",
                        opts.min_group_size
                    )),
                },
            );
            continue;
        }

        group.sort_by_key(|(_, m)| m.timestamp);
        let preserved = collect_preserved(&group);
        let start_date = format_date(group[0].1.timestamp);
        let end_date = format_date(group[group.len() - 1].1.timestamp);

        let summary = if opts.dry_run {
            // No LLM traffic on a dry run; the plan is what matters.
            fallback_summary(&project, &group, &preserved)
        } else {
            match summarise(llm, summarise_model, &project, &group, &preserved).await {
                Ok(text) => text,
                Err(e) => {
                    report
                        .errors
                        .push(format!("summarise failed for {project}: {e}"));
                    fallback_summary(&project, &group, &preserved)
                }
            }
        };

        let mut files = preserved.files.clone();
        files.truncate(FILES_CAP);
        let compacted = ConversationMemory {
            session_id: format!("compacted-{project}-{start_date}-{end_date}"),
            summary,
            decisions: preserved.decisions.clone(),
            files_modified: files,
            project: project.clone(),
            topics: preserved.topics.clone(),
            timestamp: Utc::now(),
            agent_type: "memory-compaction".to_string(),
            model: summarise_model.to_string(),
            task_type: "compaction".to_string(),
            cost: preserved.cost,
            input_tokens: preserved.input_tokens,
            output_tokens: preserved.output_tokens,
            parent_session_id: None,
        };

        if opts.dry_run {
            report.memories_created += 1;
            report.memories_deleted += found;
            report.groups_compacted += 1;
            report.project_details.insert(
                project,
                ProjectDetail {
                    memories_found: found,
                    compacted: true,
                    reason: Some("dry run".to_string()),
                },
            );
            continue;
        }

        let properties = match serde_json::to_value(&compacted) {
            Ok(v) => v,
            Err(e) => {
                report
                    .errors
                    .push(format!("unserializable compacted memory for {project}: {e}"));
                continue;
            }
        };
        // Insert first: losing a delete leaves duplicates, losing an insert
        // would lose history.
        match store
            .insert(collections::CONVERSATION_MEMORY, properties)
            .await
        {
            Ok(_) => report.memories_created += 1,
            Err(e) => {
                report
                    .errors
                    .push(format!("insert failed for {project}: {e}"));
                report.project_details.insert(
                    project,
                    ProjectDetail {
                        memories_found: found,
                        compacted: false,
                        reason: Some("compacted insert failed; sources kept".to_string()),
                    },
                );
                continue;
            }
        }

        let mut deleted = 0usize;
        for batch in group.chunks(DELETE_BATCH) {
            for (id, _) in batch {
                match store
                    .delete_by_id(collections::CONVERSATION_MEMORY, id)
                    .await
                {
                    Ok(()) => deleted += 1,
                    Err(e) => {
                        tracing::warn!(project = %project, id = %id, error = %e, "memory delete failed");
                        report.errors.push(format!("delete {id} failed: {e}"));
                    }
                }
            }
        }
        report.memories_deleted += deleted;
        report.groups_compacted += 1;
        report.project_details.insert(
            project,
            ProjectDetail {
                memories_found: found,
                compacted: true,
                reason: None,
            },
        );
    }

    Ok(report)
}

// ============ Preserved information ============

struct Preserved {
    decisions: Vec<String>,
    files: Vec<String>,
    topics: Vec<String>,
    models: Vec<String>,
    agent_types: Vec<String>,
    task_types: Vec<String>,
    cost: f64,
    input_tokens: i64,
    output_tokens: i64,
}

/// Union the information that must survive compaction verbatim. All unions
/// dedupe while preserving first-seen order.
fn collect_preserved(group: &[(String, ConversationMemory)]) -> Preserved {
    let mut preserved = Preserved {
        decisions: Vec::new(),
        files: Vec::new(),
        topics: Vec::new(),
        models: Vec::new(),
        agent_types: Vec::new(),
        task_types: Vec::new(),
        cost: 0.0,
        input_tokens: 0,
        output_tokens: 0,
    };

    let mut push_unique = |list: &mut Vec<String>, value: &str| {
        if !value.is_empty() && !list.iter().any(|v| v == value) {
            list.push(value.to_string());
        }
    };

    for (_, memory) in group {
        for d in &memory.decisions {
            push_unique(&mut preserved.decisions, d);
        }
        for f in &memory.files_modified {
            push_unique(&mut preserved.files, f);
        }
        for t in &memory.topics {
            push_unique(&mut preserved.topics, t);
        }
        push_unique(&mut preserved.models, &memory.model);
        push_unique(&mut preserved.agent_types, &memory.agent_type);
        push_unique(&mut preserved.task_types, &memory.task_type);
        preserved.cost += memory.cost;
        preserved.input_tokens += memory.input_tokens;
        preserved.output_tokens += memory.output_tokens;
    }

    preserved
}

// ============ Summaries ============

async fn summarise(
    llm: Option<&LlmClient>,
    model: &str,
    project: &str,
    group: &[(String, ConversationMemory)],
    preserved: &Preserved,
) -> Result<String> {
    let Some(client) = llm else {
        return Err(Error::Llm("no llm configured".to_string()));
    };

    let mut user = format!("Project: {project}\n\n");
    for (i, (_, memory)) in group.iter().enumerate() {
        user.push_str(&format!(
            "--- Session {} ({}) ---\n{}\n",
            i + 1,
            format_date(memory.timestamp),
            memory.summary
        ));
        if !memory.decisions.is_empty() {
            user.push_str(&format!("Decisions: {}\n", memory.decisions.join("; ")));
        }
        if !memory.files_modified.is_empty() {
            user.push_str(&format!("Files: {}\n", memory.files_modified.join(", ")));
        }
        user.push('\n');
    }
    user.push_str("Information that must be preserved verbatim:\n");
    user.push_str(&format!("Decisions: {}\n", preserved.decisions.join("; ")));
    user.push_str(&format!("Files: {}\n", preserved.files.join(", ")));
    user.push_str(&format!("Topics: {}\n", preserved.topics.join(", ")));
    user.push_str(&format!(
        "Sessions ran under agents [{}] with models [{}] on tasks [{}].\n",
        preserved.agent_types.join(", "),
        preserved.models.join(", "),
        preserved.task_types.join(", ")
    ));

    client
        .chat(ChatRequest {
            model,
            system: SUMMARY_SYSTEM_PROMPT,
            user: &user,
            temperature: SUMMARY_TEMPERATURE,
            max_tokens: SUMMARY_MAX_TOKENS,
        })
        .await
}

/// Deterministic summary used when no LLM is configured or the call fails.
fn fallback_summary(
    project: &str,
    group: &[(String, ConversationMemory)],
    preserved: &Preserved,
) -> String {
    let start = format_date(group[0].1.timestamp);
    let end = format_date(group[group.len() - 1].1.timestamp);

    let mut out = format!(
        "Compacted memory for project {project}: {} sessions from {start} to {end}.\n\n",
        group.len()
    );

    for (_, memory) in group.iter().take(FALLBACK_SESSION_BULLETS) {
        let line = memory.summary.replace('\n', " ");
        let line = crate::rewrite::truncate_chars(line.trim(), 200);
        out.push_str(&format!("- {}: {}\n", format_date(memory.timestamp), line));
    }
    if group.len() > FALLBACK_SESSION_BULLETS {
        out.push_str(&format!(
            "- … and {} more sessions\n",
            group.len() - FALLBACK_SESSION_BULLETS
        ));
    }

    if !preserved.decisions.is_empty() {
        out.push_str("\nDecisions:\n");
        for decision in &preserved.decisions {
            out.push_str(&format!("- {decision}\n"));
        }
    }

    if !preserved.files.is_empty() {
        out.push_str("\nFiles:\n");
        for file in preserved.files.iter().take(FALLBACK_FILES_SHOWN) {
            out.push_str(&format!("- {file}\n"));
        }
        if preserved.files.len() > FALLBACK_FILES_SHOWN {
            out.push_str(&format!(
                "- … and {} more files\n",
                preserved.files.len() - FALLBACK_FILES_SHOWN
            ));
        }
    }

    out
}

fn format_date(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

// ============ CLI entry points ============

/// CLI wrapper: run compaction and print the report. Returns the report so
/// the binary can choose its exit code.
pub async fn run_compaction_cli(
    store: &dyn Store,
    llm: Option<&LlmClient>,
    summarise_model: &str,
    opts: &CompactionOptions,
) -> anyhow::Result<CompactionReport> {
    let report = run_compaction(store, llm, summarise_model, opts).await?;

    if opts.dry_run {
        println!("Memory compaction (dry run)");
    } else {
        println!("Memory compaction");
    }
    println!("=================");
    println!();
    println!("  fetched:   {}", report.memories_fetched);
    println!("  projects:  {}", report.projects_processed);
    println!("  compacted: {} group(s)", report.groups_compacted);
    println!("  created:   {}", report.memories_created);
    println!("  deleted:   {}", report.memories_deleted);

    if !report.project_details.is_empty() {
        println!();
        for (project, detail) in &report.project_details {
            let status = match (&detail.compacted, &detail.reason) {
                (true, Some(reason)) => format!("compacted ({reason})"),
                (true, None) => "compacted".to_string(),
                (false, Some(reason)) => format!("skipped: {reason}"),
                (false, None) => "skipped".to_string(),
            };
            println!("  {:<24} {:>5} memories  {}", project, detail.memories_found, status);
        }
    }

    if !report.errors.is_empty() {
        println!();
        println!("  errors ({}):", report.errors.len());
        for error in &report.errors {
            println!("    - {error}");
        }
    }

    Ok(report)
}

/// CLI wrapper: print memory statistics without touching anything.
pub async fn run_memory_stats(store: &dyn Store, older_than_days: i64) -> anyhow::Result<()> {
    let total = store
        .aggregate_count(collections::CONVERSATION_MEMORY, None)
        .await?;

    let cutoff = Utc::now() - Duration::days(older_than_days);
    let aged = store
        .aggregate_count(
            collections::CONVERSATION_MEMORY,
            Some(&Filter::lt(
                "timestamp",
                cutoff.to_rfc3339_opts(SecondsFormat::Micros, true),
            )),
        )
        .await?;

    let groups = store
        .aggregate_group_by(collections::CONVERSATION_MEMORY, "project")
        .await?;

    println!("Conversation memories");
    println!("=====================");
    println!();
    println!("  total:               {total}");
    println!("  older than {older_than_days} days:   {aged}");

    if !groups.is_empty() {
        println!();
        println!("  by project:");
        for group in &groups {
            println!("    {:<24} {:>5}", group.value, group.count);
        }
    }

    Ok(())
}
