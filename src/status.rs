//! Index status overview.
//!
//! Counts every collection the service reads plus a per-project breakdown
//! of code chunks. This is the one tool that must never fail: when the
//! store is unreachable the payload carries `status = "error"` and the
//! message instead of propagating.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::store::{collections, Store};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub total_chunks: BTreeMap<String, u64>,
    pub by_project: BTreeMap<String, u64>,
}

/// Collect index counts. Infallible by contract.
pub async fn collect_status(store: &dyn Store) -> StatusReport {
    let mut total_chunks = BTreeMap::new();

    for collection in [
        collections::CODE_CHUNK,
        collections::DOC_CHUNK,
        collections::TYPE_DEFINITION,
        collections::FILE_METADATA,
    ] {
        match store.aggregate_count(collection, None).await {
            Ok(count) => {
                total_chunks.insert(collection.to_string(), count);
            }
            Err(e) => {
                return StatusReport {
                    status: "error".to_string(),
                    error: Some(e.to_string()),
                    total_chunks: BTreeMap::new(),
                    by_project: BTreeMap::new(),
                };
            }
        }
    }

    let by_project = match store
        .aggregate_group_by(collections::CODE_CHUNK, "project")
        .await
    {
        Ok(groups) => groups.into_iter().map(|g| (g.value, g.count)).collect(),
        Err(e) => {
            return StatusReport {
                status: "error".to_string(),
                error: Some(e.to_string()),
                total_chunks,
                by_project: BTreeMap::new(),
            };
        }
    };

    StatusReport {
        status: "ok".to_string(),
        error: None,
        total_chunks,
        by_project,
    }
}

/// CLI wrapper: print the status table.
pub async fn run_status(store: &dyn Store) -> anyhow::Result<()> {
    let report = collect_status(store).await;

    println!("Index status: {}", report.status);
    if let Some(ref error) = report.error {
        println!("  error: {error}");
        return Ok(());
    }

    println!();
    for (collection, count) in &report.total_chunks {
        println!("  {:<22} {:>8}", collection, count);
    }

    if !report.by_project.is_empty() {
        println!();
        println!("  Code chunks by project:");
        for (project, count) in &report.by_project {
            println!("    {:<20} {:>8}", project, count);
        }
    }

    Ok(())
}
