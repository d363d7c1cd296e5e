//! In-memory [`Store`] implementation for tests and offline development.
//!
//! Objects live in `Vec`s behind a `std::sync::RwLock`. Filters are
//! evaluated exactly; scoring is a deterministic token-overlap stand-in for
//! the real store's BM25+vector blend: the score of a document is the
//! fraction of query tokens present anywhere in its string properties.
//! `alpha` is accepted and ignored — there is only one scoring signal here.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};

use super::{Filter, GroupCount, Hit, Store, StoredObject};

#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Vec<StoredObject>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching(&self, collection: &str, filter: Option<&Filter>) -> Vec<StoredObject> {
        let collections = self.collections.read().unwrap();
        collections
            .get(collection)
            .map(|objects| {
                objects
                    .iter()
                    .filter(|o| filter.map_or(true, |f| matches_filter(&o.properties, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Lowercased alphanumeric tokens of a string.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Collect tokens from every string value reachable in `value`.
fn collect_tokens(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.extend(tokenize(s)),
        Value::Array(items) => {
            for item in items {
                collect_tokens(item, out);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_tokens(item, out);
            }
        }
        _ => {}
    }
}

/// Fraction of query tokens present in the document's token set.
fn overlap_score(query: &str, properties: &Value) -> f64 {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return 0.0;
    }
    let mut doc_tokens = Vec::new();
    collect_tokens(properties, &mut doc_tokens);

    let matched = query_tokens
        .iter()
        .filter(|t| doc_tokens.contains(t))
        .count();
    matched as f64 / query_tokens.len() as f64
}

fn matches_filter(properties: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(field, expected) => properties.get(field) == Some(expected),
        Filter::ContainsAny(field, values) => match properties.get(field) {
            Some(Value::Array(items)) => values.iter().any(|v| items.contains(v)),
            Some(prop) => values.iter().any(|v| v == prop),
            None => false,
        },
        Filter::Lt(field, bound) => match (properties.get(field), bound) {
            (Some(Value::Number(a)), Value::Number(b)) => {
                a.as_f64().unwrap_or(f64::MAX) < b.as_f64().unwrap_or(f64::MIN)
            }
            (Some(Value::String(a)), Value::String(b)) => a < b,
            _ => false,
        },
        Filter::Like(field, pattern) => match properties.get(field) {
            Some(Value::String(s)) => like_match(s, pattern),
            _ => false,
        },
        Filter::And(filters) => filters.iter().all(|f| matches_filter(properties, f)),
        Filter::Or(filters) => filters.iter().any(|f| matches_filter(properties, f)),
    }
}

/// Substring containment with `*` wildcards: each non-wildcard segment must
/// appear in order.
fn like_match(value: &str, pattern: &str) -> bool {
    let mut rest = value;
    for segment in pattern.split('*').filter(|s| !s.is_empty()) {
        match rest.find(segment) {
            Some(pos) => rest = &rest[pos + segment.len()..],
            None => return false,
        }
    }
    true
}

fn project_fields(properties: &Value, fields: &[&str]) -> Value {
    if fields.is_empty() {
        return properties.clone();
    }
    match properties {
        Value::Object(map) => {
            let mut projected = serde_json::Map::new();
            for field in fields {
                if let Some(v) = map.get(*field) {
                    projected.insert((*field).to_string(), v.clone());
                }
            }
            Value::Object(projected)
        }
        other => other.clone(),
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn hybrid_search(
        &self,
        collection: &str,
        query: &str,
        _alpha: f64,
        filter: Option<&Filter>,
        limit: usize,
        fields: &[&str],
    ) -> Result<Vec<Hit>> {
        let mut hits: Vec<Hit> = self
            .matching(collection, filter)
            .into_iter()
            .filter_map(|o| {
                let score = overlap_score(query, &o.properties);
                (score > 0.0).then(|| Hit {
                    properties: project_fields(&o.properties, fields),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn near_text(
        &self,
        collection: &str,
        text: &str,
        certainty: f64,
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<Hit>> {
        let mut hits: Vec<Hit> = self
            .matching(collection, filter)
            .into_iter()
            .filter_map(|o| {
                let score = overlap_score(text, &o.properties);
                (score >= certainty).then(|| Hit {
                    properties: o.properties,
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn filter_fetch(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
        fields: &[&str],
    ) -> Result<Vec<StoredObject>> {
        let mut objects = self.matching(collection, Some(filter));
        objects.truncate(limit);
        for object in &mut objects {
            object.properties = project_fields(&object.properties, fields);
        }
        Ok(objects)
    }

    async fn aggregate_count(&self, collection: &str, filter: Option<&Filter>) -> Result<u64> {
        Ok(self.matching(collection, filter).len() as u64)
    }

    async fn aggregate_group_by(
        &self,
        collection: &str,
        property: &str,
    ) -> Result<Vec<GroupCount>> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for object in self.matching(collection, None) {
            if let Some(Value::String(value)) = object.properties.get(property) {
                *counts.entry(value.clone()).or_insert(0) += 1;
            }
        }

        let mut groups: Vec<GroupCount> = counts
            .into_iter()
            .map(|(value, count)| GroupCount { value, count })
            .collect();
        groups.sort_by(|a, b| b.count.cmp(&a.count).then(a.value.cmp(&b.value)));
        Ok(groups)
    }

    async fn insert(&self, collection: &str, properties: Value) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut collections = self.collections.write().unwrap();
        collections
            .entry(collection.to_string())
            .or_default()
            .push(StoredObject {
                id: id.clone(),
                properties,
            });
        Ok(id)
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        let objects = collections
            .get_mut(collection)
            .ok_or_else(|| Error::NotFound(format!("collection {collection}")))?;

        let before = objects.len();
        objects.retain(|o| o.id != id);
        if objects.len() == before {
            return Err(Error::NotFound(format!("object {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::collections::CODE_CHUNK;

    fn chunk(name: &str, project: &str, content: &str) -> Value {
        serde_json::json!({
            "name": name,
            "project": project,
            "filePath": format!("src/{name}.ts"),
            "content": content,
        })
    }

    #[tokio::test]
    async fn test_insert_fetch_delete_roundtrip() {
        let store = InMemoryStore::new();
        let id = store
            .insert(CODE_CHUNK, chunk("useAuth", "webapp", "login"))
            .await
            .unwrap();

        let fetched = store
            .filter_fetch(CODE_CHUNK, &Filter::eq("project", "webapp"), 10, &[])
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, id);

        store.delete_by_id(CODE_CHUNK, &id).await.unwrap();
        assert!(matches!(
            store.delete_by_id(CODE_CHUNK, &id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_hybrid_search_ranks_by_overlap() {
        let store = InMemoryStore::new();
        store
            .insert(CODE_CHUNK, chunk("useAuth", "webapp", "authentication login hook"))
            .await
            .unwrap();
        store
            .insert(CODE_CHUNK, chunk("fetchData", "webapp", "load remote data"))
            .await
            .unwrap();

        let hits = store
            .hybrid_search(CODE_CHUNK, "authentication hook", 0.5, None, 10, &[])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].properties["name"], "useAuth");
        assert!((hits[0].score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_filter_contains_any_on_string_and_array() {
        let store = InMemoryStore::new();
        store
            .insert(
                CODE_CHUNK,
                serde_json::json!({"name": "a", "chunkType": "hook", "topics": ["auth", "ui"]}),
            )
            .await
            .unwrap();

        let by_string = store
            .aggregate_count(
                CODE_CHUNK,
                Some(&Filter::contains_any("chunkType", ["hook", "class"])),
            )
            .await
            .unwrap();
        assert_eq!(by_string, 1);

        let by_array = store
            .aggregate_count(CODE_CHUNK, Some(&Filter::contains_any("topics", ["ui"])))
            .await
            .unwrap();
        assert_eq!(by_array, 1);

        let no_match = store
            .aggregate_count(
                CODE_CHUNK,
                Some(&Filter::contains_any("chunkType", ["migration"])),
            )
            .await
            .unwrap();
        assert_eq!(no_match, 0);
    }

    #[tokio::test]
    async fn test_filter_lt_on_timestamps() {
        let store = InMemoryStore::new();
        store
            .insert(
                "ConversationMemory",
                serde_json::json!({"sessionId": "old", "timestamp": "2025-01-01T00:00:00Z"}),
            )
            .await
            .unwrap();
        store
            .insert(
                "ConversationMemory",
                serde_json::json!({"sessionId": "new", "timestamp": "2026-07-01T00:00:00Z"}),
            )
            .await
            .unwrap();

        let old = store
            .filter_fetch(
                "ConversationMemory",
                &Filter::lt("timestamp", "2026-01-01T00:00:00Z"),
                10,
                &[],
            )
            .await
            .unwrap();
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].properties["sessionId"], "old");
    }

    #[tokio::test]
    async fn test_like_match_path_prefix() {
        assert!(like_match("src/components/Button.tsx", "components/Button"));
        assert!(like_match("src/components/Button.tsx", "*components*"));
        assert!(!like_match("src/hooks/useAuth.ts", "components/Button"));

        let store = InMemoryStore::new();
        store
            .insert(CODE_CHUNK, chunk("Button", "webapp", "render"))
            .await
            .unwrap();
        let hits = store
            .filter_fetch(CODE_CHUNK, &Filter::like("filePath", "src/Button"), 10, &[])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_group_by_counts() {
        let store = InMemoryStore::new();
        for project in ["webapp", "webapp", "api"] {
            store
                .insert(CODE_CHUNK, chunk("x", project, ""))
                .await
                .unwrap();
        }

        let groups = store.aggregate_group_by(CODE_CHUNK, "project").await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].value, "webapp");
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[1].value, "api");
    }

    #[tokio::test]
    async fn test_fields_projection() {
        let store = InMemoryStore::new();
        store
            .insert(CODE_CHUNK, chunk("useAuth", "webapp", "auth"))
            .await
            .unwrap();

        let fetched = store
            .filter_fetch(
                CODE_CHUNK,
                &Filter::eq("project", "webapp"),
                10,
                &["name", "filePath"],
            )
            .await
            .unwrap();
        let props = fetched[0].properties.as_object().unwrap();
        assert_eq!(props.len(), 2);
        assert!(props.contains_key("name"));
        assert!(!props.contains_key("content"));
    }
}
