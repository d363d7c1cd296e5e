//! Storage abstraction over the vector store.
//!
//! The [`Store`] trait defines the narrow interface the retrieval pipeline
//! needs from the document store: hybrid search, pure-vector similarity,
//! filtered fetch, aggregation, insert, and delete-by-id. Implementations
//! must be `Send + Sync` — one adapter instance is shared process-wide and
//! called from concurrent search requests.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`hybrid_search`](Store::hybrid_search) | BM25+vector blend with `alpha ∈ [0, 1]` |
//! | [`near_text`](Store::near_text) | Pure-vector similarity with a certainty floor |
//! | [`filter_fetch`](Store::filter_fetch) | Unscored filtered retrieval |
//! | [`aggregate_count`](Store::aggregate_count) | Count matching objects |
//! | [`aggregate_group_by`](Store::aggregate_group_by) | Group-by counts on a string property |
//! | [`insert`](Store::insert) | Insert one object, returning its id |
//! | [`delete_by_id`](Store::delete_by_id) | Delete one object |
//!
//! Two backends ship with the crate: [`http::HttpStore`] for a real vector
//! store reached over `STORE_URL`, and [`memory::InMemoryStore`] for tests
//! and offline development.
//!
//! Empty result sets are a normal success with zero hits. Unknown
//! collections or fields surface as [`Error::Schema`](crate::error::Error);
//! network failures as [`Error::Transient`](crate::error::Error).

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Store collection names required by the pipeline.
pub mod collections {
    pub const CODE_CHUNK: &str = "CodeChunk";
    pub const DOC_CHUNK: &str = "DocChunk";
    pub const TYPE_DEFINITION: &str = "TypeDefinition";
    pub const FILE_METADATA: &str = "FileMetadata";
    pub const CONVERSATION_MEMORY: &str = "ConversationMemory";
}

/// A scored search hit.
///
/// For hybrid search, `score >= 0` with higher better. For near-text,
/// `score` is a certainty in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    pub properties: Value,
    pub score: f64,
}

/// An unscored object returned by [`Store::filter_fetch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    pub id: String,
    pub properties: Value,
}

/// One bucket of a group-by aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupCount {
    pub value: String,
    pub count: u64,
}

/// A composable property filter.
///
/// Leaves compare one property; `And`/`Or` combine arbitrarily. `Like` is
/// the substring-containment operator used by the context bundler for path
/// prefix matching.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    ContainsAny(String, Vec<Value>),
    Lt(String, Value),
    Like(String, String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn contains_any<I, V>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::ContainsAny(
            field.to_string(),
            values.into_iter().map(Into::into).collect(),
        )
    }

    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Filter::Lt(field.to_string(), value.into())
    }

    pub fn like(field: &str, pattern: &str) -> Self {
        Filter::Like(field.to_string(), pattern.to_string())
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    /// Encode as the operator tree the HTTP store API accepts.
    pub fn to_json(&self) -> Value {
        match self {
            Filter::Eq(field, value) => serde_json::json!({
                "op": "eq", "field": field, "value": value,
            }),
            Filter::ContainsAny(field, values) => serde_json::json!({
                "op": "containsAny", "field": field, "values": values,
            }),
            Filter::Lt(field, value) => serde_json::json!({
                "op": "lt", "field": field, "value": value,
            }),
            Filter::Like(field, pattern) => serde_json::json!({
                "op": "like", "field": field, "pattern": pattern,
            }),
            Filter::And(filters) => serde_json::json!({
                "op": "and",
                "operands": filters.iter().map(Filter::to_json).collect::<Vec<_>>(),
            }),
            Filter::Or(filters) => serde_json::json!({
                "op": "or",
                "operands": filters.iter().map(Filter::to_json).collect::<Vec<_>>(),
            }),
        }
    }
}

/// Abstract vector-store backend.
///
/// All operations are async (via `async-trait`); the in-memory backend
/// returns immediately-ready futures. Implementations must not retry
/// transient failures internally — callers own the retry policy.
#[async_trait]
pub trait Store: Send + Sync {
    /// Hybrid keyword+vector search.
    ///
    /// `alpha` blends keyword (`0`) and vector (`1`) scores and is passed
    /// through to the store verbatim. Results are sorted by descending
    /// score. `fields` projects the returned properties; empty means all.
    async fn hybrid_search(
        &self,
        collection: &str,
        query: &str,
        alpha: f64,
        filter: Option<&Filter>,
        limit: usize,
        fields: &[&str],
    ) -> Result<Vec<Hit>>;

    /// Pure-vector similarity search with a minimum certainty in `[0, 1]`.
    async fn near_text(
        &self,
        collection: &str,
        text: &str,
        certainty: f64,
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<Hit>>;

    /// Unscored filtered retrieval.
    async fn filter_fetch(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
        fields: &[&str],
    ) -> Result<Vec<StoredObject>>;

    /// Count objects matching `filter` (all objects when `None`).
    async fn aggregate_count(&self, collection: &str, filter: Option<&Filter>) -> Result<u64>;

    /// Group-by counts over a string property.
    async fn aggregate_group_by(
        &self,
        collection: &str,
        property: &str,
    ) -> Result<Vec<GroupCount>>;

    /// Insert one object; returns the store-assigned id.
    async fn insert(&self, collection: &str, properties: Value) -> Result<String>;

    /// Delete one object by id.
    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_json_leaf() {
        let filter = Filter::eq("project", "webapp");
        assert_eq!(
            filter.to_json(),
            serde_json::json!({"op": "eq", "field": "project", "value": "webapp"})
        );
    }

    #[test]
    fn test_filter_json_nested() {
        let filter = Filter::and(vec![
            Filter::eq("project", "webapp"),
            Filter::contains_any("chunkType", ["hook", "component"]),
        ]);
        let json = filter.to_json();
        assert_eq!(json["op"], "and");
        assert_eq!(json["operands"][0]["field"], "project");
        assert_eq!(json["operands"][1]["op"], "containsAny");
        assert_eq!(json["operands"][1]["values"][1], "component");
    }

    #[test]
    fn test_filter_json_like_and_lt() {
        let like = Filter::like("filePath", "components/Button");
        assert_eq!(like.to_json()["pattern"], "components/Button");

        let lt = Filter::lt("timestamp", "2026-01-01T00:00:00Z");
        assert_eq!(lt.to_json()["op"], "lt");
    }
}
