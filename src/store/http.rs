//! HTTP [`Store`] adapter for the vector store behind `STORE_URL`.
//!
//! Speaks a JSON REST contract with one route per operation:
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | `POST` | `/v1/collections/{c}/search` | Hybrid search |
//! | `POST` | `/v1/collections/{c}/near-text` | Vector similarity |
//! | `POST` | `/v1/collections/{c}/fetch` | Filtered fetch |
//! | `POST` | `/v1/collections/{c}/aggregate` | Count / group-by |
//! | `POST` | `/v1/collections/{c}/objects` | Insert |
//! | `DELETE` | `/v1/collections/{c}/objects/{id}` | Delete |
//!
//! Status mapping: 404 → `NotFound`, other 4xx → `Schema` (malformed filter
//! or unknown collection/field — a bug on our side), 429/5xx and transport
//! failures → `Transient`. The adapter never retries; per the service's
//! backpressure policy a transient failure fails the request fast and rate
//! limiting stays the store's responsibility.
//!
//! One instance wraps a single `reqwest::Client` (connection pool) and is
//! shared across concurrent requests via `Arc`.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::StoreConfig;
use crate::error::{Error, Result};

use super::{Filter, GroupCount, Hit, Store, StoredObject};

pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SearchBody {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct FetchBody {
    objects: Vec<StoredObject>,
}

#[derive(Deserialize)]
struct CountBody {
    count: u64,
}

#[derive(Deserialize)]
struct GroupByBody {
    groups: Vec<GroupCount>,
}

#[derive(Deserialize)]
struct InsertBody {
    id: String,
}

impl HttpStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build store client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self, collection: &str, route: &str) -> String {
        format!("{}/v1/collections/{}/{}", self.base_url, collection, route)
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &Value,
    ) -> Result<T> {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| Error::Transient(format!("invalid store response: {e}")));
        }

        let message = response.text().await.unwrap_or_default();
        Err(map_status(status, &message))
    }
}

fn map_status(status: StatusCode, message: &str) -> Error {
    if status == StatusCode::NOT_FOUND {
        Error::NotFound(format!("store: {message}"))
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Error::Transient(format!("store {status}: {message}"))
    } else {
        Error::Schema(format!("store {status}: {message}"))
    }
}

fn fields_json(fields: &[&str]) -> Option<Value> {
    if fields.is_empty() {
        None
    } else {
        Some(Value::Array(
            fields.iter().map(|f| Value::String((*f).to_string())).collect(),
        ))
    }
}

#[async_trait]
impl Store for HttpStore {
    async fn hybrid_search(
        &self,
        collection: &str,
        query: &str,
        alpha: f64,
        filter: Option<&Filter>,
        limit: usize,
        fields: &[&str],
    ) -> Result<Vec<Hit>> {
        let body = serde_json::json!({
            "query": query,
            "alpha": alpha,
            "limit": limit,
            "filter": filter.map(Filter::to_json),
            "fields": fields_json(fields),
        });
        let parsed: SearchBody = self
            .post_json(&self.collection_url(collection, "search"), &body)
            .await?;
        Ok(parsed.hits)
    }

    async fn near_text(
        &self,
        collection: &str,
        text: &str,
        certainty: f64,
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<Hit>> {
        let body = serde_json::json!({
            "text": text,
            "certainty": certainty,
            "limit": limit,
            "filter": filter.map(Filter::to_json),
        });
        let parsed: SearchBody = self
            .post_json(&self.collection_url(collection, "near-text"), &body)
            .await?;
        Ok(parsed.hits)
    }

    async fn filter_fetch(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
        fields: &[&str],
    ) -> Result<Vec<StoredObject>> {
        let body = serde_json::json!({
            "filter": filter.to_json(),
            "limit": limit,
            "fields": fields_json(fields),
        });
        let parsed: FetchBody = self
            .post_json(&self.collection_url(collection, "fetch"), &body)
            .await?;
        Ok(parsed.objects)
    }

    async fn aggregate_count(&self, collection: &str, filter: Option<&Filter>) -> Result<u64> {
        let body = serde_json::json!({ "filter": filter.map(Filter::to_json) });
        let parsed: CountBody = self
            .post_json(&self.collection_url(collection, "aggregate"), &body)
            .await?;
        Ok(parsed.count)
    }

    async fn aggregate_group_by(
        &self,
        collection: &str,
        property: &str,
    ) -> Result<Vec<GroupCount>> {
        let body = serde_json::json!({ "groupBy": property });
        let parsed: GroupByBody = self
            .post_json(&self.collection_url(collection, "aggregate"), &body)
            .await?;
        Ok(parsed.groups)
    }

    async fn insert(&self, collection: &str, properties: Value) -> Result<String> {
        let body = serde_json::json!({ "properties": properties });
        let parsed: InsertBody = self
            .post_json(&self.collection_url(collection, "objects"), &body)
            .await?;
        Ok(parsed.id)
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<()> {
        let url = format!(
            "{}/v1/collections/{}/objects/{}",
            self.base_url, collection, id
        );
        let response = self.client.delete(&url).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(map_status(status, &message))
    }
}
