//! HTTP document store client.
//!
//! Talks to a GROQ-style query endpoint. Every request is sent with
//! `perspective=raw` so the store returns drafts and published documents alike;
//! the store-side perspective is never used to filter.

use super::DocumentStore;
use crate::config::StoreConfig;
use crate::document::RawRecord;
use crate::error::ResolveError;
use crate::identity::DRAFT_PREFIX;
use crate::query::Filter;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

/// The only store perspective this client ever requests.
const STORE_PERSPECTIVE: &str = "raw";

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    params: &'a Map<String, Value>,
}

#[derive(Deserialize)]
struct QueryResponse {
    result: Vec<RawRecord>,
}

/// Compiled query text plus bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub query: String,
    pub params: Map<String, Value>,
}

pub struct HttpDocumentStore {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpDocumentStore {
    pub fn new(config: &StoreConfig) -> Result<Self, ResolveError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ResolveError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: query_endpoint(config),
            token: config.token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn run(&self, compiled: &CompiledQuery) -> Result<Vec<RawRecord>, ResolveError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .query(&[("perspective", STORE_PERSPECTIVE)])
            .json(&QueryRequest {
                query: &compiled.query,
                params: &compiled.params,
            });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResolveError::StoreUnavailable(format!(
                "store returned {}: {}",
                status,
                truncate(&body, 200)
            )));
        }

        let body = response.text().await?;
        let records = decode_response(&body)?;
        debug!(endpoint = %self.endpoint, records = records.len(), "Store query completed");
        Ok(records)
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn query_key_space(&self, filter: &Filter) -> Result<Vec<RawRecord>, ResolveError> {
        filter.validate()?;
        self.run(&compile_key_space(filter)).await
    }

    async fn get_documents(&self, identities: &[String]) -> Result<Vec<RawRecord>, ResolveError> {
        if identities.is_empty() {
            return Ok(Vec::new());
        }
        self.run(&compile_identities(identities)).await
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// `{base}/v{api_version}/data/query/{dataset}`
pub fn query_endpoint(config: &StoreConfig) -> String {
    let base = match &config.base_url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => format!("https://{}.api.sanity.io", config.project_id),
    };
    let version = config.api_version.trim_start_matches('v');
    format!("{}/v{}/data/query/{}", base, version, config.dataset)
}

pub fn decode_response(body: &str) -> Result<Vec<RawRecord>, ResolveError> {
    serde_json::from_str::<QueryResponse>(body)
        .map(|r| r.result)
        .map_err(|e| ResolveError::StoreUnavailable(format!("malformed store response: {}", e)))
}

/// Compile a filter into a boolean expression over one document.
///
/// Field paths are validated identifiers, so they are safe to inline; every
/// value is passed as a parameter.
pub fn compile_filter(filter: &Filter) -> CompiledQuery {
    let mut clauses = Vec::new();
    let mut params = Map::new();

    if let Some(document_type) = &filter.document_type {
        clauses.push("_type == $type".to_string());
        params.insert("type".to_string(), json!(document_type));
    }
    if let Some(keys) = &filter.keys {
        clauses.push("(_id in $keys || _id in $draftKeys)".to_string());
        let published: Vec<String> = keys.iter().map(|k| k.published_identity()).collect();
        let drafts: Vec<String> = keys.iter().map(|k| k.draft_identity()).collect();
        params.insert("keys".to_string(), json!(published));
        params.insert("draftKeys".to_string(), json!(drafts));
    }
    for (i, (path, value)) in filter.fields.iter().enumerate() {
        let name = format!("f{}", i);
        clauses.push(format!("{} == ${}", path, name));
        params.insert(name, value.clone());
    }

    let query = if clauses.is_empty() {
        "true".to_string()
    } else {
        clauses.join(" && ")
    };
    CompiledQuery { query, params }
}

/// Single query returning every record of every key with at least one record
/// matching the filter: the matches themselves, the published sibling of a
/// matching draft, and the draft sibling of a matching published record.
pub fn compile_key_space(filter: &Filter) -> CompiledQuery {
    let CompiledQuery { query: predicate, params } = compile_filter(filter);
    let matched = format!("*[{}]._id", predicate);
    let query = format!(
        "*[_id in {m} || (\"{p}\" + _id) in {m} || \
         (_id in path(\"{p}**\") && string::split(_id, \"{p}\")[1] in {m})]",
        m = matched,
        p = DRAFT_PREFIX,
    );
    CompiledQuery { query, params }
}

pub fn compile_identities(identities: &[String]) -> CompiledQuery {
    let mut params = Map::new();
    params.insert("ids".to_string(), json!(identities));
    CompiledQuery {
        query: "*[_id in $ids]".to_string(),
        params,
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
