// # HTTP Record Store
//
// This crate provides a RecordStore backed by a JSON web service, in the
// shape of the common cloud record databases: records carry a type, a
// `recordName` identity and a bag of fields.
//
// ## Behavior
//
// - One HTTP request per store call; pagination is driven by the adapter
// - Errors are mapped and propagated, never retried here
// - No caching: every query goes to the service
// - Per-record failures inside a 200 response are surfaced as errors
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - The store refuses to build with an empty token
//
// ## API Reference
//
// - Save one record: POST `{url}/records/modify` (operation `create`)
// - Batch modify: POST `{url}/records/modify` (operations `forceReplace` /
//   `forceDelete`, atomic)
// - Query: POST `{url}/records/query`, paged with `continuationMarker`
// - Account status: GET `{url}/users/current`

use async_trait::async_trait;
use contacts_core::config::StoreConfig;
use contacts_core::traits::{QueryCursor, QueryPage, QueryRequest, RecordStore, RecordStoreFactory};
use contacts_core::{Error, RecordId, RemoteRecord, Result, StoreRegistry};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

/// Name under which this store registers
pub const STORE_NAME: &str = "http";

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Record store talking to a JSON record web service
///
/// # Security
///
/// The Debug implementation does NOT expose the API token.
pub struct HttpRecordStore {
    /// Database base URL, without trailing slash
    base_url: String,

    /// API token sent as a bearer token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRecordStore")
            .field("base_url", &self.base_url)
            .field("api_token", &"<REDACTED>")
            .finish()
    }
}

impl HttpRecordStore {
    /// Create a new HTTP record store
    ///
    /// # Parameters
    ///
    /// - `base_url`: Database URL, e.g. `https://records.example.com/db/private`
    /// - `api_token`: API token with read/write access to the database
    /// - `timeout`: Per-request timeout
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("HTTP store API token cannot be empty"));
        }

        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::config("HTTP store URL cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("contacts-store-http/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            api_token,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// POST a JSON body and return the decoded records response
    async fn post(&self, path: &str, body: &Value, action: &str) -> Result<RecordsResponse> {
        let url = self.endpoint(path);
        tracing::trace!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::http(format!("{} request failed: {}", action, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &error_text, action));
        }

        response
            .json::<RecordsResponse>()
            .await
            .map_err(|e| Error::invalid_response(format!("{} response: {}", action, e)))
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn save(&self, record: RemoteRecord) -> Result<RemoteRecord> {
        tracing::debug!("Saving record {} over HTTP", record.id);

        let response = self
            .post("records/modify", &save_body(&record), "Save")
            .await?;
        let (mut records, _) = response.into_parts()?;

        records
            .pop()
            .ok_or_else(|| Error::invalid_response("Save response carried no record"))
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryPage> {
        let response = self
            .post("records/query", &query_body(request), "Query")
            .await?;
        let (records, cursor) = response.into_parts()?;

        tracing::debug!(
            "Query page: {} record(s), more: {}",
            records.len(),
            cursor.is_some()
        );
        Ok(QueryPage { records, cursor })
    }

    async fn modify(&self, saves: Vec<RemoteRecord>, deletes: Vec<RecordId>) -> Result<()> {
        tracing::debug!(
            "Modifying over HTTP: {} save(s), {} delete(s)",
            saves.len(),
            deletes.len()
        );

        let response = self
            .post("records/modify", &modify_body(&saves, &deletes), "Modify")
            .await?;
        response.into_parts()?;
        Ok(())
    }

    async fn account_available(&self) -> Result<bool> {
        let url = self.endpoint("users/current");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::http(format!("Account check failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }

        match status.as_u16() {
            // Signed out or not permitted to use the database
            401 | 421 => {
                tracing::info!("Record service reports no usable account ({})", status);
                Ok(false)
            }
            _ => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                Err(status_error(status, &error_text, "Account check"))
            }
        }
    }

    fn store_name(&self) -> &'static str {
        STORE_NAME
    }
}

/// Records response shared by the query and modify endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordsResponse {
    #[serde(default)]
    records: Vec<RecordEntry>,
    #[serde(default)]
    continuation_marker: Option<String>,
}

/// One entry of a records response: a record, or why it was refused
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordEntry {
    Failed(RecordFailure),
    Record(RemoteRecord),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordFailure {
    #[serde(default)]
    record_name: Option<String>,
    server_error_code: String,
    #[serde(default)]
    reason: String,
}

impl RecordsResponse {
    /// Split into records and continuation, failing on the first refused record
    fn into_parts(self) -> Result<(Vec<RemoteRecord>, Option<QueryCursor>)> {
        let mut records = Vec::with_capacity(self.records.len());

        for entry in self.records {
            match entry {
                RecordEntry::Record(record) => records.push(record),
                RecordEntry::Failed(failure) => return Err(failure.into_error()),
            }
        }

        let cursor = self
            .continuation_marker
            .filter(|marker| !marker.is_empty())
            .map(QueryCursor::new);

        Ok((records, cursor))
    }
}

impl RecordFailure {
    fn into_error(self) -> Error {
        let subject = self.record_name.unwrap_or_else(|| "<unnamed>".to_string());
        let detail = if self.reason.is_empty() {
            format!("{} ({})", subject, self.server_error_code)
        } else {
            format!("{} ({}): {}", subject, self.server_error_code, self.reason)
        };

        match self.server_error_code.as_str() {
            "NOT_FOUND" => Error::not_found(detail),
            "AUTHENTICATION_FAILED" | "AUTHENTICATION_REQUIRED" | "ACCESS_DENIED" => {
                Error::auth(detail)
            }
            "THROTTLED" | "TRY_AGAIN_LATER" => Error::rate_limited(detail),
            _ => Error::backend(STORE_NAME, detail),
        }
    }
}

fn save_body(record: &RemoteRecord) -> Value {
    json!({
        "operations": [
            { "operationType": "create", "record": record }
        ]
    })
}

fn modify_body(saves: &[RemoteRecord], deletes: &[RecordId]) -> Value {
    let operations: Vec<Value> = saves
        .iter()
        .map(|record| json!({ "operationType": "forceReplace", "record": record }))
        .chain(deletes.iter().map(|id| {
            json!({ "operationType": "forceDelete", "record": { "recordName": id } })
        }))
        .collect();

    json!({ "operations": operations, "atomic": true })
}

fn query_body(request: &QueryRequest) -> Value {
    match request {
        QueryRequest::Start { record_type, limit } => json!({
            "query": { "recordType": record_type },
            "resultsLimit": limit,
        }),
        QueryRequest::Resume { cursor, limit } => json!({
            "continuationMarker": cursor,
            "resultsLimit": limit,
        }),
    }
}

/// Map a non-success HTTP status to an error
fn status_error(status: StatusCode, body: &str, action: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{} rejected: invalid API token or insufficient permissions. Status: {}",
            action, status
        )),
        404 => Error::not_found(format!("{} target not found. Status: {}", action, status)),
        429 => Error::rate_limited(format!(
            "{} rate limited. Please retry later. Status: {}",
            action, status
        )),
        500..=599 => Error::backend(
            STORE_NAME,
            format!("Server error (transient): {} - {}", status, body),
        ),
        _ => Error::backend(STORE_NAME, format!("{} failed: {} - {}", action, status, body)),
    }
}

/// Factory for `StoreConfig::Http`
#[derive(Debug, Default)]
pub struct HttpRecordStoreFactory;

#[async_trait]
impl RecordStoreFactory for HttpRecordStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn RecordStore>> {
        match config {
            StoreConfig::Http {
                url,
                api_token,
                timeout_secs,
            } => Ok(Box::new(HttpRecordStore::new(
                url.clone(),
                api_token.clone(),
                Duration::from_secs(*timeout_secs),
            )?)),
            other => Err(Error::config(format!(
                "HTTP store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}

/// Register the HTTP store with a registry
///
/// # Example
///
/// ```rust
/// use contacts_core::StoreRegistry;
///
/// let registry = StoreRegistry::with_builtin_stores();
/// contacts_store_http::register(&registry).unwrap();
/// assert!(registry.has_store("http"));
/// ```
pub fn register(registry: &StoreRegistry) -> Result<()> {
    registry.register_store(STORE_NAME, Box::new(HttpRecordStoreFactory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contacts_core::record::RECORD_TYPE;

    fn record(id: &str) -> RemoteRecord {
        RemoteRecord::new(RECORD_TYPE, RecordId::from_name(id)).with_field("firstName", "Ada")
    }

    #[test]
    fn test_empty_token_rejected() {
        let result = HttpRecordStore::new("https://records.example.com/db", "", DEFAULT_HTTP_TIMEOUT);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_api_token_not_exposed_in_debug() {
        let store = HttpRecordStore::new(
            "https://records.example.com/db/",
            "secret_token_12345",
            DEFAULT_HTTP_TIMEOUT,
        )
        .unwrap();

        let debug_str = format!("{:?}", store);
        assert!(!debug_str.contains("secret_token"));
        assert!(debug_str.contains("HttpRecordStore"));
        assert_eq!(store.endpoint("users/current"), "https://records.example.com/db/users/current");
    }

    #[test]
    fn test_query_bodies() {
        let start = query_body(&QueryRequest::start(RECORD_TYPE, 50));
        assert_eq!(start["query"]["recordType"], "Contact");
        assert_eq!(start["resultsLimit"], 50);
        assert!(start.get("continuationMarker").is_none());

        let resume = query_body(&QueryRequest::resume(QueryCursor::new("abc"), 50));
        assert_eq!(resume["continuationMarker"], "abc");
    }

    #[test]
    fn test_modify_body_operations() {
        let body = modify_body(&[record("a")], &[RecordId::from_name("b")]);
        let ops = body["operations"].as_array().unwrap();

        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0]["operationType"], "forceReplace");
        assert_eq!(ops[0]["record"]["recordName"], "a");
        assert_eq!(ops[0]["record"]["fields"]["firstName"], "Ada");
        assert_eq!(ops[1]["operationType"], "forceDelete");
        assert_eq!(ops[1]["record"]["recordName"], "b");
        assert_eq!(body["atomic"], true);

        let save = save_body(&record("c"));
        assert_eq!(save["operations"][0]["operationType"], "create");
    }

    #[test]
    fn test_response_with_cursor() {
        let response: RecordsResponse = serde_json::from_value(json!({
            "records": [
                { "recordType": "Contact", "recordName": "a", "fields": { "firstName": "Ada" } },
                { "recordType": "Contact", "recordName": "b", "fields": {} }
            ],
            "continuationMarker": "next-page"
        }))
        .unwrap();

        let (records, cursor) = response.into_parts().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].string_field("firstName"), Some("Ada"));
        assert_eq!(cursor, Some(QueryCursor::new("next-page")));
    }

    #[test]
    fn test_response_without_cursor_is_last() {
        let response: RecordsResponse = serde_json::from_value(json!({ "records": [] })).unwrap();
        let (records, cursor) = response.into_parts().unwrap();
        assert!(records.is_empty());
        assert!(cursor.is_none());
    }

    #[test]
    fn test_refused_record_becomes_error() {
        let response: RecordsResponse = serde_json::from_value(json!({
            "records": [
                { "recordName": "gone", "serverErrorCode": "NOT_FOUND", "reason": "record does not exist" }
            ]
        }))
        .unwrap();

        let err = response.into_parts().unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "", "Query"),
            Error::Authentication(_)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "", "Query"),
            Error::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "", "Query"),
            Error::RateLimited(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "upstream down", "Query"),
            Error::Backend { .. }
        ));
    }

    #[tokio::test]
    async fn test_factory() {
        let config = StoreConfig::Http {
            url: "https://records.example.com/db".to_string(),
            api_token: "token".to_string(),
            timeout_secs: 10,
        };
        let store = HttpRecordStoreFactory.create(&config).await.unwrap();
        assert_eq!(store.store_name(), "http");

        assert!(HttpRecordStoreFactory.create(&StoreConfig::Memory).await.is_err());
    }
}
