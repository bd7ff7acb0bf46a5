// # Console REST Store
//
// This crate implements the fwsync-core store traits against the console
// backend's REST API (`/api/v1`).
//
// ## Behavior
//
// - One HTTP request per trait call
// - Full error propagation to the managers, which surface it verbatim
// - HTTP timeout configured from `ApiConfig::timeout_secs`
// - Specific errors for HTTP status codes (401/403, 404, 429, others)
// - Responses accepted bare or inside a `{code, data, message}` envelope
// - NO retry logic (a failed call is reported, never repeated)
// - NO caching (the managers replace their lists after every write)
//
// ## Security Requirements
//
// - Cloud secret keys NEVER appear in logs (payload `Debug` redacts them)
// - A blank secret key is omitted from update payloads entirely
//
// ## API Reference
//
// - Rules: `GET/POST /rules/`, `PUT/DELETE /rules/:id`, `POST /rules/:id/execute`
// - Cloud configs: `GET/POST /cloud-configs/`, `PUT/DELETE /cloud-configs/:id`,
//   `POST /cloud-configs/:id/test`
// - Catalog data: `GET /providers`, `GET /regions?provider=...`
// - System: `GET/PUT /system-config/`, `POST /sync-ip/`, `GET /current-ip/`

use async_trait::async_trait;
use fwsync_core::config::ApiConfig;
use fwsync_core::model::{
    CloudConfig, CloudConfigFields, ConnectionTest, ExecutionResult, FirewallRule, RecordId,
    Region, RuleFields, SystemConfig,
};
use fwsync_core::traits::{CloudConfigStore, RuleStore, SystemStore};
use fwsync_core::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// REST implementation of every fwsync-core store trait
///
/// Cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpStore {
    /// Versioned API root, always ending in '/'
    base_url: Url,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl HttpStore {
    /// Create a store from the API configuration
    ///
    /// # Returns
    ///
    /// - `Ok(HttpStore)`: Ready to use
    /// - `Err(Error::Config)`: Invalid base URL or timeout
    /// - `Err(Error::Transport)`: The HTTP client could not be built
    pub fn new(config: &ApiConfig) -> Result<Self> {
        config.validate()?;

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::config(format!("Invalid API base URL {}: {}", config.base_url, e)))?;

        // Build HTTP client with timeout
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, base_url))
    }

    /// Create a store around an existing client
    pub fn with_client(client: reqwest::Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { base_url, client }
    }

    /// API root this store talks to
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::config(format!("Invalid endpoint {}: {}", path, e)))
    }

    /// Send a request and turn non-success statuses into errors
    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = request
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::transport(format!("{}: HTTP request failed: {}", what, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        Err(status_error(status.as_u16(), what, &error_text))
    }

    /// Send a request and decode the (possibly enveloped) JSON body
    async fn fetch<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder, what: &str) -> Result<T> {
        let body = self.fetch_value(request, what).await?;
        serde_json::from_value(unwrap_envelope(body))
            .map_err(|e| Error::transport(format!("{}: failed to parse response: {}", what, e)))
    }

    async fn fetch_value(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Value> {
        let response = self.send(request, what).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::transport(format!("{}: failed to read response: {}", what, e)))?;

        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::transport(format!("{}: failed to parse response: {}", what, e)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!("GET {}", url);
        self.fetch(self.client.get(url), what).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
        what: &str,
    ) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!("POST {}", url);
        let request = match body {
            Some(body) => self.client.post(url).json(body),
            None => self.client.post(url),
        };
        self.fetch(request, what).await
    }

    async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B, what: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!("PUT {}", url);
        self.fetch(self.client.put(url).json(body), what).await
    }

    async fn delete_at(&self, path: &str, what: &str) -> Result<()> {
        let url = self.endpoint(path)?;
        debug!("DELETE {}", url);
        self.send(self.client.delete(url), what).await?;
        Ok(())
    }
}

/// Map a non-success HTTP status to an error
fn status_error(status: u16, what: &str, body: &str) -> Error {
    match status {
        401 | 403 => Error::auth(format!("{}: status {}: {}", what, status, body)),
        404 => Error::not_found(format!("{}: {}", what, body)),
        429 => Error::rate_limited(format!("{}: status {}", what, status)),
        _ => Error::http(status, format!("{}: {}", what, body)),
    }
}

/// Strip a `{code, data, message}` envelope, leaving bare bodies untouched
fn unwrap_envelope(body: Value) -> Value {
    if let Value::Object(map) = &body {
        if map.contains_key("code") {
            if let Some(data) = map.get("data") {
                return data.clone();
            }
        }
    }
    body
}

#[async_trait]
impl RuleStore for HttpStore {
    async fn list(&self) -> Result<Vec<FirewallRule>> {
        self.get("rules/", "list rules").await
    }

    async fn create(&self, fields: &RuleFields) -> Result<FirewallRule> {
        let rule: FirewallRule = self.post("rules/", Some(fields), "create rule").await?;
        info!("Created rule {} (port {})", rule.id, rule.port);
        Ok(rule)
    }

    async fn update(&self, id: RecordId, rule: &FirewallRule) -> Result<FirewallRule> {
        self.put(&format!("rules/{}", id), rule, "update rule").await
    }

    async fn delete(&self, id: RecordId) -> Result<()> {
        self.delete_at(&format!("rules/{}", id), "delete rule").await
    }

    async fn execute(&self, id: RecordId) -> Result<ExecutionResult> {
        self.post::<(), _>(&format!("rules/{}/execute", id), None, "execute rule")
            .await
    }
}

#[async_trait]
impl CloudConfigStore for HttpStore {
    async fn list(&self) -> Result<Vec<CloudConfig>> {
        self.get("cloud-configs/", "list cloud configs").await
    }

    async fn create(&self, fields: &CloudConfigFields) -> Result<CloudConfig> {
        debug!("Creating cloud config: {:?}", fields);
        self.post("cloud-configs/", Some(fields), "create cloud config")
            .await
    }

    async fn update(&self, id: RecordId, fields: &CloudConfigFields) -> Result<CloudConfig> {
        debug!("Updating cloud config {}: {:?}", id, fields);
        self.put(&format!("cloud-configs/{}", id), fields, "update cloud config")
            .await
    }

    async fn delete(&self, id: RecordId) -> Result<()> {
        self.delete_at(&format!("cloud-configs/{}", id), "delete cloud config")
            .await
    }

    async fn test(&self, id: RecordId) -> Result<ConnectionTest> {
        self.post::<(), _>(&format!("cloud-configs/{}/test", id), None, "test cloud config")
            .await
    }

    async fn providers(&self) -> Result<Vec<String>> {
        self.get("providers", "list providers").await
    }

    async fn regions(&self, provider: &str) -> Result<Vec<Region>> {
        let mut url = self.endpoint("regions")?;
        url.query_pairs_mut().append_pair("provider", provider);
        debug!("GET {}", url);
        self.fetch(self.client.get(url), "list regions").await
    }
}

#[async_trait]
impl SystemStore for HttpStore {
    async fn get_config(&self) -> Result<SystemConfig> {
        self.get("system-config/", "get system config").await
    }

    async fn save_config(&self, config: &SystemConfig) -> Result<()> {
        let url = self.endpoint("system-config/")?;
        debug!("PUT {}", url);
        self.send(self.client.put(url).json(config), "save system config")
            .await?;
        Ok(())
    }

    async fn sync_ip(&self) -> Result<String> {
        let url = self.endpoint("sync-ip/")?;
        debug!("POST {}", url);
        let body = self.fetch_value(self.client.post(url), "sync IP").await?;

        Ok(body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("IP sync triggered")
            .to_string())
    }

    async fn current_ip(&self) -> Result<String> {
        let url = self.endpoint("current-ip/")?;
        debug!("GET {}", url);
        let body = unwrap_envelope(self.fetch_value(self.client.get(url), "get current IP").await?);

        body.get("current_ip")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::transport("get current IP: response has no current_ip"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let store = HttpStore::new(&ApiConfig::new("http://127.0.0.1:8080/api/v1")).unwrap();
        assert_eq!(store.base_url().as_str(), "http://127.0.0.1:8080/api/v1/");
        assert_eq!(
            store.endpoint("rules/7/execute").unwrap().as_str(),
            "http://127.0.0.1:8080/api/v1/rules/7/execute"
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(HttpStore::new(&ApiConfig::new("not a url")).is_err());
        assert!(HttpStore::new(&ApiConfig::new("http://localhost").with_timeout_secs(0)).is_err());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(status_error(401, "x", ""), Error::Authentication(_)));
        assert!(matches!(status_error(403, "x", ""), Error::Authentication(_)));
        assert!(matches!(status_error(404, "x", ""), Error::NotFound(_)));
        assert!(matches!(status_error(429, "x", ""), Error::RateLimited(_)));
        assert!(matches!(status_error(502, "x", ""), Error::Http { status: 502, .. }));
        assert!(matches!(status_error(400, "x", "bad port"), Error::Http { status: 400, .. }));
    }

    #[test]
    fn test_envelope_unwrapping() {
        assert_eq!(
            unwrap_envelope(json!({"code": 0, "data": ["Aliyun"], "message": "ok"})),
            json!(["Aliyun"])
        );
        // Bare bodies, including ones that happen to have a data field
        assert_eq!(unwrap_envelope(json!([1, 2])), json!([1, 2]));
        assert_eq!(unwrap_envelope(json!({"data": 1})), json!({"data": 1}));
    }
}
