use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use pipscope_core::Publisher;
use pipscope_types::{CategorizedMetrics, MetricMap, MetricValue, PipscopeError, PublishConfig};

/// Publisher writing into Notion-style databases over HTTPS.
///
/// Each profile maps to one database. A symbol's row is the page whose
/// title equals the upper-cased symbol; numeric metrics become number
/// properties and text metrics rich-text properties. Page ids are cached per
/// (database, symbol) for the publisher's lifetime.
pub struct NotionPublisher {
    http: reqwest::Client,
    endpoint: String,
    api_version: String,
    token: String,
    databases: BTreeMap<String, String>,
    pages: Mutex<HashMap<(String, String), String>>,
}

impl NotionPublisher {
    /// Build a publisher from the publish settings and an API token.
    ///
    /// # Errors
    /// Returns `Transport` if the HTTP client cannot be constructed.
    pub fn new(cfg: &PublishConfig, token: impl Into<String>) -> Result<Self, PipscopeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| PipscopeError::Transport(format!("http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
            api_version: cfg.api_version.clone(),
            token: token.into(),
            databases: cfg.databases.clone(),
            pages: Mutex::new(HashMap::new()),
        })
    }

    fn database(&self, profile: &str) -> Result<&str, PipscopeError> {
        self.databases
            .get(profile)
            .map(String::as_str)
            .ok_or_else(|| PipscopeError::Config(format!("no database configured for profile '{profile}'")))
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Value, PipscopeError> {
        let resp = req
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.api_version)
            .send()
            .await
            .map_err(|e| PipscopeError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PipscopeError::http(status.as_u16(), body));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| PipscopeError::Data(format!("malformed response: {e}")))
    }

    async fn page_id(&self, database: &str, symbol: &str) -> Result<String, PipscopeError> {
        let key = (database.to_string(), symbol.to_ascii_uppercase());
        if let Some(id) = self.pages.lock().await.get(&key) {
            return Ok(id.clone());
        }
        let body = self
            .send(
                self.http
                    .post(format!("{}/databases/{database}/query", self.endpoint))
                    .json(&title_filter(&key.1)),
            )
            .await?;
        let id = body
            .get("results")
            .and_then(Value::as_array)
            .and_then(|pages| pages.first())
            .and_then(|page| page.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| PipscopeError::not_found(format!("page for {} in {database}", key.1)))?
            .to_string();
        self.pages.lock().await.insert(key, id.clone());
        Ok(id)
    }
}

/// Query body selecting the page whose title equals `symbol`.
#[must_use]
pub fn title_filter(symbol: &str) -> Value {
    json!({
        "filter": {
            "property": "title",
            "title": { "equals": symbol }
        }
    })
}

/// Property payload for one symbol's metrics.
///
/// Non-finite numbers are skipped.
#[must_use]
pub fn property_values(metrics: &CategorizedMetrics) -> Map<String, Value> {
    let mut out = Map::new();
    for (name, value) in metrics.values().flat_map(|m| m.iter()) {
        let prop = match value {
            MetricValue::Number(v) if v.is_finite() => json!({ "number": v }),
            MetricValue::Number(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(metric = %name, "skipping non-finite metric");
                continue;
            }
            MetricValue::Text(s) => json!({ "rich_text": [{ "text": { "content": s } }] }),
        };
        out.insert(name.clone(), prop);
    }
    out
}

/// Schema entries for metrics in `sample` that `existing` lacks.
#[must_use]
pub fn missing_properties(existing: &Map<String, Value>, sample: &MetricMap) -> Map<String, Value> {
    sample
        .iter()
        .filter(|(name, _)| !existing.contains_key(name.as_str()))
        .map(|(name, value)| {
            let kind = if value.is_numeric() {
                json!({ "number": {} })
            } else {
                json!({ "rich_text": {} })
            };
            (name.clone(), kind)
        })
        .collect()
}

#[async_trait]
impl Publisher for NotionPublisher {
    fn name(&self) -> &'static str {
        "notion"
    }

    async fn ensure_properties(
        &self,
        profile: &str,
        sample: &MetricMap,
    ) -> Result<(), PipscopeError> {
        let database = self.database(profile)?;
        let url = format!("{}/databases/{database}", self.endpoint);
        let schema = self.send(self.http.get(&url)).await?;
        let existing = schema
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let missing = missing_properties(&existing, sample);
        if missing.is_empty() {
            return Ok(());
        }
        #[cfg(feature = "tracing")]
        tracing::info!(profile, database, created = missing.len(), "creating missing properties");
        self.send(self.http.patch(&url).json(&json!({ "properties": missing })))
            .await
            .map(|_| ())
    }

    async fn publish(
        &self,
        profile: &str,
        symbol: &str,
        metrics: &CategorizedMetrics,
    ) -> Result<(), PipscopeError> {
        let database = self.database(profile)?;
        let properties = property_values(metrics);
        if properties.is_empty() {
            return Err(PipscopeError::Data(format!(
                "no publishable metrics for {symbol}"
            )));
        }
        let page = self.page_id(database, symbol).await?;
        self.send(
            self.http
                .patch(format!("{}/pages/{page}", self.endpoint))
                .json(&json!({ "properties": properties })),
        )
        .await?;
        #[cfg(feature = "tracing")]
        tracing::debug!(profile, symbol, metrics = properties.len(), "updated page");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn metrics() -> CategorizedMetrics {
        let mut m = CategorizedMetrics::new();
        m.entry("Volatility & Range Metrics".into())
            .or_default()
            .insert("Average Daily Range (pips)".into(), MetricValue::Number(71.25));
        m.entry("Aggregated / Thematic Metrics".into())
            .or_default()
            .insert("Date Range".into(), MetricValue::Text("2024-01-01 to 2024-12-31".into()));
        m
    }

    fn publisher(endpoint: String) -> NotionPublisher {
        let mut cfg = PublishConfig {
            endpoint,
            ..PublishConfig::default()
        };
        cfg.databases.insert("research".into(), "db1".into());
        NotionPublisher::new(&cfg, "secret").unwrap()
    }

    #[test]
    fn payloads_use_number_and_rich_text() {
        let mut m = metrics();
        m.entry("Other".into())
            .or_default()
            .insert("Broken".into(), MetricValue::Number(f64::NAN));
        let props = property_values(&m);
        assert_eq!(props["Average Daily Range (pips)"], json!({ "number": 71.25 }));
        assert_eq!(
            props["Date Range"],
            json!({ "rich_text": [{ "text": { "content": "2024-01-01 to 2024-12-31" } }] })
        );
        assert!(!props.contains_key("Broken"));
    }

    #[test]
    fn only_absent_properties_are_created() {
        let existing: Map<String, Value> =
            [("Date Range".to_string(), json!({ "type": "rich_text" }))]
                .into_iter()
                .collect();
        let mut sample = MetricMap::new();
        sample.insert("Date Range".into(), MetricValue::Text("x".into()));
        sample.insert("PDH Probability".into(), MetricValue::Number(1.0));
        let missing = missing_properties(&existing, &sample);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing["PDH Probability"], json!({ "number": {} }));
    }

    #[tokio::test]
    async fn publish_finds_page_then_patches_it() {
        let server = MockServer::start_async().await;
        let query = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/databases/db1/query")
                    .header("Notion-Version", "2022-06-28")
                    .body_includes("EURUSD");
                then.status(200)
                    .json_body(json!({ "results": [{ "id": "page-1" }] }));
            })
            .await;
        let patch = server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/pages/page-1")
                    .body_includes("Average Daily Range (pips)");
                then.status(200).json_body(json!({ "id": "page-1" }));
            })
            .await;

        let p = publisher(server.base_url());
        p.publish("research", "eurusd", &metrics()).await.unwrap();
        query.assert_async().await;
        patch.assert_async().await;
    }

    #[tokio::test]
    async fn statuses_map_to_error_classes() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/databases/db1/query");
                then.status(503).body("busy");
            })
            .await;
        let p = publisher(server.base_url());
        let err = p.publish("research", "EURUSD", &metrics()).await.unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, PipscopeError::Http { status: 503, .. }));

        let err = p.publish("desk", "EURUSD", &metrics()).await.unwrap_err();
        assert!(matches!(err, PipscopeError::Config(_)));
    }

    #[tokio::test]
    async fn missing_page_is_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/databases/db1/query");
                then.status(200).json_body(json!({ "results": [] }));
            })
            .await;
        let p = publisher(server.base_url());
        let err = p.publish("research", "GBPUSD", &metrics()).await.unwrap_err();
        assert!(matches!(err, PipscopeError::NotFound { .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn ensure_properties_skips_patch_when_schema_is_complete() {
        let server = MockServer::start_async().await;
        let get = server
            .mock_async(|when, then| {
                when.method(GET).path("/databases/db1");
                then.status(200).json_body(json!({
                    "properties": { "PDH Probability": { "type": "number" } }
                }));
            })
            .await;
        let p = publisher(server.base_url());
        let mut sample = MetricMap::new();
        sample.insert("PDH Probability".into(), MetricValue::Number(40.0));
        p.ensure_properties("research", &sample).await.unwrap();
        get.assert_async().await;
    }
}
