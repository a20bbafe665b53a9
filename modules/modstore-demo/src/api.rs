//! Simulated backend used by the demo modules. No network access.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

/// Latency of every simulated request.
const LATENCY: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    timeout: Duration,
    authenticated: bool,
}

impl ApiClient {
    /// Build from the merged store config.
    pub fn from_config(config: &Value) -> Self {
        Self {
            base_url: config["base_url"]
                .as_str()
                .unwrap_or("http://localhost:8080/")
                .to_string(),
            timeout: Duration::from_millis(config["timeout_ms"].as_u64().unwrap_or(2000)),
            authenticated: config["api_token"].is_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch a resource. Unknown paths fail like a 404 would.
    pub async fn get(&self, path: &str) -> Result<Value> {
        let path = path.trim_start_matches('/');
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");

        tokio::time::timeout(self.timeout, self.respond(path))
            .await
            .with_context(|| format!("GET {url} timed out after {:?}", self.timeout))?
    }

    async fn respond(&self, path: &str) -> Result<Value> {
        tokio::time::sleep(LATENCY).await;

        let body = match path {
            "catalog" => json!([
                { "sku": "tea-01", "name": "Sencha", "price_cents": 1200 },
                { "sku": "tea-02", "name": "Genmaicha", "price_cents": 950 },
            ]),
            p if p.starts_with("users/") => json!({
                "name": p.trim_start_matches("users/"),
                "verified": self.authenticated,
            }),
            other => bail!("GET {}{} returned 404", self.base_url, other),
        };

        Ok(json!({ "body": body, "fetched_at": Utc::now().to_rfc3339() }))
    }
}
