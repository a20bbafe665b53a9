use anyhow::{Context, Result};
use serde::Serialize;

/// Demo configuration loaded from environment variables (and `.env`).
///
/// Serialized into the store config, where service factories read it.
#[derive(Debug, Clone, Serialize)]
pub struct DemoConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub api_token: Option<String>,
}

impl DemoConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            base_url: std::env::var("MODSTORE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080/".to_string()),
            timeout_ms: std::env::var("MODSTORE_TIMEOUT_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .context("MODSTORE_TIMEOUT_MS must be a number of milliseconds")?,
            api_token: std::env::var("MODSTORE_API_TOKEN").ok(),
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => {
                    let head: String = v.chars().take(4).collect();
                    format!("{head}...({} chars)", v.chars().count())
                }
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  MODSTORE_BASE_URL: {}", self.base_url);
        tracing::info!("  MODSTORE_TIMEOUT_MS: {}", self.timeout_ms);
        tracing::info!("  MODSTORE_API_TOKEN: {}", preview_opt(&self.api_token));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_into_store_config_shape() {
        let config = DemoConfig {
            base_url: "http://example.test/".into(),
            timeout_ms: 50,
            api_token: None,
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["base_url"], "http://example.test/");
        assert_eq!(value["timeout_ms"], 50);
        assert!(value["api_token"].is_null());
    }
}
