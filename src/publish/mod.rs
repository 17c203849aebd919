//! Provider adapters: turn a generic deploy request into a hosting
//! platform's wire calls.

pub mod document;
pub mod netlify;
pub mod vercel;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{Credentials, ProvidersConfig};
use crate::error::{PublishError, Result};

/// Hosting platforms a schedule can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Vercel,
    Netlify,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Vercel => "vercel",
            Provider::Netlify => "netlify",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "vercel" => Ok(Provider::Vercel),
            "netlify" => Ok(Provider::Netlify),
            other => Err(PublishError::Validation(format!(
                "unknown provider '{}'",
                other
            ))),
        }
    }
}

/// Outcome of one provider call. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
}

/// One implementation per hosting platform. Adapters are stateless per call.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Build the document from `html`/`css` and publish it under `name`.
    async fn deploy(&self, name: &str, html: &str, css: &str) -> Result<DeploymentResult>;

    /// Public URL to record on a completed schedule.
    fn result_url(&self, result: &DeploymentResult) -> Option<String> {
        result.url.clone().or_else(|| result.site_url.clone())
    }
}

/// Maps each [`Provider`] to its adapter.
#[derive(Clone, Default)]
pub struct Providers {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl Providers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the real Vercel and Netlify adapters sharing one HTTP client.
    pub fn from_config(cfg: &ProvidersConfig, creds: &Credentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.request_timeout())
            .user_agent(concat!("sitepush/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut providers = Self::new();
        providers.register(Arc::new(vercel::VercelAdapter::new(
            client.clone(),
            &cfg.vercel_api,
            creds.vercel_token.clone(),
        )));
        providers.register(Arc::new(netlify::NetlifyAdapter::new(
            client,
            &cfg.netlify_api,
            creds.netlify_token.clone(),
        )));
        Ok(providers)
    }

    /// Add or replace the adapter for its provider.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    pub fn get(&self, provider: Provider) -> Result<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider).cloned().ok_or_else(|| {
            PublishError::Configuration(format!("no adapter registered for {}", provider))
        })
    }
}

/// Pull a human-readable message out of an upstream JSON error body.
pub(crate) fn upstream_message(body: &serde_json::Value, pointer: &str) -> Option<String> {
    body.pointer(pointer)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Decode a provider reply. A rejected call's body is only mined for its
/// message at `message_at`; an accepted call must carry a JSON object.
pub(crate) async fn read_reply(
    resp: reqwest::Response,
    message_at: &str,
    rejected: &str,
    invalid: &str,
) -> Result<serde_json::Value> {
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        let body: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
        return Err(PublishError::Provider(
            upstream_message(&body, message_at).unwrap_or_else(|| rejected.to_string()),
        ));
    }

    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(body) if body.is_object() => Ok(body),
        _ => Err(PublishError::Provider(invalid.to_string())),
    }
}

/// Read a string field, tolerating numeric IDs.
pub(crate) fn string_field(body: &serde_json::Value, key: &str) -> Option<String> {
    match body.get(key)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
