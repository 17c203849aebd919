//! Vercel adapter: one authenticated request carrying the whole site inline.

use serde_json::json;
use tracing::{debug, info};

use super::{document, read_reply, string_field, DeploymentResult, Provider, ProviderAdapter};
use crate::error::{PublishError, Result};

pub struct VercelAdapter {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl VercelAdapter {
    pub fn new(client: reqwest::Client, api_base: &str, token: Option<String>) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for VercelAdapter {
    fn provider(&self) -> Provider {
        Provider::Vercel
    }

    async fn deploy(&self, name: &str, html: &str, css: &str) -> Result<DeploymentResult> {
        let token = self.token.as_deref().ok_or_else(|| {
            PublishError::Configuration("VERCEL_TOKEN is not configured".to_string())
        })?;

        let index_html = document::build(html, css);
        let body = json!({
            "name": name,
            "files": [{ "file": "index.html", "data": index_html }],
            "projectSettings": { "framework": null },
        });

        debug!(%name, bytes = index_html.len(), "creating Vercel deployment");
        let resp = self
            .client
            .post(format!("{}/v13/deployments", self.api_base))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let payload = read_reply(
            resp,
            "/error/message",
            "Failed to deploy to Vercel",
            "Vercel returned an invalid deployment response",
        )
        .await?;

        let result = DeploymentResult {
            url: string_field(&payload, "url"),
            id: string_field(&payload, "id"),
            site_url: None,
        };
        info!(%name, url = ?result.url, id = ?result.id, "Vercel deployment created");
        Ok(result)
    }

    /// Vercel reports a bare host.
    fn result_url(&self, result: &DeploymentResult) -> Option<String> {
        result.url.as_ref().map(|host| {
            if host.starts_with("http://") || host.starts_with("https://") {
                host.clone()
            } else {
                format!("https://{}", host)
            }
        })
    }
}
