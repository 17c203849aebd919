//! Netlify adapter.
//!
//! Two phases: ensure a site named after the deployment, then create a
//! deploy that advertises the SHA-1 of `index.html` instead of its bytes.
//! Netlify answers with an upload URL only when it does not already hold
//! content under that digest, so the upload is conditional.

use serde_json::json;
use sha1::{Digest, Sha1};
use tracing::{debug, info};

use super::{document, read_reply, string_field, DeploymentResult, Provider, ProviderAdapter};
use crate::error::{PublishError, Result};

const INDEX_PATH: &str = "index.html";

pub struct NetlifyAdapter {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

/// Hex SHA-1 of a document, as Netlify's file manifest expects.
pub fn content_digest(document: &str) -> String {
    hex::encode(Sha1::digest(document.as_bytes()))
}

impl NetlifyAdapter {
    pub fn new(client: reqwest::Client, api_base: &str, token: Option<String>) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Create the site. Netlify does not dedupe by name here: a name that is
    /// already taken comes back as an error, not as the existing site.
    async fn ensure_site(&self, token: &str, name: &str) -> Result<serde_json::Value> {
        let resp = self
            .client
            .post(format!("{}/sites", self.api_base))
            .bearer_auth(token)
            .json(&json!({ "name": name }))
            .send()
            .await?;

        read_reply(
            resp,
            "/message",
            "Failed to create Netlify site",
            "Netlify returned an invalid site response",
        )
        .await
    }

    async fn create_deploy(
        &self,
        token: &str,
        site_id: &str,
        digest: &str,
    ) -> Result<serde_json::Value> {
        let resp = self
            .client
            .post(format!("{}/sites/{}/deploys", self.api_base, site_id))
            .bearer_auth(token)
            .json(&json!({ "files": { "index.html": digest } }))
            .send()
            .await?;

        read_reply(
            resp,
            "/message",
            "Failed to create Netlify deploy",
            "Netlify returned an invalid deploy response",
        )
        .await
    }

    async fn upload(&self, upload_url: &str, index_html: String) -> Result<()> {
        let resp = self
            .client
            .put(format!("{}/{}", upload_url.trim_end_matches('/'), INDEX_PATH))
            .header(reqwest::header::CONTENT_TYPE, "text/html")
            .body(index_html)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(PublishError::Provider(
                "Failed to upload Netlify files".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for NetlifyAdapter {
    fn provider(&self) -> Provider {
        Provider::Netlify
    }

    async fn deploy(&self, name: &str, html: &str, css: &str) -> Result<DeploymentResult> {
        let token = self.token.as_deref().ok_or_else(|| {
            PublishError::Configuration("NETLIFY_TOKEN is not configured".to_string())
        })?;

        let index_html = document::build(html, css);

        let site = self.ensure_site(token, name).await?;
        let site_id = string_field(&site, "id").ok_or_else(|| {
            PublishError::Provider("Netlify site response did not include an id".to_string())
        })?;

        let digest = content_digest(&index_html);
        debug!(%name, %site_id, %digest, "creating Netlify deploy");
        let deploy = self.create_deploy(token, &site_id, &digest).await?;

        match string_field(&deploy, "upload_url").or_else(|| string_field(&deploy, "uploadUrl")) {
            Some(upload_url) => {
                debug!(%name, %site_id, "uploading index.html");
                self.upload(&upload_url, index_html).await?;
            }
            None => debug!(%name, %site_id, "content already held upstream, upload skipped"),
        }

        let result = DeploymentResult {
            url: string_field(&deploy, "deploy_ssl_url").or_else(|| string_field(&deploy, "deploy_url")),
            id: string_field(&deploy, "id"),
            site_url: string_field(&site, "ssl_url").or_else(|| string_field(&site, "url")),
        };
        info!(%name, url = ?result.url, id = ?result.id, "Netlify deploy created");
        Ok(result)
    }
}
