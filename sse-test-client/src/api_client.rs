use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

pub struct ApiClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookAck {
    pub message: String,
    #[serde(rename = "clientCount")]
    pub client_count: usize,
}

impl ApiClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach the relay")?;

        if !response.status().is_success() {
            anyhow::bail!("Health check failed: {}", response.status());
        }

        Ok(())
    }

    pub async fn post_webhook(&self, job_name: &str, project: &str, status: &str) -> Result<WebhookAck> {
        let response = self
            .send_webhook(&json!({
                "status": status,
                "job_name": job_name,
                "project": project,
            }))
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            anyhow::bail!("Failed to post webhook: {} - Response: {}", status, body);
        }

        response.json().await.context("Failed to parse webhook response")
    }

    /// Posts an arbitrary body and returns the status and JSON body untouched.
    pub async fn post_raw_webhook(&self, body: &Value) -> Result<(StatusCode, Value)> {
        let response = self.send_webhook(body).await?;
        let status = response.status();
        let body = response.json().await.context("Failed to parse response")?;

        Ok((status, body))
    }

    async fn send_webhook(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/webhook", self.base_url);

        self.client
            .post(&url)
            .json(body)
            .send()
            .await
            .context("Failed to post webhook")
    }
}
