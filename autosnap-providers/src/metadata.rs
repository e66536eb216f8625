use crate::InstanceMetadata;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254";

const TOKEN_PATH: &str = "/latest/api/token";
const INSTANCE_ID_PATH: &str = "/latest/meta-data/instance-id";
const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";
const TOKEN_TTL_SECONDS: &str = "60";

/// EC2 instance metadata service client.
///
/// Uses an IMDSv2 session token when the token endpoint answers and falls back
/// to a plain IMDSv1 GET otherwise.
pub struct ImdsClient {
    client: Client,
    endpoint: String,
}

impl ImdsClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        // The link-local endpoint answers in milliseconds or not at all (off EC2).
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .timeout(Duration::from_secs(5))
            .build()?;
        let endpoint = endpoint.trim().trim_end_matches('/').to_string();
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch_token(&self) -> Option<String> {
        let url = format!("{}{}", self.endpoint, TOKEN_PATH);
        let resp = match self
            .client
            .put(&url)
            .header(TOKEN_TTL_HEADER, TOKEN_TTL_SECONDS)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::debug!("IMDSv2 token request failed, falling back to IMDSv1: {}", e);
                return None;
            }
        };
        if !resp.status().is_success() {
            tracing::debug!(
                "IMDSv2 token endpoint returned status={}, falling back to IMDSv1",
                resp.status().as_u16()
            );
            return None;
        }
        resp.text()
            .await
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

#[async_trait]
impl InstanceMetadata for ImdsClient {
    async fn instance_id(&self) -> Result<String> {
        let url = format!("{}{}", self.endpoint, INSTANCE_ID_PATH);
        let mut req = self.client.get(&url);
        if let Some(token) = self.fetch_token().await {
            req = req.header(TOKEN_HEADER, token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "GET {} failed: status={} body={}",
                url,
                status.as_u16(),
                text
            ));
        }

        Ok(resp.text().await?.trim().to_string())
    }
}

/// Instance id supplied up front (configuration override, tests).
pub struct StaticInstanceId(String);

impl StaticInstanceId {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self(instance_id.into())
    }
}

#[async_trait]
impl InstanceMetadata for StaticInstanceId {
    async fn instance_id(&self) -> Result<String> {
        Ok(self.0.trim().to_string())
    }
}
