//! HTTP client for the vault bridge service.
//!
//! Endpoints: POST /notes/append, GET /health
//! Auth: x-api-key header

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AppendReceipt, BridgeError, VaultBridge};

const APPEND_TIMEOUT: Duration = Duration::from_secs(10);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

/// Vault bridge client. An absent base URL makes every append fail with
/// `Unconfigured` and every health probe report unreachable, which keeps
/// queued work untouched until the user finishes setup.
pub struct HttpVaultBridge {
    base_url: Option<String>,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AppendRequest<'a> {
    file_path: &'a str,
    content: &'a str,
    create_if_missing: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    success: bool,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    #[serde(default)]
    obsidian_connected: bool,
}

impl HttpVaultBridge {
    pub fn new(base_url: Option<String>, api_key: String) -> Self {
        let base_url = base_url
            .filter(|url| !url.is_empty())
            .map(|url| url.trim_end_matches('/').to_string());

        Self {
            base_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<String, BridgeError> {
        let base = self.base_url.as_ref().ok_or(BridgeError::Unconfigured)?;
        Ok(format!("{}/{}", base, path))
    }
}

#[async_trait]
impl VaultBridge for HttpVaultBridge {
    async fn append_note(
        &self,
        file_path: &str,
        content: &str,
        create_if_missing: bool,
    ) -> Result<AppendReceipt, BridgeError> {
        let url = self.endpoint("notes/append")?;

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .timeout(APPEND_TIMEOUT)
            .json(&AppendRequest {
                file_path,
                content,
                create_if_missing,
            })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(BridgeError::Rejected(format!("HTTP {}: {}", status, body)));
        }

        let parsed: AppendResponse = serde_json::from_str(&body)
            .map_err(|e| BridgeError::Rejected(format!("malformed bridge response: {e}")))?;

        if !parsed.success {
            return Err(BridgeError::Rejected(
                parsed.error.unwrap_or_else(|| "append refused".to_string()),
            ));
        }

        Ok(AppendReceipt {
            file_path: parsed.file_path.unwrap_or_else(|| file_path.to_string()),
        })
    }

    async fn health(&self) -> bool {
        let Ok(url) = self.endpoint("health") else {
            return false;
        };

        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<HealthResponse>().await {
                Ok(health) => health.status == "ok" && health.obsidian_connected,
                Err(e) => {
                    debug!(%e, "unparseable health response");
                    false
                }
            },
            Ok(resp) => {
                debug!(status = %resp.status(), "bridge health check failed");
                false
            }
            Err(e) => {
                debug!(%e, "bridge unreachable");
                false
            }
        }
    }
}

/// Classify a reqwest send failure. 5xx responses come through `send` as
/// `Ok`, so everything here is network-level.
pub(crate) fn transport_error(e: reqwest::Error) -> BridgeError {
    BridgeError::Transport(e.to_string())
}
