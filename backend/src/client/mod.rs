//! Client for the remote schools API.
//!
//! `GET {base}/schools` returns an array of nested school documents
//! (see [`crate::ingest`]). Requests carry the key in `x-api-key`.
//!
//! ```rust,ignore
//! let client = SchoolApiClient::from_settings(&Settings::from_env()?)?;
//! let payload = client.fetch_schools().await?;
//! ```

use serde_json::Value;

use crate::api::logs::{log_info, log_warning};
use crate::config::{Settings, API_BASE_URL_VAR, API_KEY_VAR};
use crate::error::{ClientError, ClientResult};

/// Attempts per request, transport errors and 5xx only.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds
const RETRY_DELAY_MS: u64 = 500;

#[derive(Clone)]
pub struct SchoolApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SchoolApiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> ClientResult<Self> {
        let base_url = settings
            .api_base_url
            .clone()
            .ok_or(ClientError::MissingSetting(API_BASE_URL_VAR))?;
        let api_key = settings
            .api_key
            .clone()
            .ok_or(ClientError::MissingSetting(API_KEY_VAR))?;
        Ok(Self::new(base_url, api_key))
    }

    pub fn schools_url(&self) -> String {
        format!("{}/schools", self.base_url)
    }

    /// Fetch the raw school payload.
    pub async fn fetch_schools(&self) -> ClientResult<Value> {
        let mut attempt = 1;
        loop {
            match self.try_fetch().await {
                Ok(payload) => return Ok(payload),
                Err(e) if attempt < DEFAULT_MAX_RETRIES && is_retryable(&e) => {
                    log_warning(format!("Attempt {}/{} failed: {}", attempt, DEFAULT_MAX_RETRIES, e));
                    tokio::time::sleep(std::time::Duration::from_millis(RETRY_DELAY_MS)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_fetch(&self) -> ClientResult<Value> {
        let url = self.schools_url();
        log_info(format!("Fetching {}", url));

        let response = self
            .http
            .get(&url)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

fn is_retryable(error: &ClientError) -> bool {
    match error {
        ClientError::Http(e) => !e.is_decode(),
        ClientError::Status { status, .. } => *status >= 500,
        ClientError::MissingSetting(_) => false,
    }
}
