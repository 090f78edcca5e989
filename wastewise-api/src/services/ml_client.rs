//! ML classification service client
//!
//! Forwards an image as a multipart `image` part to `{base}/api/classify`
//! and probes `{base}/health`.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("WasteWise/", env!("CARGO_PKG_VERSION"));
const CLASSIFY_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// ML client errors
#[derive(Debug, Error)]
pub enum MlClientError {
    /// Connection could not be established
    #[error("ML service unreachable: {0}")]
    Unavailable(String),

    #[error("ML service request timed out")]
    Timeout,

    /// Non-2xx answer; `body` is the upstream text
    #[error("ML service error {status}: {body}")]
    Upstream { status: u16, body: String },

    /// 2xx answer carrying `success: false`
    #[error("Classification rejected: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for MlClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MlClientError::Timeout
        } else if err.is_connect() {
            MlClientError::Unavailable(err.to_string())
        } else {
            MlClientError::Network(err.to_string())
        }
    }
}

/// Image payload forwarded to the classifier
#[derive(Debug, Clone)]
pub struct ClassifyImage {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

impl ClassifyImage {
    /// Raw bytes with the defaults used for base64 payloads
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            filename: "image.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// ML service client
#[derive(Clone)]
pub struct MlClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl MlClient {
    pub fn new(base_url: &str) -> Result<Self, MlClientError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MlClientError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Classify an image, returning the classifier's `data` payload
    pub async fn classify(&self, image: ClassifyImage) -> Result<serde_json::Value, MlClientError> {
        let url = format!("{}/api/classify", self.base_url);
        let size = image.bytes.len();

        let part = reqwest::multipart::Part::bytes(image.bytes)
            .file_name(image.filename)
            .mime_str(&image.content_type)
            .map_err(|e| MlClientError::Parse(format!("Invalid content type: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("image", part);

        tracing::debug!(url = %url, bytes = size, "Calling ML service");

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .timeout(CLASSIFY_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "ML service returned error");
            return Err(MlClientError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let result: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| MlClientError::Parse(e.to_string()))?;

        if result.success {
            Ok(result.data.unwrap_or(serde_json::Value::Null))
        } else {
            Err(MlClientError::Rejected(
                result
                    .error
                    .unwrap_or_else(|| "ML service classification failed".to_string()),
            ))
        }
    }

    /// Fetch the classifier's health document
    pub async fn health(&self) -> Result<serde_json::Value, MlClientError> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MlClientError::Upstream {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| MlClientError::Parse(e.to_string()))
    }
}
