//! Midtrans payment gateway client
//!
//! Snap API for checkout sessions, Core API for transaction status, and
//! SHA-512 verification of notification signatures.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::time::Duration;
use thiserror::Error;
use wastewise_common::config::MidtransConfig;

pub const SNAP_SANDBOX_URL: &str = "https://app.sandbox.midtrans.com/snap/v1/transactions";
pub const SNAP_PRODUCTION_URL: &str = "https://app.midtrans.com/snap/v1/transactions";
pub const CORE_SANDBOX_URL: &str = "https://api.sandbox.midtrans.com/v2";
pub const CORE_PRODUCTION_URL: &str = "https://api.midtrans.com/v2";

const USER_AGENT: &str = concat!("WasteWise/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Midtrans client errors
#[derive(Debug, Error)]
pub enum MidtransError {
    #[error("Midtrans server key is not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Midtrans API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Midtrans response did not include a transaction token")]
    MissingToken,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid order id: {0}")]
    InvalidOrderId(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetails {
    pub order_id: String,
    pub gross_amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreditCard {
    pub secure: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BillingAddress {
    pub first_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetails {
    pub first_name: String,
    pub email: String,
    pub phone: String,
    pub billing_address: BillingAddress,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemDetail {
    pub id: String,
    pub price: i64,
    pub quantity: u32,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub merchant_name: String,
    pub description: String,
}

/// Redirect targets after checkout
#[derive(Debug, Clone, Serialize)]
pub struct Callbacks {
    pub finish: String,
    pub error: String,
    pub pending: String,
}

/// Snap `POST /transactions` body
#[derive(Debug, Clone, Serialize)]
pub struct SnapTransactionRequest {
    pub transaction_details: TransactionDetails,
    pub credit_card: CreditCard,
    pub customer_details: CustomerDetails,
    pub item_details: Vec<ItemDetail>,
    pub callbacks: Callbacks,
}

/// Checkout session returned by Snap
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapTransaction {
    pub token: String,
    pub redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct SnapResponse {
    token: Option<String>,
    redirect_url: Option<String>,
}

/// Order ids are limited to the characters Midtrans itself accepts
pub fn is_valid_order_id(order_id: &str) -> bool {
    !order_id.is_empty()
        && order_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
        && order_id.chars().any(|c| c.is_ascii_alphanumeric())
}

/// Midtrans API client
#[derive(Clone)]
pub struct MidtransClient {
    http_client: reqwest::Client,
    config: MidtransConfig,
    snap_url: String,
    core_url: String,
}

impl MidtransClient {
    /// Client targeting the sandbox or production hosts per `config.mode`
    pub fn new(config: MidtransConfig) -> Result<Self, MidtransError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MidtransError::Network(e.to_string()))?;

        let (snap_url, core_url) = if config.is_production() {
            (SNAP_PRODUCTION_URL, CORE_PRODUCTION_URL)
        } else {
            (SNAP_SANDBOX_URL, CORE_SANDBOX_URL)
        };

        Ok(Self {
            http_client,
            config,
            snap_url: snap_url.to_string(),
            core_url: core_url.to_string(),
        })
    }

    /// Point the client at other hosts (local fakes in tests)
    pub fn with_endpoints(mut self, snap_url: &str, core_url: &str) -> Self {
        self.snap_url = snap_url.trim_end_matches('/').to_string();
        self.core_url = core_url.trim_end_matches('/').to_string();
        self
    }

    pub fn config(&self) -> &MidtransConfig {
        &self.config
    }

    pub fn is_production(&self) -> bool {
        self.config.is_production()
    }

    pub fn client_key(&self) -> Option<&str> {
        self.config.client_key.as_deref()
    }

    fn server_key(&self) -> Result<&str, MidtransError> {
        self.config
            .server_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(MidtransError::NotConfigured)
    }

    /// Open a Snap checkout session
    pub async fn create_snap_transaction(
        &self,
        request: &SnapTransactionRequest,
    ) -> Result<SnapTransaction, MidtransError> {
        let server_key = self.server_key()?;

        tracing::debug!(
            order_id = %request.transaction_details.order_id,
            "Creating Snap transaction"
        );

        let response = self
            .http_client
            .post(&self.snap_url)
            .basic_auth(server_key, Some(""))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| MidtransError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "Snap transaction rejected");
            return Err(MidtransError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let snap: SnapResponse = response
            .json()
            .await
            .map_err(|e| MidtransError::Parse(e.to_string()))?;

        match snap.token.filter(|t| !t.is_empty()) {
            Some(token) => Ok(SnapTransaction {
                token,
                redirect_url: snap.redirect_url.unwrap_or_default(),
            }),
            None => Err(MidtransError::MissingToken),
        }
    }

    /// `{core}/{order_id}/status`, with the order id as a single escaped segment
    fn status_url(&self, order_id: &str) -> Result<reqwest::Url, MidtransError> {
        if !is_valid_order_id(order_id) {
            return Err(MidtransError::InvalidOrderId(order_id.to_string()));
        }

        let mut url = reqwest::Url::parse(&self.core_url)
            .map_err(|e| MidtransError::Network(format!("Bad Core API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| MidtransError::Network("Core API URL cannot take a path".to_string()))?
            .pop_if_empty()
            .push(order_id)
            .push("status");
        Ok(url)
    }

    /// Core API transaction status, passed through untouched
    pub async fn transaction_status(
        &self,
        order_id: &str,
    ) -> Result<serde_json::Value, MidtransError> {
        let server_key = self.server_key()?;
        let url = self.status_url(order_id)?;

        let response = self
            .http_client
            .get(url)
            .basic_auth(server_key, Some(""))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| MidtransError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MidtransError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| MidtransError::Parse(e.to_string()))
    }

    /// Check a notification signature against the configured server key
    ///
    /// False when the key is missing.
    pub fn verify_notification(
        &self,
        order_id: &str,
        status_code: &str,
        gross_amount: &str,
        provided: &str,
    ) -> bool {
        match self.server_key() {
            Ok(key) => verify_signature(order_id, status_code, gross_amount, key, provided),
            Err(_) => false,
        }
    }
}

/// Hex SHA-512 of `order_id + status_code + gross_amount + server_key`
pub fn signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare a provided signature with the expected one
///
/// Any empty input fails verification.
pub fn verify_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
    provided: &str,
) -> bool {
    if order_id.is_empty()
        || status_code.is_empty()
        || gross_amount.is_empty()
        || provided.is_empty()
    {
        return false;
    }

    let expected = signature(order_id, status_code, gross_amount, server_key);
    expected.eq_ignore_ascii_case(provided.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wastewise_common::config::MidtransMode;

    fn config(mode: MidtransMode, key: Option<&str>) -> MidtransConfig {
        MidtransConfig {
            mode,
            server_key: key.map(str::to_string),
            client_key: Some("client".to_string()),
        }
    }

    #[test]
    fn test_signature_is_sha512_hex() {
        let sig = signature("order-1", "200", "99000.00", "secret");
        assert_eq!(sig.len(), 128);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));

        let mut hasher = Sha512::new();
        hasher.update(b"order-120099000.00secret");
        assert_eq!(sig, hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_verify_signature() {
        let sig = signature("order-1", "200", "99000.00", "secret");
        assert!(verify_signature("order-1", "200", "99000.00", "secret", &sig));
        assert!(!verify_signature("order-1", "200", "99000.00", "other", &sig));
        assert!(!verify_signature("order-1", "201", "99000.00", "secret", &sig));
        assert!(!verify_signature("", "200", "99000.00", "secret", &sig));
        assert!(!verify_signature("order-1", "200", "99000.00", "secret", ""));
    }

    #[test]
    fn test_status_url_keeps_order_id_in_one_segment() {
        let client = MidtransClient::new(config(MidtransMode::Sandbox, Some("k")))
            .unwrap()
            .with_endpoints("http://127.0.0.1:9/snap", "http://127.0.0.1:9/v2/");

        let url = client.status_url("PREMIUM-1700000000000-7-user_1.a~b").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9/v2/PREMIUM-1700000000000-7-user_1.a~b/status"
        );

        for bad in ["../../admin/secrets?x=", "..", "a/b", "a?b", "a#b", "", "a b"] {
            assert!(
                matches!(client.status_url(bad), Err(MidtransError::InvalidOrderId(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_endpoints_follow_mode() {
        let sandbox = MidtransClient::new(config(MidtransMode::Sandbox, Some("k"))).unwrap();
        assert_eq!(sandbox.snap_url, SNAP_SANDBOX_URL);
        assert_eq!(sandbox.core_url, CORE_SANDBOX_URL);

        let production = MidtransClient::new(config(MidtransMode::Production, Some("k"))).unwrap();
        assert_eq!(production.snap_url, SNAP_PRODUCTION_URL);
        assert!(production.is_production());
    }

    #[test]
    fn test_verify_without_key_fails() {
        let client = MidtransClient::new(config(MidtransMode::Production, None)).unwrap();
        let sig = signature("o", "200", "1", "");
        assert!(!client.verify_notification("o", "200", "1", &sig));
    }
}
