//! HTTP API handlers

pub mod admin_articles;
pub mod article_images;
pub mod articles;
pub mod classify;
pub mod health;
pub mod payment;
pub mod users;
pub mod waste_banks;

pub use admin_articles::admin_article_routes;
pub use article_images::article_image_routes;
pub use articles::article_routes;
pub use classify::classify_routes;
pub use health::health_routes;
pub use payment::payment_routes;
pub use users::user_routes;
pub use waste_banks::waste_bank_routes;

use serde::Serialize;

/// `{status:"success", message?, data}` envelope used by user and payment routes
#[derive(Debug, Serialize)]
pub struct StatusEnvelope<T> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub data: T,
}

impl<T> StatusEnvelope<T> {
    pub fn success(message: &'static str, data: T) -> Self {
        Self {
            status: "success",
            message: Some(message),
            data,
        }
    }

    pub fn data(data: T) -> Self {
        Self {
            status: "success",
            message: None,
            data,
        }
    }
}
