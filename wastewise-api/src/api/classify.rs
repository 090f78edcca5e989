//! Classification proxy to the ML service

use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::services::ClassifyImage;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ClassifyJson {
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub success: bool,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MlAvailability {
    Available,
    Unavailable,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MlServiceStatus {
    pub success: bool,
    pub status: MlAvailability,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml_service: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub url: String,
}

/// Decode a base64 payload, tolerating a `data:<mime>;base64,` prefix
pub fn decode_base64_image(payload: &str) -> ApiResult<Vec<u8>> {
    let trimmed = payload.trim();
    let encoded = match trimmed.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => trimmed,
    };

    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ApiError::BadRequest(format!("Invalid base64 image: {}", e)))?;

    if bytes.is_empty() {
        return Err(ApiError::BadRequest("No image provided".to_string()));
    }
    Ok(bytes)
}

async fn image_from_multipart(mut multipart: Multipart) -> ApiResult<Option<ClassifyImage>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read image: {}", e)))?;

        // A part without a filename is a text field carrying base64
        return match filename {
            Some(filename) if !bytes.is_empty() => Ok(Some(ClassifyImage {
                bytes: bytes.to_vec(),
                filename,
                content_type: content_type.unwrap_or_else(|| "image/jpeg".to_string()),
            })),
            Some(_) => Ok(None),
            None => {
                let text = String::from_utf8_lossy(&bytes);
                Ok(Some(ClassifyImage::jpeg(decode_base64_image(&text)?)))
            }
        };
    }

    Ok(None)
}

/// POST /api/classify
pub async fn classify(
    State(state): State<AppState>,
    request: Request,
) -> ApiResult<Json<ClassifyResponse>> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let image = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        image_from_multipart(multipart).await?
    } else if content_type.starts_with("application/json") {
        let Json(body) = Json::<ClassifyJson>::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        match body.image.filter(|s| !s.trim().is_empty()) {
            Some(payload) => Some(ClassifyImage::jpeg(decode_base64_image(&payload)?)),
            None => None,
        }
    } else {
        None
    };

    let image = image.ok_or_else(|| ApiError::BadRequest("No image provided".to_string()))?;

    info!(
        bytes = image.bytes.len(),
        filename = %image.filename,
        "Forwarding image for classification"
    );
    let data = state.ml_client.classify(image).await?;

    Ok(Json(ClassifyResponse {
        success: true,
        data,
        timestamp: Utc::now(),
    }))
}

/// GET /api/ml-service-status
///
/// Always 200; reachability is reported in the body.
pub async fn ml_service_status(State(state): State<AppState>) -> Json<MlServiceStatus> {
    let url = state.ml_client.base_url().to_string();

    match state.ml_client.health().await {
        Ok(health) => Json(MlServiceStatus {
            success: true,
            status: MlAvailability::Available,
            ml_service: Some(health),
            error: None,
            url,
        }),
        Err(e) => {
            warn!(url = %url, "ML service health check failed: {}", e);
            Json(MlServiceStatus {
                success: false,
                status: MlAvailability::Unavailable,
                ml_service: None,
                error: Some(e.to_string()),
                url,
            })
        }
    }
}

/// Build classification routes
pub fn classify_routes() -> Router<AppState> {
    Router::new()
        .route("/api/classify", post(classify))
        .route("/api/ml-service-status", get(ml_service_status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_base64() {
        assert_eq!(decode_base64_image("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_strips_data_url_prefix() {
        let bytes = decode_base64_image("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_base64_image("not base64 !!"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(decode_base64_image(""), Err(ApiError::BadRequest(_))));
    }
}
