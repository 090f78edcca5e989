//! Cover image upload and removal

use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{delete, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use wastewise_common::db::articles;

use super::articles::{image_error, parse_article_id};
use crate::services::{ImageSource, StoredImage};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQuery {
    pub article_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub file: StoredImage,
}

#[derive(Debug, Serialize)]
pub struct RemoveImageResponse {
    pub success: bool,
}

/// POST /api/articles/upload?articleId=
///
/// With `articleId`, the article's previous cover is deleted and the row
/// points at the new file.
pub async fn upload_image(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut source = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            source = ImageSource::from_field(field)
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
            break;
        }
    }

    let source = source.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;

    let article = match query.article_id.as_deref().filter(|id| !id.is_empty()) {
        Some(raw) => {
            let id = parse_article_id(raw)?;
            Some(
                articles::find_by_id(&state.db, id)
                    .await?
                    .ok_or_else(|| ApiError::NotFound("Article not found".to_string()))?,
            )
        }
        None => None,
    };

    let stored = state.images.store(source).await.map_err(image_error)?;

    if let Some(article) = article {
        articles::set_cover(&state.db, article.id, &stored.to_cover()).await?;

        if let Some(old) = article.cover_image.as_deref() {
            if let Err(e) = state.images.delete(old).await {
                warn!(filename = %old, "Failed to delete replaced cover: {}", e);
            }
        }

        info!(article_id = article.id, filename = %stored.filename, "Replaced article cover");
    }

    Ok(Json(UploadResponse {
        success: true,
        file: stored,
    }))
}

/// DELETE /api/articles/image/:article_id
pub async fn remove_image(
    State(state): State<AppState>,
    Path(article_id): Path<String>,
) -> ApiResult<Json<RemoveImageResponse>> {
    let id = parse_article_id(&article_id)?;

    let cover = articles::find_by_id(&state.db, id)
        .await?
        .and_then(|a| a.cover_image)
        .ok_or_else(|| ApiError::NotFound("No image found".to_string()))?;

    if let Err(e) = state.images.delete(&cover).await {
        warn!(filename = %cover, "Failed to delete cover: {}", e);
    }

    articles::clear_cover(&state.db, id).await?;

    Ok(Json(RemoveImageResponse { success: true }))
}

/// Build cover image routes
pub fn article_image_routes() -> Router<AppState> {
    Router::new()
        .route("/api/articles/upload", post(upload_image))
        .route("/api/articles/image/:article_id", delete(remove_image))
}
