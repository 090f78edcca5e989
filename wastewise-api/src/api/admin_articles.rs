//! Admin article endpoints (JSON bodies, explicit slugs)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use wastewise_common::db::articles::{
    self, Article, NewArticle, DEFAULT_AUTHOR, DEFAULT_READ_TIME,
};

use super::articles::{image_error, parse_article_id};
use crate::services::ImageSource;
use crate::{ApiError, ApiResult, AppState};

/// Tags arrive either as `"a,b"` or `["a", "b"]`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Tags {
    Joined(String),
    List(Vec<String>),
}

impl Tags {
    fn joined(self) -> String {
        match self {
            Tags::Joined(s) => s,
            Tags::List(items) => items
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdminArticle {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub excerpt: Option<String>,
    pub tags: Option<Tags>,
    pub author: Option<String>,
    pub read_time: Option<i64>,
    pub is_published: Option<bool>,
    /// URL or filename of an already uploaded image
    pub cover_image: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedArticle {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CreateAdminArticleResponse {
    pub message: String,
    pub article: CreatedArticle,
}

#[derive(Debug, Serialize)]
pub struct DeleteAdminArticleResponse {
    pub message: String,
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct AdminArticleList {
    pub count: usize,
    pub articles: Vec<Article>,
}

fn required(value: Option<String>, field: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Field '{}' is required", field)))
}

/// GET /api/admin/articles
pub async fn list_all_articles(State(state): State<AppState>) -> ApiResult<Json<AdminArticleList>> {
    let articles = articles::list_all(&state.db).await?;
    Ok(Json(AdminArticleList {
        count: articles.len(),
        articles,
    }))
}

/// POST /api/admin/articles
pub async fn create_admin_article(
    State(state): State<AppState>,
    Json(body): Json<CreateAdminArticle>,
) -> ApiResult<(StatusCode, Json<CreateAdminArticleResponse>)> {
    let title = required(body.title, "title")?;
    let slug = required(body.slug, "slug")?;
    let content = required(body.content, "content")?;
    let category = required(body.category, "category")?;

    let cover = match body.cover_image.filter(|c| !c.trim().is_empty()) {
        Some(reference) => Some(
            state
                .images
                .store(ImageSource::Existing(reference))
                .await
                .map_err(image_error)?
                .to_cover(),
        ),
        None => None,
    };

    let new_article = NewArticle {
        excerpt: body
            .excerpt
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| title.clone()),
        title,
        slug,
        content,
        category,
        tags: body.tags.map(Tags::joined).unwrap_or_default(),
        author: body
            .author
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
        read_time: body.read_time.filter(|r| *r > 0).unwrap_or(DEFAULT_READ_TIME),
        is_published: body.is_published.unwrap_or(true),
        cover,
        created_at: body.created_at,
    };

    let article = articles::create(&state.db, &new_article)
        .await
        .map_err(|e| match e {
            wastewise_common::Error::Conflict(_) => {
                ApiError::Conflict(format!(
                    "Article with slug '{}' already exists",
                    new_article.slug
                ))
            }
            other => other.into(),
        })?;

    Ok((
        StatusCode::CREATED,
        Json(CreateAdminArticleResponse {
            message: "Article created successfully".to_string(),
            article: CreatedArticle {
                id: article.id,
                title: article.title,
                slug: article.slug,
                category: article.category,
                created_at: article.created_at,
            },
        }),
    ))
}

/// DELETE /api/admin/articles/:id
pub async fn delete_admin_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteAdminArticleResponse>> {
    let id = parse_article_id(&id)?;
    let existing = articles::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Article not found".to_string()))?;

    articles::delete(&state.db, id).await?;

    if let Some(cover) = existing.cover_image.as_deref() {
        if let Err(e) = state.images.delete(cover).await {
            warn!(filename = %cover, "Failed to delete cover: {}", e);
        }
    }

    Ok(Json(DeleteAdminArticleResponse {
        message: "Article deleted successfully".to_string(),
        id,
    }))
}

/// Build admin article routes
pub fn admin_article_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/articles",
            get(list_all_articles).post(create_admin_article),
        )
        .route("/api/admin/articles/:id", delete(delete_admin_article))
}
