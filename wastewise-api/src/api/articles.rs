//! Public article endpoints and multipart article management
//!
//! `/api/articles*` is read-only; `/api/v1/articles*` takes multipart forms
//! with an optional `file` part for the cover image.

use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use wastewise_common::db::articles::{
    self, Article, ArticleFilter, ArticleSummary, ArticleUpdate, CategoryCount, NewArticle,
    DEFAULT_AUTHOR, DEFAULT_CATEGORY, DEFAULT_READ_TIME,
};

use crate::pagination::{calculate_pagination, PageInfo, DEFAULT_PAGE_SIZE};
use crate::services::slug::{disambiguate, slugify};
use crate::services::{ImageError, ImageSource, StoredImage};
use crate::{ApiError, ApiResult, AppState};

const RELATED_LIMIT: i64 = 3;

#[derive(Debug, Deserialize)]
pub struct ArticleListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ArticleListResponse {
    pub articles: Vec<ArticleSummary>,
    pub pagination: PageInfo,
}

/// Article with related reads, the latter only on slug lookups
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDetail {
    #[serde(flatten)]
    pub article: Article,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_articles: Option<Vec<ArticleSummary>>,
}

#[derive(Debug, Serialize)]
pub struct ArticleMutationResponse {
    pub success: bool,
    pub article: Article,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

/// Text fields and optional cover from an article form
#[derive(Debug, Default)]
pub struct ArticleForm {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub author: Option<String>,
    pub file: Option<ImageSource>,
}

impl ArticleForm {
    /// Drain a multipart body; unknown parts are ignored
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = ArticleForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == "file" {
                form.file = ImageSource::from_field(field)
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read field {}: {}", name, e))
                })?;

            let slot = match name.as_str() {
                "title" => &mut form.title,
                "content" => &mut form.content,
                "excerpt" => &mut form.excerpt,
                "category" => &mut form.category,
                "tags" => &mut form.tags,
                "author" => &mut form.author,
                _ => continue,
            };
            *slot = Some(value);
        }

        Ok(form)
    }
}

/// Map a storage failure onto an HTTP error
pub(crate) fn image_error(err: ImageError) -> ApiError {
    if err.is_rejection() {
        ApiError::BadRequest(format!("Failed to process image: {}", err))
    } else {
        ApiError::Internal(format!("Failed to store image: {}", err))
    }
}

/// Remove a freshly stored cover whose article write failed
async fn discard_stored(state: &AppState, stored: Option<&StoredImage>) {
    if let Some(image) = stored {
        if let Err(e) = state.images.delete(&image.filename).await {
            warn!(filename = %image.filename, "Cleanup of cover failed: {}", e);
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub(crate) fn parse_article_id(raw: &str) -> ApiResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::NotFound("Article not found".to_string()))
}

/// GET /api/articles
pub async fn list_articles(
    State(state): State<AppState>,
    Query(query): Query<ArticleListQuery>,
) -> ApiResult<Json<ArticleListResponse>> {
    let filter = ArticleFilter {
        category: non_empty(query.category),
        search: non_empty(query.search),
    };

    let total = articles::count_published(&state.db, &filter).await?;
    let page = calculate_pagination(
        total,
        query.page.unwrap_or(1),
        query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
    );
    let list = articles::list_published(&state.db, &filter, page.page_size, page.offset).await?;

    Ok(Json(ArticleListResponse {
        articles: list,
        pagination: page.info(total),
    }))
}

/// GET /api/articles/categories
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<CategoryCount>>> {
    Ok(Json(articles::categories(&state.db).await?))
}

/// GET /api/articles/:id
///
/// A numeric segment is an id lookup. Anything else is treated as a slug:
/// published only, counts a view, and includes related articles.
pub async fn get_article(
    State(state): State<AppState>,
    Path(id_or_slug): Path<String>,
) -> ApiResult<Json<ArticleDetail>> {
    if let Ok(id) = id_or_slug.parse::<i64>() {
        let article = articles::find_by_id(&state.db, id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Article not found".to_string()))?;

        return Ok(Json(ArticleDetail {
            article,
            related_articles: None,
        }));
    }

    let mut article = articles::find_by_slug(&state.db, &id_or_slug, true)
        .await?
        .ok_or_else(|| ApiError::NotFound("Article not found".to_string()))?;

    articles::increment_views(&state.db, article.id).await?;
    article.view_count += 1;

    let related = articles::related(&state.db, &article.category, article.id, RELATED_LIMIT).await?;

    Ok(Json(ArticleDetail {
        article,
        related_articles: Some(related),
    }))
}

/// GET /api/articles/slug/:slug
pub async fn get_article_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Article>> {
    let mut article = articles::find_by_slug(&state.db, &slug, false)
        .await?
        .ok_or_else(|| ApiError::NotFound("Article not found".to_string()))?;

    articles::increment_views(&state.db, article.id).await?;
    article.view_count += 1;

    Ok(Json(article))
}

/// POST /api/v1/articles
pub async fn create_article(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<ArticleMutationResponse>> {
    let form = ArticleForm::read(multipart).await?;

    let (title, content) = match (non_empty(form.title), non_empty(form.content)) {
        (Some(title), Some(content)) => (title, content),
        _ => {
            return Err(ApiError::BadRequest(
                "Title and content are required".to_string(),
            ))
        }
    };

    let base = slugify(&title);
    let existing = articles::count_slugs_with_prefix(&state.db, &base).await?;
    let slug = disambiguate(&base, existing);

    let stored: Option<StoredImage> = match form.file {
        Some(source) => Some(state.images.store(source).await.map_err(image_error)?),
        None => None,
    };

    let new_article = NewArticle {
        title,
        slug,
        excerpt: form.excerpt.unwrap_or_default(),
        content,
        category: non_empty(form.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        tags: form.tags.unwrap_or_default(),
        author: non_empty(form.author).unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
        read_time: DEFAULT_READ_TIME,
        is_published: true,
        cover: stored.as_ref().map(StoredImage::to_cover),
        created_at: None,
    };

    let article = match articles::create(&state.db, &new_article).await {
        Ok(article) => article,
        Err(err) => {
            discard_stored(&state, stored.as_ref()).await;
            return Err(match err {
                wastewise_common::Error::Conflict(_) => {
                    ApiError::BadRequest("Article with this title already exists".to_string())
                }
                other => other.into(),
            });
        }
    };

    Ok(Json(ArticleMutationResponse {
        success: true,
        article,
    }))
}

/// PUT /api/v1/articles/:id
pub async fn update_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<Json<ArticleMutationResponse>> {
    let id = parse_article_id(&id)?;
    let existing = articles::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Article not found".to_string()))?;

    let form = ArticleForm::read(multipart).await?;

    let stored = match form.file {
        Some(source) => Some(state.images.store(source).await.map_err(image_error)?),
        None => None,
    };

    let changes = ArticleUpdate {
        title: form.title,
        content: form.content,
        excerpt: form.excerpt,
        category: form.category,
        tags: form.tags,
        author: form.author,
        cover: stored.as_ref().map(StoredImage::to_cover),
    };

    let article = match articles::update(&state.db, id, &changes).await {
        Ok(article) => article,
        Err(err) => {
            discard_stored(&state, stored.as_ref()).await;
            return Err(err.into());
        }
    };

    if stored.is_some() {
        if let Some(old) = existing.cover_image.as_deref() {
            if let Err(e) = state.images.delete(old).await {
                warn!(filename = %old, "Failed to delete replaced cover: {}", e);
            }
        }
    }

    info!(article_id = id, "Updated article");

    Ok(Json(ArticleMutationResponse {
        success: true,
        article,
    }))
}

/// DELETE /api/v1/articles/:id
pub async fn delete_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let id = parse_article_id(&id)?;
    let existing = articles::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Article not found".to_string()))?;

    if let Some(cover) = existing.cover_image.as_deref() {
        if let Err(e) = state.images.delete(cover).await {
            warn!(filename = %cover, "Failed to delete cover: {}", e);
        }
    }

    articles::delete(&state.db, id).await?;
    info!(article_id = id, "Deleted article");

    Ok(Json(DeleteResponse {
        success: true,
        message: "Article deleted successfully".to_string(),
    }))
}

/// Build public and multipart article routes
pub fn article_routes() -> Router<AppState> {
    Router::new()
        .route("/api/articles", get(list_articles))
        .route("/api/articles/categories", get(list_categories))
        .route("/api/articles/slug/:slug", get(get_article_by_slug))
        .route("/api/articles/:id", get(get_article))
        .route("/api/v1/articles", post(create_article))
        .route("/api/v1/articles/:id", put(update_article).delete(delete_article))
}
