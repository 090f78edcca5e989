//! Article persistence
//!
//! Tags are stored as one comma-separated string, as the frontend sends them.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

pub const DEFAULT_AUTHOR: &str = "Tim EcoWaste";
pub const DEFAULT_CATEGORY: &str = "Uncategorized";
pub const DEFAULT_READ_TIME: i64 = 5;

/// Full article row
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub cover_image: Option<String>,
    pub cover_original_name: Option<String>,
    pub cover_size: Option<i64>,
    pub cover_type: Option<String>,
    pub category: String,
    pub tags: String,
    pub author: String,
    pub read_time: i64,
    pub is_published: bool,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List projection (no body, no cover metadata)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub cover_image: Option<String>,
    pub category: String,
    pub tags: String,
    pub author: String,
    pub read_time: i64,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Category with its published-article count
#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: i64,
}

/// Stored cover image metadata
#[derive(Debug, Clone, PartialEq)]
pub struct CoverImage {
    pub filename: String,
    pub original_name: Option<String>,
    pub size: i64,
    pub mime_type: String,
}

/// Fields for a new article
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub category: String,
    pub tags: String,
    pub author: String,
    pub read_time: i64,
    pub is_published: bool,
    pub cover: Option<CoverImage>,
    /// Backdated creation time; `None` means now
    pub created_at: Option<DateTime<Utc>>,
}

/// Partial update; `None` leaves the column unchanged
#[derive(Debug, Clone, Default)]
pub struct ArticleUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub author: Option<String>,
    pub cover: Option<CoverImage>,
}

/// Filter for the public listing
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub category: Option<String>,
    /// Case-insensitive substring of title, excerpt or tags
    pub search: Option<String>,
}

const ARTICLE_COLUMNS: &str = "id, title, slug, excerpt, content, cover_image, cover_original_name, \
                               cover_size, cover_type, category, tags, author, read_time, \
                               is_published, view_count, created_at, updated_at";

const SUMMARY_COLUMNS: &str =
    "id, title, slug, excerpt, cover_image, category, tags, author, read_time, view_count, created_at";

fn article_from_row(row: &SqliteRow) -> Result<Article> {
    Ok(Article {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        excerpt: row.try_get("excerpt")?,
        content: row.try_get("content")?,
        cover_image: row.try_get("cover_image")?,
        cover_original_name: row.try_get("cover_original_name")?,
        cover_size: row.try_get("cover_size")?,
        cover_type: row.try_get("cover_type")?,
        category: row.try_get("category")?,
        tags: row.try_get("tags")?,
        author: row.try_get("author")?,
        read_time: row.try_get("read_time")?,
        is_published: row.try_get("is_published")?,
        view_count: row.try_get("view_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn summary_from_row(row: &SqliteRow) -> Result<ArticleSummary> {
    Ok(ArticleSummary {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        excerpt: row.try_get("excerpt")?,
        cover_image: row.try_get("cover_image")?,
        category: row.try_get("category")?,
        tags: row.try_get("tags")?,
        author: row.try_get("author")?,
        read_time: row.try_get("read_time")?,
        view_count: row.try_get("view_count")?,
        created_at: row.try_get("created_at")?,
    })
}

fn push_published_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ArticleFilter) {
    builder.push(" WHERE is_published = 1");

    if let Some(category) = filter.category.as_ref().filter(|c| !c.is_empty()) {
        builder.push(" AND category = ").push_bind(category.clone());
    }

    if let Some(search) = filter.search.as_ref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim().to_lowercase());
        builder
            .push(" AND (LOWER(title) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(excerpt) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(tags) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// One page of published articles, newest first
pub async fn list_published(
    pool: &SqlitePool,
    filter: &ArticleFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<ArticleSummary>> {
    let mut builder =
        QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM articles", SUMMARY_COLUMNS));
    push_published_filter(&mut builder, filter);
    builder
        .push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(summary_from_row).collect()
}

/// Count of published articles matching `filter`
pub async fn count_published(pool: &SqlitePool, filter: &ArticleFilter) -> Result<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS total FROM articles");
    push_published_filter(&mut builder, filter);

    let row = builder.build().fetch_one(pool).await?;
    Ok(row.try_get("total")?)
}

/// Every article including unpublished ones, newest first
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Article>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM articles ORDER BY created_at DESC, id DESC",
        ARTICLE_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(article_from_row).collect()
}

/// Published categories with counts, sorted by name
pub async fn categories(pool: &SqlitePool) -> Result<Vec<CategoryCount>> {
    let rows = sqlx::query(
        "SELECT category, COUNT(*) AS count FROM articles WHERE is_published = 1 \
         GROUP BY category ORDER BY category",
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(CategoryCount {
                name: row.try_get("category")?,
                count: row.try_get("count")?,
            })
        })
        .collect()
}

/// Load article by id regardless of publication state
pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Article>> {
    let row = sqlx::query(&format!("SELECT {} FROM articles WHERE id = ?", ARTICLE_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(article_from_row).transpose()
}

/// Load article by slug; `published_only` hides drafts
pub async fn find_by_slug(
    pool: &SqlitePool,
    slug: &str,
    published_only: bool,
) -> Result<Option<Article>> {
    let sql = if published_only {
        format!("SELECT {} FROM articles WHERE slug = ? AND is_published = 1", ARTICLE_COLUMNS)
    } else {
        format!("SELECT {} FROM articles WHERE slug = ?", ARTICLE_COLUMNS)
    };

    let row = sqlx::query(&sql).bind(slug).fetch_optional(pool).await?;
    row.as_ref().map(article_from_row).transpose()
}

/// Bump `view_count` by one
pub async fn increment_views(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE articles SET view_count = view_count + 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Up to `limit` other published articles in the same category
pub async fn related(
    pool: &SqlitePool,
    category: &str,
    exclude_id: i64,
    limit: i64,
) -> Result<Vec<ArticleSummary>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM articles WHERE category = ? AND id != ? AND is_published = 1 \
         ORDER BY created_at DESC LIMIT ?",
        SUMMARY_COLUMNS
    ))
    .bind(category)
    .bind(exclude_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(summary_from_row).collect()
}

/// Number of slugs starting with `prefix`
pub async fn count_slugs_with_prefix(pool: &SqlitePool, prefix: &str) -> Result<i64> {
    // LIKE wildcards in the prefix are escaped so `a_b` does not match `axb`
    let escaped = prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");

    let row = sqlx::query("SELECT COUNT(*) AS total FROM articles WHERE slug LIKE ? ESCAPE '\\'")
        .bind(format!("{}%", escaped))
        .fetch_one(pool)
        .await?;

    Ok(row.try_get("total")?)
}

/// Insert an article; duplicate slug maps to `Error::Conflict`
pub async fn create(pool: &SqlitePool, new_article: &NewArticle) -> Result<Article> {
    let now = Utc::now();
    let created_at = new_article.created_at.unwrap_or(now);
    let cover = new_article.cover.as_ref();

    let result = sqlx::query(
        r#"
        INSERT INTO articles (
            title, slug, excerpt, content, cover_image, cover_original_name, cover_size,
            cover_type, category, tags, author, read_time, is_published, view_count,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&new_article.title)
    .bind(&new_article.slug)
    .bind(&new_article.excerpt)
    .bind(&new_article.content)
    .bind(cover.map(|c| c.filename.clone()))
    .bind(cover.and_then(|c| c.original_name.clone()))
    .bind(cover.map(|c| c.size))
    .bind(cover.map(|c| c.mime_type.clone()))
    .bind(&new_article.category)
    .bind(&new_article.tags)
    .bind(&new_article.author)
    .bind(new_article.read_time)
    .bind(new_article.is_published)
    .bind(created_at)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| Error::from_db(e, "Article with this slug already exists"))?;

    let id = result.last_insert_rowid();
    tracing::info!(article_id = id, slug = %new_article.slug, "Created article");

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Article {} vanished after insert", id)))
}

/// Apply a partial update and return the new row
pub async fn update(pool: &SqlitePool, id: i64, changes: &ArticleUpdate) -> Result<Article> {
    let cover = changes.cover.as_ref();

    let result = sqlx::query(
        r#"
        UPDATE articles SET
            title = COALESCE(?, title),
            content = COALESCE(?, content),
            excerpt = COALESCE(?, excerpt),
            category = COALESCE(?, category),
            tags = COALESCE(?, tags),
            author = COALESCE(?, author),
            cover_image = COALESCE(?, cover_image),
            cover_original_name = CASE WHEN ? IS NULL THEN cover_original_name ELSE ? END,
            cover_size = COALESCE(?, cover_size),
            cover_type = COALESCE(?, cover_type),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&changes.title)
    .bind(&changes.content)
    .bind(&changes.excerpt)
    .bind(&changes.category)
    .bind(&changes.tags)
    .bind(&changes.author)
    .bind(cover.map(|c| c.filename.clone()))
    .bind(cover.map(|c| c.filename.clone()))
    .bind(cover.and_then(|c| c.original_name.clone()))
    .bind(cover.map(|c| c.size))
    .bind(cover.map(|c| c.mime_type.clone()))
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Article {}", id)));
    }

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Article {}", id)))
}

/// Replace cover metadata
pub async fn set_cover(pool: &SqlitePool, id: i64, cover: &CoverImage) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE articles SET cover_image = ?, cover_original_name = ?, cover_size = ?, \
         cover_type = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&cover.filename)
    .bind(&cover.original_name)
    .bind(cover.size)
    .bind(&cover.mime_type)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Null out all four cover columns
pub async fn clear_cover(pool: &SqlitePool, id: i64) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE articles SET cover_image = NULL, cover_original_name = NULL, cover_size = NULL, \
         cover_type = NULL, updated_at = ? WHERE id = ?",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Delete an article row, returning rows affected
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM articles WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory;

    fn article(title: &str, slug: &str, category: &str, published: bool) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            slug: slug.to_string(),
            excerpt: format!("About {}", title),
            content: "Body".to_string(),
            category: category.to_string(),
            tags: "recycle,plastic".to_string(),
            author: DEFAULT_AUTHOR.to_string(),
            read_time: DEFAULT_READ_TIME,
            is_published: published,
            cover: None,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_listing_filters_and_counts() {
        let pool = init_in_memory().await.unwrap();
        create(&pool, &article("Plastic Sorting", "plastic-sorting", "Tips", true)).await.unwrap();
        create(&pool, &article("Compost 101", "compost-101", "Guide", true)).await.unwrap();
        create(&pool, &article("Draft", "draft", "Tips", false)).await.unwrap();

        let all = ArticleFilter::default();
        assert_eq!(count_published(&pool, &all).await.unwrap(), 2);

        let tips = ArticleFilter {
            category: Some("Tips".to_string()),
            search: None,
        };
        let listed = list_published(&pool, &tips, 10, 0).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].slug, "plastic-sorting");

        let search = ArticleFilter {
            category: None,
            search: Some("COMPOST".to_string()),
        };
        assert_eq!(count_published(&pool, &search).await.unwrap(), 1);

        let cats = categories(&pool).await.unwrap();
        assert_eq!(cats.len(), 2);
        assert_eq!(cats[0].name, "Guide");
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_conflict() {
        let pool = init_in_memory().await.unwrap();
        create(&pool, &article("A", "same", "X", true)).await.unwrap();
        let err = create(&pool, &article("B", "same", "X", true)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_slug_prefix_count_escapes_wildcards() {
        let pool = init_in_memory().await.unwrap();
        create(&pool, &article("A", "a_b", "X", true)).await.unwrap();
        create(&pool, &article("A", "axb", "X", true)).await.unwrap();

        assert_eq!(count_slugs_with_prefix(&pool, "a_b").await.unwrap(), 1);
        assert_eq!(count_slugs_with_prefix(&pool, "a").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cover_set_and_clear() {
        let pool = init_in_memory().await.unwrap();
        let created = create(&pool, &article("Cover", "cover", "X", true)).await.unwrap();

        let cover = CoverImage {
            filename: "1-abcdef.jpg".to_string(),
            original_name: Some("photo.png".to_string()),
            size: 1234,
            mime_type: "image/jpeg".to_string(),
        };
        set_cover(&pool, created.id, &cover).await.unwrap();
        let loaded = find_by_id(&pool, created.id).await.unwrap().unwrap();
        assert_eq!(loaded.cover_image.as_deref(), Some("1-abcdef.jpg"));

        clear_cover(&pool, created.id).await.unwrap();
        let cleared = find_by_id(&pool, created.id).await.unwrap().unwrap();
        assert!(cleared.cover_image.is_none());
        assert!(cleared.cover_size.is_none());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let pool = init_in_memory().await.unwrap();
        let err = update(&pool, 42, &ArticleUpdate::default()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
