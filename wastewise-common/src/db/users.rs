//! User account persistence

use crate::plan::{Plan, FREE_USAGE_LIMIT, PREMIUM_USAGE_LIMIT};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use uuid::Uuid;

/// User account row
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub plan: Plan,
    pub usage_count: i64,
    pub usage_limit: i64,
    pub last_usage_reset: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new free-plan user
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    /// Identity-provider id; a UUID is generated when absent
    pub id: Option<String>,
    pub email: String,
    pub name: Option<String>,
}

const USER_COLUMNS: &str = "id, email, name, phone, plan, usage_count, usage_limit, \
                            last_usage_reset, created_at, updated_at";

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let plan_str: String = row.try_get("plan")?;
    let plan = plan_str.parse::<Plan>().map_err(Error::Internal)?;

    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        plan,
        usage_count: row.try_get("usage_count")?,
        usage_limit: row.try_get("usage_limit")?,
        last_usage_reset: row.try_get("last_usage_reset")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Load user by primary key
pub async fn find_by_id<'e, E>(exec: E, id: &str) -> Result<Option<User>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(exec)
        .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Load user by email
pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(email)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Load user matching both email and id
pub async fn find_by_email_and_id(
    pool: &SqlitePool,
    email: &str,
    id: &str,
) -> Result<Option<User>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE email = ? AND id = ?",
        USER_COLUMNS
    ))
    .bind(email)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Load user matching email, or id when one is given
///
/// An email match wins over an id match.
pub async fn find_by_email_or_id(
    pool: &SqlitePool,
    email: &str,
    id: Option<&str>,
) -> Result<Option<User>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE email = ?1 OR (?2 IS NOT NULL AND id = ?2) \
         ORDER BY CASE WHEN email = ?1 THEN 0 ELSE 1 END LIMIT 1",
        USER_COLUMNS
    ))
    .bind(email)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Insert a new free-plan user
///
/// Duplicate email or id maps to `Error::Conflict`.
pub async fn create(pool: &SqlitePool, new_user: NewUser) -> Result<User> {
    let id = new_user
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO users (
            id, email, name, plan, usage_count, usage_limit,
            last_usage_reset, created_at, updated_at
        ) VALUES (?, ?, ?, ?, 0, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new_user.email)
    .bind(&new_user.name)
    .bind(Plan::Free.as_str())
    .bind(FREE_USAGE_LIMIT)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| Error::from_db(e, "A user with this email or id already exists"))?;

    tracing::info!(user_id = %id, "Created user");

    find_by_id(pool, &id)
        .await?
        .ok_or_else(|| Error::Internal(format!("User {} vanished after insert", id)))
}

/// Update email and name, keeping plan and usage counters
pub async fn update_identity(
    pool: &SqlitePool,
    id: &str,
    email: &str,
    name: Option<&str>,
) -> Result<User> {
    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, name = COALESCE(?, name),
            last_usage_reset = COALESCE(last_usage_reset, ?),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(email)
    .bind(name)
    .bind(Utc::now())
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| Error::from_db(e, "Another user already uses this email"))?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {}", id)))
}

/// Move a user to `plan` with that plan's usage limit
///
/// Usage count is left untouched.
pub async fn set_plan<'e, E>(exec: E, id: &str, plan: Plan) -> Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE users SET plan = ?, usage_limit = ?, updated_at = ? WHERE id = ?",
    )
    .bind(plan.as_str())
    .bind(plan.usage_limit())
    .bind(Utc::now())
    .bind(id)
    .execute(exec)
    .await?;

    Ok(result.rows_affected())
}

/// Premium upgrade after a successful payment: limit raised, usage reset
pub async fn upgrade_to_premium<'e, E>(exec: E, id: &str) -> Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        UPDATE users
        SET plan = ?, usage_limit = ?, usage_count = 0, last_usage_reset = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(Plan::Premium.as_str())
    .bind(PREMIUM_USAGE_LIMIT)
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(exec)
    .await?;

    Ok(result.rows_affected())
}

/// Most recently created users
pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC LIMIT ?",
        USER_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(user_from_row).collect()
}

/// Reset every free user's usage limit to the free quota
pub async fn reset_free_limits(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("UPDATE users SET usage_limit = ?, updated_at = ? WHERE plan = ?")
        .bind(FREE_USAGE_LIMIT)
        .bind(Utc::now())
        .bind(Plan::Free.as_str())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Delete every user (subscriptions cascade)
pub async fn delete_all(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM users").execute(pool).await?;
    Ok(result.rows_affected())
}
