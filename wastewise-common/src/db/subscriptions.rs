//! Subscription persistence
//!
//! Status transitions are plain column updates; callers decide legality.

use crate::plan::{Plan, SubscriptionStatus};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use uuid::Uuid;

/// Subscription row
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    /// Raw gateway status (`settlement`, `pending`, `deny`, ...)
    pub payment_status: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub amount: f64,
    pub currency: String,
    /// Gateway order id
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Active and not yet expired at `now`
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active
            && self.end_date.map(|end| end > now).unwrap_or(false)
    }
}

/// Fields for a new subscription row
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: String,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub payment_status: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub amount: f64,
    pub currency: String,
    pub payment_id: Option<String>,
}

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan, status, payment_status, start_date, \
                                    end_date, amount, currency, payment_id, created_at, updated_at";

fn subscription_from_row(row: &SqliteRow) -> Result<Subscription> {
    let plan: String = row.try_get("plan")?;
    let status: String = row.try_get("status")?;

    Ok(Subscription {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        plan: plan.parse().map_err(Error::Internal)?,
        status: status.parse().map_err(Error::Internal)?,
        payment_status: row.try_get("payment_status")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        payment_id: row.try_get("payment_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Insert a subscription, returning its generated id
pub async fn create<'e, E>(exec: E, new_sub: &NewSubscription) -> Result<String>
where
    E: SqliteExecutor<'e>,
{
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO subscriptions (
            id, user_id, plan, status, payment_status, start_date, end_date,
            amount, currency, payment_id, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new_sub.user_id)
    .bind(new_sub.plan.as_str())
    .bind(new_sub.status.as_str())
    .bind(&new_sub.payment_status)
    .bind(new_sub.start_date)
    .bind(new_sub.end_date)
    .bind(new_sub.amount)
    .bind(&new_sub.currency)
    .bind(&new_sub.payment_id)
    .bind(now)
    .bind(now)
    .execute(exec)
    .await?;

    tracing::debug!(
        subscription_id = %id,
        user_id = %new_sub.user_id,
        status = %new_sub.status,
        "Created subscription"
    );

    Ok(id)
}

/// Load subscription by id
pub async fn find_by_id<'e, E>(exec: E, id: &str) -> Result<Option<Subscription>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!(
        "SELECT {} FROM subscriptions WHERE id = ?",
        SUBSCRIPTION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(exec)
    .await?;

    row.as_ref().map(subscription_from_row).transpose()
}

/// Load the subscription created for a gateway order id
pub async fn find_by_payment_id<'e, E>(exec: E, payment_id: &str) -> Result<Option<Subscription>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!(
        "SELECT {} FROM subscriptions WHERE payment_id = ? ORDER BY created_at DESC LIMIT 1",
        SUBSCRIPTION_COLUMNS
    ))
    .bind(payment_id)
    .fetch_optional(exec)
    .await?;

    row.as_ref().map(subscription_from_row).transpose()
}

/// Latest active premium subscription that has not expired at `now`
pub async fn find_current_premium<'e, E>(
    exec: E,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Subscription>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!(
        r#"
        SELECT {} FROM subscriptions
        WHERE user_id = ? AND plan = ? AND status = ? AND end_date IS NOT NULL AND end_date > ?
        ORDER BY created_at DESC
        LIMIT 1
        "#,
        SUBSCRIPTION_COLUMNS
    ))
    .bind(user_id)
    .bind(Plan::Premium.as_str())
    .bind(SubscriptionStatus::Active.as_str())
    .bind(now)
    .fetch_optional(exec)
    .await?;

    row.as_ref().map(subscription_from_row).transpose()
}

/// Mark a subscription active until `end_date`
pub async fn activate<'e, E>(
    exec: E,
    id: &str,
    payment_status: &str,
    end_date: DateTime<Utc>,
) -> Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE subscriptions SET status = ?, payment_status = ?, end_date = ?, updated_at = ? WHERE id = ?",
    )
    .bind(SubscriptionStatus::Active.as_str())
    .bind(payment_status)
    .bind(end_date)
    .bind(Utc::now())
    .bind(id)
    .execute(exec)
    .await?;

    Ok(result.rows_affected())
}

/// Set status and raw payment status
pub async fn set_status<'e, E>(
    exec: E,
    id: &str,
    status: SubscriptionStatus,
    payment_status: &str,
) -> Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE subscriptions SET status = ?, payment_status = ?, updated_at = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(payment_status)
    .bind(Utc::now())
    .bind(id)
    .execute(exec)
    .await?;

    Ok(result.rows_affected())
}

/// Pending premium subscriptions, newest first
pub async fn list_pending_premium(pool: &SqlitePool) -> Result<Vec<Subscription>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM subscriptions WHERE status = ? AND plan = ? ORDER BY created_at DESC",
        SUBSCRIPTION_COLUMNS
    ))
    .bind(SubscriptionStatus::Pending.as_str())
    .bind(Plan::Premium.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(subscription_from_row).collect()
}

/// Pending subscriptions that never received an end date
pub async fn list_pending_without_end_date(pool: &SqlitePool) -> Result<Vec<Subscription>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM subscriptions WHERE status = ? AND end_date IS NULL ORDER BY created_at",
        SUBSCRIPTION_COLUMNS
    ))
    .bind(SubscriptionStatus::Pending.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(subscription_from_row).collect()
}

/// Most recently created subscriptions
pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Subscription>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM subscriptions ORDER BY created_at DESC LIMIT ?",
        SUBSCRIPTION_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(subscription_from_row).collect()
}

/// Delete every subscription
pub async fn delete_all(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM subscriptions").execute(pool).await?;
    Ok(result.rows_affected())
}
