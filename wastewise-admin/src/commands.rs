//! Maintenance operations against the service database

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use wastewise_common::db::subscriptions::{self, Subscription};
use wastewise_common::db::users::{self, User};
use wastewise_common::plan::one_month_after;
use wastewise_common::Result;

/// Recent users and subscriptions
#[derive(Debug)]
pub struct StatusReport {
    pub users: Vec<User>,
    pub subscriptions: Vec<Subscription>,
}

pub async fn status(pool: &SqlitePool, limit: i64) -> Result<StatusReport> {
    Ok(StatusReport {
        users: users::list_recent(pool, limit).await?,
        subscriptions: subscriptions::list_recent(pool, limit).await?,
    })
}

/// Pending premium subscriptions, optionally only those of `email`
pub async fn pending_premium(pool: &SqlitePool, email: Option<&str>) -> Result<Vec<Subscription>> {
    let pending = subscriptions::list_pending_premium(pool).await?;

    let Some(email) = email else {
        return Ok(pending);
    };

    match users::find_by_email(pool, email).await? {
        Some(user) => Ok(pending.into_iter().filter(|s| s.user_id == user.id).collect()),
        None => Ok(Vec::new()),
    }
}

/// Activate `sub` from now for one month and upgrade its owner
async fn activate_one(
    pool: &SqlitePool,
    sub: &Subscription,
    start: chrono::DateTime<Utc>,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    users::upgrade_to_premium(&mut *tx, &sub.user_id).await?;
    subscriptions::activate(&mut *tx, &sub.id, "settlement", one_month_after(start)).await?;
    tx.commit().await?;

    info!(subscription_id = %sub.id, user_id = %sub.user_id, "Activated subscription");
    Ok(())
}

/// Activate the given pending subscriptions one month from now
pub async fn activate_pending(pool: &SqlitePool, pending: &[Subscription]) -> Result<usize> {
    let now = Utc::now();
    for sub in pending {
        activate_one(pool, sub, now).await?;
    }
    Ok(pending.len())
}

/// Give pending subscriptions without an end date `start_date + 1 month`
/// and activate them
pub async fn fix_end_dates(pool: &SqlitePool) -> Result<usize> {
    let pending = subscriptions::list_pending_without_end_date(pool).await?;
    for sub in &pending {
        activate_one(pool, sub, sub.start_date).await?;
    }
    Ok(pending.len())
}

pub async fn reset_free_limits(pool: &SqlitePool) -> Result<u64> {
    users::reset_free_limits(pool).await
}

/// Delete every subscription and user, returning `(subscriptions, users)`
pub async fn clean_users(pool: &SqlitePool) -> Result<(u64, u64)> {
    let subs = subscriptions::delete_all(pool).await?;
    let users = users::delete_all(pool).await?;
    Ok((subs, users))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use wastewise_common::db::init_in_memory;
    use wastewise_common::db::subscriptions::NewSubscription;
    use wastewise_common::db::users::NewUser;
    use wastewise_common::{Plan, SubscriptionStatus};

    async fn user(pool: &SqlitePool, email: &str) -> User {
        users::create(
            pool,
            NewUser {
                id: None,
                email: email.to_string(),
                name: None,
            },
        )
        .await
        .unwrap()
    }

    async fn pending(pool: &SqlitePool, user_id: &str, start: chrono::DateTime<Utc>) -> String {
        subscriptions::create(
            pool,
            &NewSubscription {
                user_id: user_id.to_string(),
                plan: Plan::Premium,
                status: SubscriptionStatus::Pending,
                payment_status: Some("pending".to_string()),
                start_date: start,
                end_date: None,
                amount: 99_000.0,
                currency: "IDR".to_string(),
                payment_id: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_activate_pending_filters_by_email() {
        let pool = init_in_memory().await.unwrap();
        let a = user(&pool, "a@example.com").await;
        let b = user(&pool, "b@example.com").await;
        pending(&pool, &a.id, Utc::now()).await;
        pending(&pool, &b.id, Utc::now()).await;

        let only_a = pending_premium(&pool, Some("a@example.com")).await.unwrap();
        assert_eq!(only_a.len(), 1);
        assert!(pending_premium(&pool, Some("nobody@example.com")).await.unwrap().is_empty());

        assert_eq!(activate_pending(&pool, &only_a).await.unwrap(), 1);

        let a = users::find_by_id(&pool, &a.id).await.unwrap().unwrap();
        let b = users::find_by_id(&pool, &b.id).await.unwrap().unwrap();
        assert_eq!(a.plan, Plan::Premium);
        assert_eq!(b.plan, Plan::Free);
        assert_eq!(pending_premium(&pool, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fix_end_dates_counts_from_start() {
        let pool = init_in_memory().await.unwrap();
        let u = user(&pool, "late@example.com").await;
        let start = Utc::now() - Duration::days(10);
        let id = pending(&pool, &u.id, start).await;

        assert_eq!(fix_end_dates(&pool).await.unwrap(), 1);

        let sub = subscriptions::find_by_id(&pool, &id).await.unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.end_date, Some(one_month_after(sub.start_date)));
        assert_eq!(fix_end_dates(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reset_and_clean() {
        let pool = init_in_memory().await.unwrap();
        let u = user(&pool, "c@example.com").await;
        sqlx::query("UPDATE users SET usage_limit = 3 WHERE id = ?")
            .bind(&u.id)
            .execute(&pool)
            .await
            .unwrap();
        pending(&pool, &u.id, Utc::now()).await;

        assert_eq!(reset_free_limits(&pool).await.unwrap(), 1);
        let u = users::find_by_id(&pool, &u.id).await.unwrap().unwrap();
        assert_eq!(u.usage_limit, 30);

        let report = status(&pool, 10).await.unwrap();
        assert_eq!(report.users.len(), 1);
        assert_eq!(report.subscriptions.len(), 1);

        assert_eq!(clean_users(&pool).await.unwrap(), (1, 1));
        let report = status(&pool, 10).await.unwrap();
        assert!(report.users.is_empty());
    }
}
