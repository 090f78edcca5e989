//! User account endpoints
//!
//! Identity lives with the frontend's auth provider; these routes only
//! mirror accounts locally and report plan state.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use wastewise_common::db::{subscriptions, users};
use wastewise_common::db::users::{NewUser, User};
use wastewise_common::Plan;

use super::StatusEnvelope;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckUserRequest {
    pub email: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SyncUserRequest {
    pub id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoRequest {
    pub email: Option<String>,
    pub provider_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
    pub plan: Plan,
}

/// Profile with usage counters
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub plan: Plan,
    pub usage_limit: i64,
    pub usage_count: i64,
    pub last_usage_reset: Option<DateTime<Utc>>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            plan: user.plan,
            usage_limit: user.usage_limit,
            usage_count: user.usage_count,
            last_usage_reset: user.last_usage_reset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    Active,
    Inactive,
}

/// `GET /api/users/:id` payload with plan reconciled against subscriptions
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub plan: Plan,
    pub usage_count: i64,
    pub usage_limit: i64,
    pub subscription_status: SubscriptionState,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_usage_reset: Option<DateTime<Utc>>,
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// POST /api/users/check
pub async fn check_user(
    State(state): State<AppState>,
    Json(body): Json<CheckUserRequest>,
) -> ApiResult<Json<StatusEnvelope<UserIdentity>>> {
    let (email, user_id) = match (present(body.email), present(body.user_id)) {
        (Some(email), Some(user_id)) => (email, user_id),
        _ => return Err(ApiError::BadRequest("Email and userId are required".to_string())),
    };

    let user = users::find_by_email_and_id(&state.db, &email, &user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(StatusEnvelope::success(
        "User exists",
        UserIdentity {
            id: user.id,
            email: user.email,
            plan: user.plan,
        },
    )))
}

/// POST /api/users/sync
pub async fn sync_user(
    State(state): State<AppState>,
    Json(body): Json<SyncUserRequest>,
) -> ApiResult<Json<StatusEnvelope<UserProfile>>> {
    let email = present(body.email)
        .ok_or_else(|| ApiError::BadRequest("Email is required".to_string()))?;
    let id = present(body.id);
    let name = present(body.name);

    let user = match users::find_by_email_or_id(&state.db, &email, id.as_deref()).await? {
        Some(existing) => {
            users::update_identity(&state.db, &existing.id, &email, name.as_deref()).await?
        }
        None => {
            let created = users::create(
                &state.db,
                NewUser {
                    id,
                    email,
                    name,
                },
            )
            .await?;
            info!(user_id = %created.id, "Synced new user");
            created
        }
    };

    Ok(Json(StatusEnvelope::success(
        "User synced successfully",
        user.into(),
    )))
}

/// POST /api/users/profile
pub async fn user_profile(
    State(state): State<AppState>,
    Json(body): Json<ProfileRequest>,
) -> ApiResult<Json<StatusEnvelope<UserProfile>>> {
    let id =
        present(body.id).ok_or_else(|| ApiError::BadRequest("User ID is required".to_string()))?;

    let user = users::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(StatusEnvelope::data(user.into())))
}

/// POST /api/users/info
pub async fn user_info(
    State(state): State<AppState>,
    Json(body): Json<UserInfoRequest>,
) -> ApiResult<Json<StatusEnvelope<UserProfile>>> {
    let email = present(body.email)
        .ok_or_else(|| ApiError::BadRequest("Email is required".to_string()))?;

    let user = match users::find_by_email(&state.db, &email).await? {
        Some(user) => user,
        None => {
            users::create(
                &state.db,
                NewUser {
                    id: present(body.provider_id),
                    email,
                    name: None,
                },
            )
            .await?
        }
    };

    Ok(Json(StatusEnvelope::success(
        "User info retrieved successfully",
        user.into(),
    )))
}

/// GET /api/users/:id
///
/// The stored plan is corrected when it disagrees with subscriptions: only
/// an active, unexpired premium subscription keeps an account premium.
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusEnvelope<UserAccount>>> {
    let mut user = users::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let current = subscriptions::find_current_premium(&state.db, &user.id, Utc::now()).await?;
    let plan = if current.is_some() { Plan::Premium } else { Plan::Free };

    if plan != user.plan {
        info!(user_id = %user.id, from = %user.plan, to = %plan, "Reconciling user plan");
        users::set_plan(&state.db, &user.id, plan).await?;
        user.plan = plan;
        user.usage_limit = plan.usage_limit();
    }

    Ok(Json(StatusEnvelope::success(
        "User data retrieved successfully",
        UserAccount {
            id: user.id,
            email: user.email,
            full_name: user.name,
            plan: user.plan,
            usage_count: user.usage_count,
            usage_limit: user.usage_limit,
            subscription_status: if current.is_some() {
                SubscriptionState::Active
            } else {
                SubscriptionState::Inactive
            },
            subscription_end_date: current.and_then(|s| s.end_date),
            created_at: user.created_at,
            last_usage_reset: user.last_usage_reset,
        },
    )))
}

/// Build user routes
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/check", post(check_user))
        .route("/api/users/sync", post(sync_user))
        .route("/api/users/profile", post(user_profile))
        .route("/api/users/info", post(user_info))
        .route("/api/users/:id", get(get_user))
}
