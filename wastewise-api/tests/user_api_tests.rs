//! User account endpoints

mod helpers;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use helpers::{create_test_app, get, json_request};
use serde_json::json;
use wastewise_common::db::subscriptions::{self, NewSubscription};
use wastewise_common::db::users;
use wastewise_common::{Plan, SubscriptionStatus};

#[tokio::test]
async fn test_sync_creates_then_updates() {
    let app = create_test_app().await;

    let (status, json) = app
        .send(json_request(
            "POST",
            "/api/users/sync",
            &json!({"id": "auth-1", "email": "ana@example.com", "name": "Ana"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["status"], "success");
    assert_eq!(json["data"]["id"], "auth-1");
    assert_eq!(json["data"]["plan"], "free");
    assert_eq!(json["data"]["usageLimit"], 30);

    let (status, json) = app
        .send(json_request(
            "POST",
            "/api/users/sync",
            &json!({"email": "ana@example.com", "name": "Ana Maria"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["id"], "auth-1");
    assert_eq!(json["data"]["name"], "Ana Maria");

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(count.0, 1);
}

#[tokio::test]
async fn test_check_user() {
    let app = create_test_app().await;
    users::create(
        &app.pool,
        users::NewUser {
            id: Some("auth-2".to_string()),
            email: "budi@example.com".to_string(),
            name: None,
        },
    )
    .await
    .unwrap();

    let (status, json) = app
        .send(json_request(
            "POST",
            "/api/users/check",
            &json!({"email": "budi@example.com", "userId": "auth-2"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "User exists");
    assert_eq!(json["data"]["plan"], "free");

    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/users/check",
            &json!({"email": "budi@example.com", "userId": "someone-else"}),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(json_request("POST", "/api/users/check", &json!({"email": "budi@example.com"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_profile_and_info() {
    let app = create_test_app().await;

    let (status, json) = app
        .send(json_request(
            "POST",
            "/api/users/info",
            &json!({"email": "citra@example.com", "providerId": "auth-3"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["id"], "auth-3");

    let (status, json) = app
        .send(json_request("POST", "/api/users/profile", &json!({"id": "auth-3"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["email"], "citra@example.com");
    assert_eq!(json["data"]["usageCount"], 0);

    let (status, _) = app
        .send(json_request("POST", "/api/users/profile", &json!({"id": "nobody"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(json_request("POST", "/api/users/profile", &json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_user_reconciles_plan_with_subscriptions() {
    let app = create_test_app().await;
    let user = users::create(
        &app.pool,
        users::NewUser {
            id: None,
            email: "dewi@example.com".to_string(),
            name: Some("Dewi".to_string()),
        },
    )
    .await
    .unwrap();

    // Premium flag without a backing subscription is downgraded
    users::set_plan(&app.pool, &user.id, Plan::Premium).await.unwrap();
    let (status, json) = app.send(get(&format!("/api/users/{}", user.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["plan"], "free");
    assert_eq!(json["data"]["usageLimit"], 30);
    assert_eq!(json["data"]["subscriptionStatus"], "inactive");
    assert_eq!(json["data"]["fullName"], "Dewi");

    // An active, unexpired subscription makes the account premium
    let now = Utc::now();
    subscriptions::create(
        &app.pool,
        &NewSubscription {
            user_id: user.id.clone(),
            plan: Plan::Premium,
            status: SubscriptionStatus::Active,
            payment_status: Some("settlement".to_string()),
            start_date: now,
            end_date: Some(now + Duration::days(30)),
            amount: 99_000.0,
            currency: "IDR".to_string(),
            payment_id: Some("PREMIUM-1-1-x".to_string()),
        },
    )
    .await
    .unwrap();

    let (_, json) = app.send(get(&format!("/api/users/{}", user.id))).await;
    assert_eq!(json["data"]["plan"], "premium");
    assert_eq!(json["data"]["usageLimit"], 10000);
    assert_eq!(json["data"]["subscriptionStatus"], "active");
    assert!(json["data"]["subscriptionEndDate"].is_string());

    let stored = users::find_by_id(&app.pool, &user.id).await.unwrap().unwrap();
    assert_eq!(stored.plan, Plan::Premium);

    let (status, _) = app.send(get("/api/users/unknown")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
