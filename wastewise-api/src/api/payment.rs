//! Premium checkout and Midtrans notifications
//!
//! Order ids have the form `PREMIUM-<unix-millis>-<0..999>-<userId>`; the
//! user id suffix is the fallback when no subscription row carries the order.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use wastewise_common::db::subscriptions::{self, NewSubscription, Subscription};
use wastewise_common::db::users::{self, NewUser};
use wastewise_common::plan::{one_month_after, DEFAULT_CURRENCY, PREMIUM_PRICE_IDR};
use wastewise_common::{Plan, SubscriptionStatus};

use super::StatusEnvelope;
use crate::services::midtrans_client::{
    BillingAddress, Callbacks, CreditCard, CustomerDetails, ItemDetail, SnapTransactionRequest,
    TransactionDetails,
};
use crate::{ApiError, ApiResult, AppState};

const ORDER_PREFIX: &str = "PREMIUM";
const LOCAL_FRONTEND_URL: &str = "http://localhost:3000";
const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub plan: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutSession {
    pub token: String,
    pub redirect_url: String,
    pub order_id: String,
}

#[derive(Debug, Serialize)]
pub struct NotificationAck {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientKeyResponse {
    pub status: &'static str,
    pub client_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ServerStatusResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub environment: &'static str,
    pub configured: bool,
}

/// Gateway outcome of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Paid,
    Pending,
    Failed,
}

impl PaymentOutcome {
    /// `settlement`, or `capture` with fraud status `accept`, counts as paid
    pub fn classify(transaction_status: &str, fraud_status: Option<&str>) -> Self {
        match transaction_status {
            "settlement" => PaymentOutcome::Paid,
            "capture" if fraud_status == Some("accept") => PaymentOutcome::Paid,
            "pending" => PaymentOutcome::Pending,
            _ => PaymentOutcome::Failed,
        }
    }
}

/// Build an order id for a premium checkout
pub fn order_id_for(user_id: &str) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!(
        "{}-{}-{}-{}",
        ORDER_PREFIX,
        Utc::now().timestamp_millis(),
        suffix,
        user_id
    )
}

/// User id embedded in an order id; ids may contain hyphens themselves
pub fn user_id_from_order(order_id: &str) -> Option<&str> {
    let mut parts = order_id.splitn(4, '-');
    if parts.next()? != ORDER_PREFIX {
        return None;
    }
    parts.next()?;
    parts.next()?;
    parts.next().filter(|id| !id.is_empty())
}

/// Notification fields arrive as strings or numbers depending on the channel
fn field_text(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// POST /api/payment/create-transaction
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(body): Json<CreateTransactionRequest>,
) -> ApiResult<Json<StatusEnvelope<CheckoutSession>>> {
    let plan: Option<Plan> = body.plan.as_deref().and_then(|p| p.parse().ok());
    if plan != Some(Plan::Premium) {
        return Err(ApiError::BadRequest(
            "Invalid plan. Only 'premium' is available".to_string(),
        ));
    }

    if let Some(amount) = body.amount {
        if amount != PREMIUM_PRICE_IDR as f64 {
            return Err(ApiError::BadRequest(format!(
                "Invalid amount. Premium plan costs {}",
                PREMIUM_PRICE_IDR
            )));
        }
    }

    let email = present(body.email)
        .ok_or_else(|| ApiError::BadRequest("Email is required".to_string()))?;
    let full_name = present(body.full_name);

    let user = match users::find_by_email(&state.db, &email).await? {
        Some(user) => user,
        None => {
            let created = users::create(
                &state.db,
                NewUser {
                    id: present(body.user_id),
                    email: email.clone(),
                    name: full_name.clone(),
                },
            )
            .await?;
            info!(user_id = %created.id, "Created user for checkout");
            created
        }
    };

    let current = subscriptions::find_current_premium(&state.db, &user.id, Utc::now()).await?;
    if user.plan == Plan::Premium || current.is_some() {
        return Err(ApiError::BadRequest(
            "User already has an active premium subscription".to_string(),
        ));
    }

    let order_id = order_id_for(&user.id);
    let customer_name = full_name
        .or_else(|| user.name.clone())
        .unwrap_or_else(|| email.clone());

    let frontend = if state.midtrans.is_production() {
        state.config.frontend_url.trim_end_matches('/').to_string()
    } else {
        LOCAL_FRONTEND_URL.to_string()
    };

    let request = SnapTransactionRequest {
        transaction_details: TransactionDetails {
            order_id: order_id.clone(),
            gross_amount: PREMIUM_PRICE_IDR,
        },
        credit_card: CreditCard { secure: true },
        customer_details: CustomerDetails {
            first_name: customer_name.clone(),
            email: email.clone(),
            phone: String::new(),
            billing_address: BillingAddress {
                first_name: customer_name,
                email: email.clone(),
                phone: String::new(),
            },
        },
        item_details: vec![ItemDetail {
            id: "PREMIUM-PLAN".to_string(),
            price: PREMIUM_PRICE_IDR,
            quantity: 1,
            name: "WasteWise AI Premium Plan".to_string(),
            brand: "WasteWise AI".to_string(),
            category: "Subscription".to_string(),
            merchant_name: "WasteWise AI".to_string(),
            description: "Monthly premium subscription".to_string(),
        }],
        callbacks: Callbacks {
            finish: format!("{}/payment/success", frontend),
            error: format!("{}/payment/error", frontend),
            pending: format!("{}/payment/pending", frontend),
        },
    };

    let snap = state.midtrans.create_snap_transaction(&request).await?;

    subscriptions::create(
        &state.db,
        &NewSubscription {
            user_id: user.id.clone(),
            plan: Plan::Premium,
            status: SubscriptionStatus::Pending,
            payment_status: Some("pending".to_string()),
            start_date: Utc::now(),
            end_date: None,
            amount: PREMIUM_PRICE_IDR as f64,
            currency: present(body.currency).unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            payment_id: Some(order_id.clone()),
        },
    )
    .await?;

    info!(user_id = %user.id, order_id = %order_id, "Created premium checkout");

    Ok(Json(StatusEnvelope::success(
        "Transaction created successfully",
        CheckoutSession {
            token: snap.token,
            redirect_url: snap.redirect_url,
            order_id,
        },
    )))
}

/// GET /api/payment/status/:order_id
pub async fn transaction_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> ApiResult<Json<StatusEnvelope<Value>>> {
    let status = state.midtrans.transaction_status(&order_id).await?;
    Ok(Json(StatusEnvelope::data(status)))
}

/// POST /api/payment/notification
pub async fn handle_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<Json<NotificationAck>> {
    let order_id = field_text(&body, "order_id");
    let transaction_status = field_text(&body, "transaction_status");
    let status_code = field_text(&body, "status_code").unwrap_or_default();
    let gross_amount = field_text(&body, "gross_amount").unwrap_or_default();
    let fraud_status = field_text(&body, "fraud_status");

    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| field_text(&body, "signature_key"));

    let verified = provided.as_deref().is_some_and(|sig| {
        state.midtrans.verify_notification(
            order_id.as_deref().unwrap_or_default(),
            &status_code,
            &gross_amount,
            sig,
        )
    });

    if !verified {
        if state.midtrans.is_production() {
            warn!(order_id = ?order_id, "Rejected notification with invalid signature");
            return Err(ApiError::Forbidden("Invalid signature".to_string()));
        }
        warn!(order_id = ?order_id, "Notification signature not verified (sandbox)");
    }

    let (order_id, transaction_status) = match (order_id, transaction_status) {
        (Some(order_id), Some(status)) => (order_id, status),
        _ => {
            return Err(ApiError::BadRequest(
                "order_id and transaction_status are required".to_string(),
            ))
        }
    };

    let subscription = subscriptions::find_by_payment_id(&state.db, &order_id).await?;

    let user_id = match &subscription {
        Some(sub) => sub.user_id.clone(),
        None => user_id_from_order(&order_id)
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid order id: {}", order_id)))?,
    };

    if users::find_by_id(&state.db, &user_id).await?.is_none() {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let outcome = PaymentOutcome::classify(&transaction_status, fraud_status.as_deref());
    info!(
        order_id = %order_id,
        user_id = %user_id,
        transaction_status = %transaction_status,
        outcome = ?outcome,
        "Processing payment notification"
    );

    match outcome {
        PaymentOutcome::Paid => {
            apply_payment(&state, &user_id, &order_id, &transaction_status, subscription).await?
        }
        PaymentOutcome::Pending => match subscription {
            Some(sub) if sub.status == SubscriptionStatus::Active => {
                info!(subscription_id = %sub.id, "Ignoring pending for active subscription");
            }
            Some(sub) => {
                subscriptions::set_status(
                    &state.db,
                    &sub.id,
                    SubscriptionStatus::Pending,
                    &transaction_status,
                )
                .await?;
            }
            None => {
                subscriptions::create(
                    &state.db,
                    &premium_subscription(
                        &user_id,
                        &order_id,
                        SubscriptionStatus::Pending,
                        &transaction_status,
                    ),
                )
                .await?;
            }
        },
        PaymentOutcome::Failed => match subscription {
            Some(sub) => {
                subscriptions::set_status(
                    &state.db,
                    &sub.id,
                    SubscriptionStatus::Failed,
                    &transaction_status,
                )
                .await?;
            }
            None => warn!(order_id = %order_id, "Failed payment for unknown subscription"),
        },
    }

    Ok(Json(NotificationAck {
        status: "success",
        message: "Notification processed",
    }))
}

fn premium_subscription(
    user_id: &str,
    order_id: &str,
    status: SubscriptionStatus,
    payment_status: &str,
) -> NewSubscription {
    let now = Utc::now();
    NewSubscription {
        user_id: user_id.to_string(),
        plan: Plan::Premium,
        status,
        payment_status: Some(payment_status.to_string()),
        start_date: now,
        end_date: (status == SubscriptionStatus::Active).then(|| one_month_after(now)),
        amount: PREMIUM_PRICE_IDR as f64,
        currency: DEFAULT_CURRENCY.to_string(),
        payment_id: Some(order_id.to_string()),
    }
}

/// Upgrade the user and activate the subscription in one transaction
///
/// A redelivered notification for an already active subscription changes
/// nothing, so usage is not reset twice.
async fn apply_payment(
    state: &AppState,
    user_id: &str,
    order_id: &str,
    payment_status: &str,
    subscription: Option<Subscription>,
) -> ApiResult<()> {
    if let Some(sub) = &subscription {
        if sub.status == SubscriptionStatus::Active {
            info!(subscription_id = %sub.id, "Subscription already active");
            return Ok(());
        }
    }

    let mut tx = state.db.begin().await.map_err(wastewise_common::Error::from)?;

    users::upgrade_to_premium(&mut *tx, user_id).await?;

    match subscription {
        Some(sub) => {
            subscriptions::activate(&mut *tx, &sub.id, payment_status, one_month_after(Utc::now()))
                .await?;
        }
        None => {
            subscriptions::create(
                &mut *tx,
                &premium_subscription(
                    user_id,
                    order_id,
                    SubscriptionStatus::Active,
                    payment_status,
                ),
            )
            .await?;
        }
    }

    tx.commit().await.map_err(wastewise_common::Error::from)?;

    info!(user_id = %user_id, order_id = %order_id, "Premium activated");
    Ok(())
}

/// GET /api/payment/client-key
pub async fn client_key(State(state): State<AppState>) -> Json<ClientKeyResponse> {
    Json(ClientKeyResponse {
        status: "success",
        client_key: state.midtrans.client_key().map(str::to_string),
    })
}

/// GET /api/payment/server-status
pub async fn server_status(State(state): State<AppState>) -> Json<ServerStatusResponse> {
    Json(ServerStatusResponse {
        status: "success",
        message: "Payment server is running",
        environment: state.midtrans.config().mode.as_str(),
        configured: state.midtrans.config().is_configured(),
    })
}

/// Build payment routes
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/payment/create-transaction", post(create_transaction))
        .route("/api/payment/status/:order_id", get(transaction_status))
        .route("/api/payment/notification", post(handle_notification))
        .route("/api/payment/client-key", get(client_key))
        .route("/api/payment/server-status", get(server_status))
}
