//! Waste bank directory endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use wastewise_common::db::waste_banks::{self, NewWasteBank, WasteBank, WasteBankUpdate};

use crate::services::geo::{distance_text, haversine_km};
use crate::{ApiError, ApiResult, AppState};

const DEFAULT_RADIUS_KM: f64 = 50.0;
const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct WasteBankQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius: Option<f64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
}

/// Listing entry; distance fields only when the caller gave a position
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WasteBankEntry {
    #[serde(flatten)]
    pub bank: WasteBank,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WasteBankListResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<WasteBankEntry>,
}

#[derive(Debug, Serialize)]
pub struct WasteBankResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub data: WasteBank,
}

#[derive(Debug, Serialize)]
pub struct WasteBankDeleted {
    pub success: bool,
    pub message: &'static str,
}

/// Numeric field that may arrive as a JSON number or a numeric string
///
/// `None` when absent. Out-of-range or non-numeric values are rejected.
fn coordinate(
    body: &Map<String, Value>,
    key: &str,
    limit: f64,
    label: &str,
) -> ApiResult<Option<f64>> {
    let value = match body.get(key) {
        None => return Ok(None),
        Some(v) => v,
    };

    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite());

    match parsed {
        Some(v) if (-limit..=limit).contains(&v) => Ok(Some(v)),
        _ => Err(ApiError::BadRequest(format!(
            "{} must be a valid number between -{} and {}",
            label, limit, limit
        ))),
    }
}

/// Optional text field
///
/// Absent → `None`; null or blank → `Some(None)`; otherwise trimmed.
fn text(body: &Map<String, Value>, key: &str) -> ApiResult<Option<Option<String>>> {
    match body.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            Ok(Some(if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }))
        }
        Some(_) => Err(ApiError::BadRequest(format!("Field '{}' must be a string", key))),
    }
}

/// GET /api/waste-banks
pub async fn list_waste_banks(
    State(state): State<AppState>,
    Query(query): Query<WasteBankQuery>,
) -> ApiResult<Json<WasteBankListResponse>> {
    let banks = waste_banks::list_active(&state.db, query.search.as_deref()).await?;

    let mut entries: Vec<WasteBankEntry> = match (query.lat, query.lng) {
        (Some(lat), Some(lng)) => {
            let radius = query.radius.unwrap_or(DEFAULT_RADIUS_KM);
            let mut nearby: Vec<WasteBankEntry> = banks
                .into_iter()
                .filter_map(|bank| {
                    let km = haversine_km(lat, lng, bank.latitude, bank.longitude);
                    (km <= radius).then(|| WasteBankEntry {
                        bank,
                        distance: Some(km),
                        distance_text: Some(distance_text(km)),
                    })
                })
                .collect();
            nearby.sort_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            nearby
        }
        _ => banks
            .into_iter()
            .map(|bank| WasteBankEntry {
                bank,
                distance: None,
                distance_text: None,
            })
            .collect(),
    };

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if limit > 0 {
        entries.truncate(limit as usize);
    }

    Ok(Json(WasteBankListResponse {
        success: true,
        count: entries.len(),
        data: entries,
    }))
}

/// GET /api/waste-banks/:id
pub async fn get_waste_bank(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WasteBankResponse>> {
    let bank = waste_banks::find_active(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Waste bank not found".to_string()))?;

    Ok(Json(WasteBankResponse {
        success: true,
        message: None,
        data: bank,
    }))
}

/// POST /api/waste-banks
pub async fn create_waste_bank(
    State(state): State<AppState>,
    Json(body): Json<Map<String, Value>>,
) -> ApiResult<(StatusCode, Json<WasteBankResponse>)> {
    let name = text(&body, "nama")?.flatten();
    let address = text(&body, "alamat")?.flatten();
    let latitude = coordinate(&body, "latitude", 90.0, "Latitude")?;
    let longitude = coordinate(&body, "longitude", 180.0, "Longitude")?;

    let (name, address, latitude, longitude) = match (name, address, latitude, longitude) {
        (Some(n), Some(a), Some(lat), Some(lng)) => (n, a, lat, lng),
        _ => {
            return Err(ApiError::BadRequest(
                "Name, address, latitude, and longitude are required".to_string(),
            ))
        }
    };

    let new_bank = NewWasteBank {
        name,
        address,
        latitude,
        longitude,
        phone: text(&body, "telepon")?.flatten(),
        email: text(&body, "email")?.flatten(),
        opening_hours: text(&body, "jamOperasi")?.flatten(),
        waste_types: text(&body, "jenisWaste")?.flatten(),
        description: text(&body, "deskripsi")?.flatten(),
    };

    let bank = waste_banks::create(&state.db, &new_bank).await?;

    Ok((
        StatusCode::CREATED,
        Json(WasteBankResponse {
            success: true,
            message: Some("Waste bank created successfully"),
            data: bank,
        }),
    ))
}

/// PUT /api/waste-banks/:id
pub async fn update_waste_bank(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> ApiResult<Json<WasteBankResponse>> {
    let required_text = |key: &str, label: &str| -> ApiResult<Option<String>> {
        match text(&body, key)? {
            None => Ok(None),
            Some(Some(v)) => Ok(Some(v)),
            Some(None) => Err(ApiError::BadRequest(format!("{} cannot be empty", label))),
        }
    };

    let changes = WasteBankUpdate {
        name: required_text("nama", "Name")?,
        address: required_text("alamat", "Address")?,
        latitude: coordinate(&body, "latitude", 90.0, "Latitude")?,
        longitude: coordinate(&body, "longitude", 180.0, "Longitude")?,
        phone: text(&body, "telepon")?,
        email: text(&body, "email")?,
        opening_hours: text(&body, "jamOperasi")?,
        waste_types: text(&body, "jenisWaste")?,
        description: text(&body, "deskripsi")?,
    };

    let bank = waste_banks::update(&state.db, &id, &changes)
        .await
        .map_err(|e| match e {
            wastewise_common::Error::NotFound(_) => {
                ApiError::NotFound("Waste bank not found".to_string())
            }
            other => other.into(),
        })?;

    Ok(Json(WasteBankResponse {
        success: true,
        message: Some("Waste bank updated successfully"),
        data: bank,
    }))
}

/// DELETE /api/waste-banks/:id
pub async fn delete_waste_bank(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WasteBankDeleted>> {
    if waste_banks::deactivate(&state.db, &id).await? == 0 {
        return Err(ApiError::NotFound("Waste bank not found".to_string()));
    }

    Ok(Json(WasteBankDeleted {
        success: true,
        message: "Waste bank deleted successfully",
    }))
}

/// Build waste bank routes
pub fn waste_bank_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/waste-banks",
            get(list_waste_banks).post(create_waste_bank),
        )
        .route(
            "/api/waste-banks/:id",
            get(get_waste_bank)
                .put(update_waste_bank)
                .delete(delete_waste_bank),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_coordinate_accepts_numbers_and_strings() {
        let b = body(json!({"latitude": "-6.25", "longitude": 106.8}));
        assert_eq!(coordinate(&b, "latitude", 90.0, "Latitude").unwrap(), Some(-6.25));
        assert_eq!(coordinate(&b, "longitude", 180.0, "Longitude").unwrap(), Some(106.8));
        assert_eq!(coordinate(&b, "missing", 90.0, "X").unwrap(), None);
    }

    #[test]
    fn test_coordinate_rejects_out_of_range_and_garbage() {
        let b = body(json!({"latitude": 91, "longitude": "east", "alt": null}));
        assert!(coordinate(&b, "latitude", 90.0, "Latitude").is_err());
        assert!(coordinate(&b, "longitude", 180.0, "Longitude").is_err());
        assert!(coordinate(&b, "alt", 90.0, "Alt").is_err());
    }

    #[test]
    fn test_text_trims_and_blanks_to_null() {
        let b = body(json!({"nama": "  Bank  ", "telepon": "   ", "email": null, "jamOperasi": 5}));
        assert_eq!(text(&b, "nama").unwrap(), Some(Some("Bank".to_string())));
        assert_eq!(text(&b, "telepon").unwrap(), Some(None));
        assert_eq!(text(&b, "email").unwrap(), Some(None));
        assert_eq!(text(&b, "deskripsi").unwrap(), None);
        assert!(text(&b, "jamOperasi").is_err());
    }
}
