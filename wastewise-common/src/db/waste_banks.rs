//! Waste bank persistence
//!
//! Deletion is soft: rows are flagged inactive and disappear from reads.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

/// Waste bank row, serialized with the frontend's field names
///
/// Empty optional fields are omitted from JSON.
#[derive(Debug, Clone, Serialize)]
pub struct WasteBank {
    pub id: String,
    #[serde(rename = "nama")]
    pub name: String,
    #[serde(rename = "alamat")]
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "telepon", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "jamOperasi", skip_serializing_if = "Option::is_none")]
    pub opening_hours: Option<String>,
    #[serde(rename = "jenisWaste", skip_serializing_if = "Option::is_none")]
    pub waste_types: Option<String>,
    #[serde(rename = "deskripsi", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Validated fields for a new waste bank
#[derive(Debug, Clone, Default)]
pub struct NewWasteBank {
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub opening_hours: Option<String>,
    pub waste_types: Option<String>,
    pub description: Option<String>,
}

/// Partial update
///
/// Outer `None` leaves a column alone; `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default)]
pub struct WasteBankUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub opening_hours: Option<Option<String>>,
    pub waste_types: Option<Option<String>>,
    pub description: Option<Option<String>>,
}

impl WasteBankUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.address.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.opening_hours.is_none()
            && self.waste_types.is_none()
            && self.description.is_none()
    }
}

const WASTE_BANK_COLUMNS: &str = "id, name, address, latitude, longitude, phone, email, \
                                  opening_hours, waste_types, description, is_active, \
                                  created_at, updated_at";

fn waste_bank_from_row(row: &SqliteRow) -> Result<WasteBank> {
    Ok(WasteBank {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        address: row.try_get("address")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        opening_hours: row.try_get("opening_hours")?,
        waste_types: row.try_get("waste_types")?,
        description: row.try_get("description")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Active waste banks, newest first
///
/// `search` matches name or address, case-insensitive.
pub async fn list_active(pool: &SqlitePool, search: Option<&str>) -> Result<Vec<WasteBank>> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM waste_banks WHERE is_active = 1",
        WASTE_BANK_COLUMNS
    ));

    if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", term.to_lowercase());
        builder
            .push(" AND (LOWER(name) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(address) LIKE ")
            .push_bind(pattern)
            .push(")");
    }

    builder.push(" ORDER BY created_at DESC");

    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(waste_bank_from_row).collect()
}

/// Load an active waste bank
pub async fn find_active(pool: &SqlitePool, id: &str) -> Result<Option<WasteBank>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM waste_banks WHERE id = ? AND is_active = 1",
        WASTE_BANK_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(waste_bank_from_row).transpose()
}

async fn find_any(pool: &SqlitePool, id: &str) -> Result<Option<WasteBank>> {
    let row = sqlx::query(&format!("SELECT {} FROM waste_banks WHERE id = ?", WASTE_BANK_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(waste_bank_from_row).transpose()
}

/// Insert an active waste bank
pub async fn create(pool: &SqlitePool, new_bank: &NewWasteBank) -> Result<WasteBank> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO waste_banks (
            id, name, address, latitude, longitude, phone, email, opening_hours,
            waste_types, description, is_active, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new_bank.name)
    .bind(&new_bank.address)
    .bind(new_bank.latitude)
    .bind(new_bank.longitude)
    .bind(&new_bank.phone)
    .bind(&new_bank.email)
    .bind(&new_bank.opening_hours)
    .bind(&new_bank.waste_types)
    .bind(&new_bank.description)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    tracing::info!(waste_bank_id = %id, name = %new_bank.name, "Created waste bank");

    find_any(pool, &id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Waste bank {} vanished after insert", id)))
}

/// Apply a partial update; `Error::NotFound` when the id does not exist
///
/// Inactive rows may still be updated.
pub async fn update(pool: &SqlitePool, id: &str, changes: &WasteBankUpdate) -> Result<WasteBank> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE waste_banks SET updated_at = ");
    builder.push_bind(Utc::now());

    if let Some(name) = &changes.name {
        builder.push(", name = ").push_bind(name.clone());
    }
    if let Some(address) = &changes.address {
        builder.push(", address = ").push_bind(address.clone());
    }
    if let Some(latitude) = changes.latitude {
        builder.push(", latitude = ").push_bind(latitude);
    }
    if let Some(longitude) = changes.longitude {
        builder.push(", longitude = ").push_bind(longitude);
    }
    if let Some(phone) = &changes.phone {
        builder.push(", phone = ").push_bind(phone.clone());
    }
    if let Some(email) = &changes.email {
        builder.push(", email = ").push_bind(email.clone());
    }
    if let Some(hours) = &changes.opening_hours {
        builder.push(", opening_hours = ").push_bind(hours.clone());
    }
    if let Some(types) = &changes.waste_types {
        builder.push(", waste_types = ").push_bind(types.clone());
    }
    if let Some(description) = &changes.description {
        builder.push(", description = ").push_bind(description.clone());
    }

    builder.push(" WHERE id = ").push_bind(id.to_string());

    let result = builder.build().execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Waste bank {}", id)));
    }

    find_any(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Waste bank {}", id)))
}

/// Flag a waste bank inactive, returning rows affected
pub async fn deactivate(pool: &SqlitePool, id: &str) -> Result<u64> {
    let result = sqlx::query("UPDATE waste_banks SET is_active = 0, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory;

    fn bank(name: &str, address: &str) -> NewWasteBank {
        NewWasteBank {
            name: name.to_string(),
            address: address.to_string(),
            latitude: -6.2,
            longitude: 106.8,
            phone: Some("0812".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_search_and_soft_delete() {
        let pool = init_in_memory().await.unwrap();
        let a = create(&pool, &bank("Bank Sampah Melati", "Jl. Mawar 1")).await.unwrap();
        create(&pool, &bank("Eco Hub", "Jl. Kenanga 2")).await.unwrap();

        assert_eq!(list_active(&pool, None).await.unwrap().len(), 2);
        assert_eq!(list_active(&pool, Some("melati")).await.unwrap().len(), 1);
        assert_eq!(list_active(&pool, Some("KENANGA")).await.unwrap().len(), 1);

        assert_eq!(deactivate(&pool, &a.id).await.unwrap(), 1);
        assert!(find_active(&pool, &a.id).await.unwrap().is_none());
        assert_eq!(list_active(&pool, None).await.unwrap().len(), 1);

        assert_eq!(deactivate(&pool, "missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_partial_update_clears_nullable_field() {
        let pool = init_in_memory().await.unwrap();
        let created = create(&pool, &bank("Bank", "Addr")).await.unwrap();

        let updated = update(
            &pool,
            &created.id,
            &WasteBankUpdate {
                latitude: Some(1.5),
                phone: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.latitude, 1.5);
        assert_eq!(updated.longitude, 106.8);
        assert!(updated.phone.is_none());
        assert_eq!(updated.name, "Bank");
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let pool = init_in_memory().await.unwrap();
        let err = update(&pool, "nope", &WasteBankUpdate::default()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_serializes_frontend_names_and_omits_nulls() {
        let bank = WasteBank {
            id: "1".to_string(),
            name: "Bank".to_string(),
            address: "Addr".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            phone: None,
            email: None,
            opening_hours: Some("08-16".to_string()),
            waste_types: None,
            description: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&bank).unwrap();
        assert_eq!(json["nama"], "Bank");
        assert_eq!(json["jamOperasi"], "08-16");
        assert!(json.get("telepon").is_none());
        assert_eq!(json["isActive"], true);
    }
}
