//! Store and medicine models.
//!
//! `StoreRecord` and `MedicineRecord` mirror the backend tables. The
//! `Normalized*` types are the canonical view model consumed by map and list
//! views, produced by [`crate::search::normalize_row`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default low-stock threshold when a medicine row has none.
pub const DEFAULT_MIN_STOCK_ALERT: i64 = 10;

/// A row of the `stores` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StoreRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub owner_id: String,
    pub store_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub address: String,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub pincode: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub license_number: Option<String>,
    pub opening_time: String,
    pub closing_time: String,
    #[serde(default = "default_true")]
    pub is_open: bool,
    #[serde(default)]
    pub store_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_reviews: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

fn default_true() -> bool {
    true
}

impl StoreRecord {
    /// Comma-joined address parts, skipping blanks.
    pub fn full_address(&self) -> String {
        [
            Some(self.address.as_str()),
            Some(self.city.as_str()),
            Some(self.state.as_str()),
            self.pincode.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// A row of the `medicines` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MedicineRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub store_id: String,
    pub name: String,
    #[serde(default)]
    pub generic_name: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub min_stock_alert: Option<i64>,
    #[serde(default)]
    pub requires_prescription: bool,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

impl MedicineRecord {
    /// Effective low-stock threshold.
    pub fn stock_threshold(&self) -> i64 {
        self.min_stock_alert.unwrap_or(DEFAULT_MIN_STOCK_ALERT)
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.stock_threshold()
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date.map(|d| d < today).unwrap_or(false)
    }
}

/// Canonical medicine view attached to a store result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMedicine {
    pub id: Option<String>,
    pub name: String,
    pub generic_name: Option<String>,
    pub price: Option<f64>,
    pub quantity: Option<i64>,
    pub image_url: Option<String>,
    pub manufacturer: Option<String>,
    pub dosage: Option<String>,
    pub requires_prescription: bool,
}

/// Canonical store view consumed by map and list views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedStore {
    pub id: String,
    pub name: String,
    pub address: String,
    pub full_address: String,
    pub phone: String,
    pub email: String,
    /// Always finite and >= 0
    pub rating: f64,
    pub total_reviews: u32,
    pub is_open: bool,
    pub opening_hours: String,
    pub store_image_url: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_km: Option<f64>,
    pub medicine: NormalizedMedicine,
    /// 1-based position in the result set (1 = nearest)
    pub rank: usize,
}

impl NormalizedStore {
    pub fn is_nearest(&self) -> bool {
        self.rank == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_address_skips_blanks() {
        let store = StoreRecord {
            address: "12 MG Road".into(),
            city: "Pune".into(),
            state: " ".into(),
            pincode: Some("411001".into()),
            ..Default::default()
        };
        assert_eq!(store.full_address(), "12 MG Road, Pune, 411001");
    }

    #[test]
    fn test_low_stock_threshold() {
        let mut med = MedicineRecord {
            name: "Insulin".into(),
            quantity: 10,
            ..Default::default()
        };
        assert!(med.is_low_stock());

        med.min_stock_alert = Some(5);
        assert!(!med.is_low_stock());
    }

    #[test]
    fn test_expiry() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut med = MedicineRecord::default();
        assert!(!med.is_expired(today));

        med.expiry_date = NaiveDate::from_ymd_opt(2024, 5, 31);
        assert!(med.is_expired(today));

        med.expiry_date = Some(today);
        assert!(!med.is_expired(today));
    }
}
