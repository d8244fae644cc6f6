//! Favorites, search history and alert models.

use serde::{Deserialize, Serialize};

use super::store::StoreRecord;

/// A saved medicine (`favorite_medicines`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FavoriteMedicine {
    pub id: String,
    pub user_id: String,
    pub medicine_id: String,
    #[serde(default)]
    pub medicine_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A saved store (`favorites`), optionally joined with the store row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FavoriteStore {
    pub id: String,
    pub user_id: String,
    pub store_id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, rename = "stores", alias = "store")]
    pub store: Option<StoreRecord>,
}

/// One logged search (`search_history`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    #[serde(rename = "search_query", alias = "query")]
    pub query: String,
    pub latitude: f64,
    pub longitude: f64,
    pub results_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Restock alert a customer subscribed to (`medicine_alerts`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicineAlert {
    pub id: String,
    pub user_id: String,
    pub medicine_name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}
