//! Customer and retailer dashboard aggregation.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::warn;

use crate::backend::{BackendResult, DataBackend};
use crate::models::{FavoriteMedicine, FavoriteStore, MedicineRecord, SearchHistoryEntry, StoreRecord};

/// Rows shown in each dashboard list.
pub const DASHBOARD_LIST_LIMIT: usize = 5;

fn or_empty<T: Default>(result: BackendResult<T>, part: &str) -> T {
    result.unwrap_or_else(|e| {
        warn!(part, error = %e, "Dashboard section failed to load");
        T::default()
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerStats {
    pub total_searches: u64,
    pub favorite_stores: u64,
    pub favorite_medicines: u64,
    pub active_alerts: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDashboard {
    pub stats: CustomerStats,
    /// Newest first
    pub recent_searches: Vec<SearchHistoryEntry>,
    pub favorite_stores: Vec<FavoriteStore>,
    pub favorite_medicines: Vec<FavoriteMedicine>,
}

impl CustomerDashboard {
    /// Load every section concurrently. A failing section is logged and left
    /// empty; the rest still load.
    pub async fn load<B: DataBackend + ?Sized>(backend: &B, user_id: &str) -> Self {
        let (searches, stores, medicines, search_count, store_count, medicine_count, alert_count) = tokio::join!(
            backend.recent_searches(user_id, DASHBOARD_LIST_LIMIT),
            backend.list_favorite_stores(user_id, Some(DASHBOARD_LIST_LIMIT)),
            backend.list_favorite_medicines(user_id),
            backend.count_searches(user_id),
            backend.count_favorite_stores(user_id),
            backend.count_favorite_medicines(user_id),
            backend.count_active_alerts(user_id),
        );

        Self {
            stats: CustomerStats {
                total_searches: or_empty(search_count, "search count"),
                favorite_stores: or_empty(store_count, "favorite store count"),
                favorite_medicines: or_empty(medicine_count, "favorite medicine count"),
                active_alerts: or_empty(alert_count, "alert count"),
            },
            recent_searches: or_empty(searches, "recent searches"),
            favorite_stores: or_empty(stores, "favorite stores"),
            favorite_medicines: or_empty(medicines, "favorite medicines"),
        }
    }

    /// Drop a removed medicine locally, keeping the count in step.
    pub fn forget_medicine(&mut self, medicine_id: &str) {
        let before = self.favorite_medicines.len();
        self.favorite_medicines.retain(|m| m.medicine_id != medicine_id);
        if self.favorite_medicines.len() < before {
            self.stats.favorite_medicines = self.stats.favorite_medicines.saturating_sub(1);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    pub total_stores: usize,
    pub total_medicines: usize,
    pub low_stock: usize,
    pub expired: usize,
    /// Store views are not tracked yet; always zero.
    pub total_views: u64,
}

impl InventorySummary {
    pub fn compute(stores: &[StoreRecord], medicines: &[MedicineRecord], today: NaiveDate) -> Self {
        Self {
            total_stores: stores.len(),
            total_medicines: medicines.len(),
            low_stock: medicines.iter().filter(|m| m.is_low_stock()).count(),
            expired: medicines.iter().filter(|m| m.is_expired(today)).count(),
            total_views: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetailerDashboard {
    pub stores: Vec<StoreRecord>,
    pub summary: InventorySummary,
    pub low_stock_items: Vec<MedicineRecord>,
}

impl RetailerDashboard {
    pub async fn load<B: DataBackend + ?Sized>(backend: &B, owner_id: &str) -> BackendResult<Self> {
        let stores = backend.list_stores(owner_id).await?;
        if stores.is_empty() {
            return Ok(Self::default());
        }

        let store_ids: Vec<String> = stores.iter().filter_map(|s| s.id.clone()).collect();
        let medicines = backend.list_medicines(&store_ids).await?;

        Ok(Self::from_rows(stores, medicines, Utc::now().date_naive()))
    }

    pub fn from_rows(stores: Vec<StoreRecord>, medicines: Vec<MedicineRecord>, today: NaiveDate) -> Self {
        let summary = InventorySummary::compute(&stores, &medicines, today);
        let low_stock_items = medicines
            .into_iter()
            .filter(MedicineRecord::is_low_stock)
            .take(DASHBOARD_LIST_LIMIT)
            .collect();

        Self {
            stores,
            summary,
            low_stock_items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MemoryBackend};

    fn medicine(name: &str, quantity: i64, min_stock_alert: Option<i64>) -> MedicineRecord {
        MedicineRecord {
            store_id: "s1".into(),
            name: name.into(),
            quantity,
            min_stock_alert,
            ..Default::default()
        }
    }

    #[test]
    fn test_low_stock_uses_default_threshold() {
        let medicines = vec![
            medicine("A", 10, None),
            medicine("B", 11, None),
            medicine("C", 3, Some(2)),
            medicine("D", 2, Some(2)),
        ];
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();

        let dashboard = RetailerDashboard::from_rows(vec![StoreRecord::default()], medicines, today);
        assert_eq!(dashboard.summary.total_medicines, 4);
        assert_eq!(dashboard.summary.low_stock, 2);
        assert_eq!(dashboard.summary.total_views, 0);
        let names: Vec<_> = dashboard.low_stock_items.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["A", "D"]);
    }

    #[test]
    fn test_low_stock_list_capped() {
        let medicines = (0..8).map(|i| medicine(&format!("M{}", i), 0, None)).collect();
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();

        let dashboard = RetailerDashboard::from_rows(vec![], medicines, today);
        assert_eq!(dashboard.summary.low_stock, 8);
        assert_eq!(dashboard.low_stock_items.len(), DASHBOARD_LIST_LIMIT);
    }

    #[tokio::test]
    async fn test_customer_sections_fail_independently() {
        let backend = MemoryBackend::new();
        backend.add_favorite_medicine("u1", "m1", "Insulin").await.unwrap();
        backend.put_alert("u1", "Insulin", true).await;
        backend.put_alert("u1", "Aspirin", false).await;
        backend
            .fail("recent_searches", BackendError::Network("offline".into()))
            .await;

        let mut dashboard = CustomerDashboard::load(&backend, "u1").await;
        assert!(dashboard.recent_searches.is_empty());
        assert_eq!(dashboard.stats.favorite_medicines, 1);
        assert_eq!(dashboard.stats.active_alerts, 1);
        assert_eq!(dashboard.favorite_medicines.len(), 1);

        dashboard.forget_medicine("m1");
        assert_eq!(dashboard.stats.favorite_medicines, 0);
        dashboard.forget_medicine("m1");
        assert_eq!(dashboard.stats.favorite_medicines, 0);
    }

    #[tokio::test]
    async fn test_retailer_without_stores() {
        let backend = MemoryBackend::new();
        let dashboard = RetailerDashboard::load(&backend, "owner").await.unwrap();
        assert_eq!(dashboard, RetailerDashboard::default());
        assert_eq!(backend.calls("list_medicines").await, 0);
    }
}
