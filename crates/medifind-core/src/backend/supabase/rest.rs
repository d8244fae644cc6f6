//! PostgREST tables, the search RPC and Storage.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{eq_filter, in_filter, parse_content_range_total, SupabaseClient};
use crate::backend::{BackendError, BackendResult, DataBackend};
use crate::models::{
    FavoriteMedicine, FavoriteStore, MedicineRecord, Profile, ProfileUpdate, SearchHistoryEntry,
    StoreRecord,
};

type Query<'a> = Vec<(&'a str, String)>;

impl SupabaseClient {
    async fn select<T: DeserializeOwned>(&self, table: &str, query: &Query<'_>) -> BackendResult<Vec<T>> {
        let builder = self.request(Method::GET, &self.rest_url(table)).await.query(query);
        let resp = Self::send(builder).await?;
        Self::handle_response::<Option<Vec<T>>>(resp)
            .await
            .map(Option::unwrap_or_default)
    }

    async fn insert_returning<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> BackendResult<T> {
        let builder = self
            .request(Method::POST, &self.rest_url(table))
            .await
            .header("Prefer", "return=representation")
            .json(body);
        let resp = Self::send(builder).await?;
        first_row(table, Self::handle_response(resp).await?)
    }

    async fn insert_minimal<B: Serialize + ?Sized>(&self, table: &str, body: &B) -> BackendResult<()> {
        let builder = self
            .request(Method::POST, &self.rest_url(table))
            .await
            .header("Prefer", "return=minimal")
            .json(body);
        let resp = Self::send(builder).await?;
        Self::check_status(resp).await.map(|_| ())
    }

    async fn patch_returning<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query<'_>,
        body: &B,
    ) -> BackendResult<T> {
        let builder = self
            .request(Method::PATCH, &self.rest_url(table))
            .await
            .query(query)
            .header("Prefer", "return=representation")
            .json(body);
        let resp = Self::send(builder).await?;
        first_row(table, Self::handle_response(resp).await?)
    }

    async fn delete_where(&self, table: &str, query: &Query<'_>) -> BackendResult<()> {
        let builder = self.request(Method::DELETE, &self.rest_url(table)).await.query(query);
        let resp = Self::send(builder).await?;
        Self::check_status(resp).await.map(|_| ())
    }

    /// Exact row count via `Prefer: count=exact` without fetching rows.
    async fn count(&self, table: &str, query: &Query<'_>) -> BackendResult<u64> {
        let mut query = query.clone();
        query.push(("select", "id".to_string()));

        let builder = self
            .request(Method::HEAD, &self.rest_url(table))
            .await
            .query(&query)
            .header("Prefer", "count=exact");
        let resp = Self::check_status(Self::send(builder).await?).await?;

        resp.headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| BackendError::Decode(format!("missing Content-Range for {}", table)))
    }
}

fn first_row<T>(table: &str, rows: Vec<T>) -> BackendResult<T> {
    rows.into_iter()
        .next()
        .ok_or_else(|| BackendError::NotFound(format!("{} row", table)))
}

#[derive(Deserialize)]
struct MedicineIdRow {
    medicine_id: String,
}

#[async_trait]
impl DataBackend for SupabaseClient {
    async fn fetch_profile(&self, user_id: &str) -> BackendResult<Option<Profile>> {
        let rows: Vec<Profile> = self
            .select("profiles", &vec![("id", eq_filter(user_id)), ("select", "*".into())])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_profile(&self, profile: &Profile) -> BackendResult<()> {
        self.insert_minimal("profiles", profile).await
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> BackendResult<Profile> {
        self.patch_returning("profiles", &vec![("id", eq_filter(user_id))], update)
            .await
    }

    async fn search_medicines(
        &self,
        query: &str,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> BackendResult<Vec<Value>> {
        let builder = self
            .request(Method::POST, &self.rpc_url("search_medicines"))
            .await
            .json(&json!({
                "search_query": query,
                "user_lat": latitude,
                "user_lng": longitude,
                "radius_km": radius_km,
            }));
        let resp = Self::send(builder).await?;
        let rows = Self::handle_response::<Option<Vec<Value>>>(resp)
            .await?
            .unwrap_or_default();
        debug!(query, rows = rows.len(), "search_medicines");
        Ok(rows)
    }

    async fn log_search(&self, entry: &SearchHistoryEntry) -> BackendResult<()> {
        self.insert_minimal("search_history", entry).await
    }

    async fn recent_searches(&self, user_id: &str, limit: usize) -> BackendResult<Vec<SearchHistoryEntry>> {
        self.select(
            "search_history",
            &vec![
                ("user_id", eq_filter(user_id)),
                ("order", "created_at.desc".into()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn count_searches(&self, user_id: &str) -> BackendResult<u64> {
        self.count("search_history", &vec![("user_id", eq_filter(user_id))]).await
    }

    async fn add_favorite_medicine(
        &self,
        user_id: &str,
        medicine_id: &str,
        medicine_name: &str,
    ) -> BackendResult<FavoriteMedicine> {
        self.insert_returning(
            "favorite_medicines",
            &json!({
                "user_id": user_id,
                "medicine_id": medicine_id,
                "medicine_name": medicine_name,
            }),
        )
        .await
    }

    async fn remove_favorite_medicine(&self, user_id: &str, medicine_id: &str) -> BackendResult<()> {
        self.delete_where(
            "favorite_medicines",
            &vec![("user_id", eq_filter(user_id)), ("medicine_id", eq_filter(medicine_id))],
        )
        .await
    }

    async fn favorite_medicine_ids(
        &self,
        user_id: &str,
        medicine_ids: &[String],
    ) -> BackendResult<HashSet<String>> {
        if medicine_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<MedicineIdRow> = self
            .select(
                "favorite_medicines",
                &vec![
                    ("select", "medicine_id".into()),
                    ("user_id", eq_filter(user_id)),
                    ("medicine_id", in_filter(medicine_ids)),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(|r| r.medicine_id).collect())
    }

    async fn list_favorite_medicines(&self, user_id: &str) -> BackendResult<Vec<FavoriteMedicine>> {
        self.select(
            "favorite_medicines",
            &vec![("user_id", eq_filter(user_id)), ("order", "created_at.desc".into())],
        )
        .await
    }

    async fn count_favorite_medicines(&self, user_id: &str) -> BackendResult<u64> {
        self.count("favorite_medicines", &vec![("user_id", eq_filter(user_id))]).await
    }

    async fn add_favorite_store(&self, user_id: &str, store_id: &str) -> BackendResult<FavoriteStore> {
        self.insert_returning("favorites", &json!({ "user_id": user_id, "store_id": store_id }))
            .await
    }

    async fn remove_favorite_store(&self, user_id: &str, store_id: &str) -> BackendResult<()> {
        self.delete_where(
            "favorites",
            &vec![("user_id", eq_filter(user_id)), ("store_id", eq_filter(store_id))],
        )
        .await
    }

    async fn list_favorite_stores(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> BackendResult<Vec<FavoriteStore>> {
        let mut query = vec![
            ("select", "*,stores(*)".to_string()),
            ("user_id", eq_filter(user_id)),
            ("order", "created_at.desc".into()),
        ];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        self.select("favorites", &query).await
    }

    async fn count_favorite_stores(&self, user_id: &str) -> BackendResult<u64> {
        self.count("favorites", &vec![("user_id", eq_filter(user_id))]).await
    }

    async fn count_active_alerts(&self, user_id: &str) -> BackendResult<u64> {
        self.count(
            "medicine_alerts",
            &vec![("user_id", eq_filter(user_id)), ("is_active", "eq.true".into())],
        )
        .await
    }

    async fn list_stores(&self, owner_id: &str) -> BackendResult<Vec<StoreRecord>> {
        self.select(
            "stores",
            &vec![("owner_id", eq_filter(owner_id)), ("order", "created_at.desc".into())],
        )
        .await
    }

    async fn insert_store(&self, store: &StoreRecord) -> BackendResult<StoreRecord> {
        self.insert_returning("stores", store).await
    }

    async fn update_store(&self, store_id: &str, store: &StoreRecord) -> BackendResult<StoreRecord> {
        self.patch_returning("stores", &vec![("id", eq_filter(store_id))], store)
            .await
    }

    async fn delete_store(&self, store_id: &str) -> BackendResult<()> {
        self.delete_where("stores", &vec![("id", eq_filter(store_id))]).await
    }

    async fn set_store_open(&self, store_id: &str, is_open: bool) -> BackendResult<()> {
        let _: StoreRecord = self
            .patch_returning("stores", &vec![("id", eq_filter(store_id))], &json!({ "is_open": is_open }))
            .await?;
        Ok(())
    }

    async fn list_medicines(&self, store_ids: &[String]) -> BackendResult<Vec<MedicineRecord>> {
        if store_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(
            "medicines",
            &vec![("store_id", in_filter(store_ids)), ("order", "name.asc".into())],
        )
        .await
    }

    async fn insert_medicine(&self, medicine: &MedicineRecord) -> BackendResult<MedicineRecord> {
        self.insert_returning("medicines", medicine).await
    }

    async fn update_medicine(
        &self,
        medicine_id: &str,
        medicine: &MedicineRecord,
    ) -> BackendResult<MedicineRecord> {
        self.patch_returning("medicines", &vec![("id", eq_filter(medicine_id))], medicine)
            .await
    }

    async fn delete_medicine(&self, medicine_id: &str) -> BackendResult<()> {
        self.delete_where("medicines", &vec![("id", eq_filter(medicine_id))]).await
    }

    async fn upload_image(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<String> {
        let builder = self
            .request(Method::POST, &self.storage_url(bucket, path))
            .await
            .header(CONTENT_TYPE, content_type)
            .header(CACHE_CONTROL, "max-age=3600")
            .header("x-upsert", "false")
            .body(bytes);
        let resp = Self::send(builder).await?;
        Self::check_status(resp).await?;
        Ok(self.public_url(bucket, path))
    }
}
