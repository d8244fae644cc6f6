//! Store records owned by a retailer.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::{RetailerError, RetailerResult, ValidationError};
use crate::backend::DataBackend;
use crate::models::StoreRecord;
use crate::search::{parse_float_prefix, DEFAULT_SEARCH_LOCATION};

pub const STORE_IMAGE_BUCKET: &str = "store-images";
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_OPENING_TIME: &str = "09:00";
pub const DEFAULT_CLOSING_TIME: &str = "21:00";

pub const IMAGE_UPLOAD_FAILED: &str = "Image upload failed, saving without image";
pub const DEFAULT_COORDINATES_USED: &str = "Using default coordinates. You can update them later.";

/// Storage path for an uploaded store image.
///
/// Anything outside `[a-zA-Z0-9.-]` in the file name becomes `_`.
pub fn image_path(user_id: &str, timestamp_ms: i64, file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    format!("{}/{}-{}", user_id, timestamp_ms, safe)
}

fn trimmed(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Store form contents. Coordinates stay text until saved.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreDraft {
    pub store_name: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub latitude: String,
    pub longitude: String,
    pub phone: String,
    pub email: String,
    pub license_number: String,
    pub opening_time: String,
    pub closing_time: String,
    pub is_open: bool,
}

impl Default for StoreDraft {
    fn default() -> Self {
        Self {
            store_name: String::new(),
            description: String::new(),
            address: String::new(),
            city: String::new(),
            state: String::new(),
            pincode: String::new(),
            latitude: String::new(),
            longitude: String::new(),
            phone: String::new(),
            email: String::new(),
            license_number: String::new(),
            opening_time: DEFAULT_OPENING_TIME.to_string(),
            closing_time: DEFAULT_CLOSING_TIME.to_string(),
            is_open: true,
        }
    }
}

/// Record ready to write, plus whether the coordinates were filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStore {
    pub record: StoreRecord,
    pub used_default_coordinates: bool,
}

impl StoreDraft {
    /// Prefill the form from an existing store.
    pub fn from_record(store: &StoreRecord) -> Self {
        let or_empty = |v: &Option<String>| v.clone().unwrap_or_default();
        let coordinate = |v: f64| if v == 0.0 { String::new() } else { v.to_string() };

        Self {
            store_name: store.store_name.clone(),
            description: or_empty(&store.description),
            address: store.address.clone(),
            city: store.city.clone(),
            state: store.state.clone(),
            pincode: or_empty(&store.pincode),
            latitude: coordinate(store.latitude),
            longitude: coordinate(store.longitude),
            phone: store.phone.clone(),
            email: or_empty(&store.email),
            license_number: or_empty(&store.license_number),
            opening_time: trimmed(&store.opening_time).unwrap_or_else(|| DEFAULT_OPENING_TIME.to_string()),
            closing_time: trimmed(&store.closing_time).unwrap_or_else(|| DEFAULT_CLOSING_TIME.to_string()),
            is_open: store.is_open,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.store_name.trim().is_empty() {
            return Err(ValidationError::StoreNameRequired);
        }
        if [&self.address, &self.city, &self.state]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(ValidationError::AddressIncomplete);
        }
        if self.phone.trim().is_empty() {
            return Err(ValidationError::PhoneRequired);
        }
        Ok(())
    }

    /// Build the row to write. A missing or zero coordinate falls back to
    /// the default location.
    pub fn into_record(self, owner_id: &str, image_url: Option<String>) -> PreparedStore {
        let latitude = parse_float_prefix(&self.latitude).filter(|v| *v != 0.0);
        let longitude = parse_float_prefix(&self.longitude).filter(|v| *v != 0.0);
        let used_default_coordinates = latitude.is_none() || longitude.is_none();

        let record = StoreRecord {
            owner_id: owner_id.to_string(),
            store_name: self.store_name.trim().to_string(),
            description: trimmed(&self.description),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            pincode: trimmed(&self.pincode),
            latitude: latitude.unwrap_or(DEFAULT_SEARCH_LOCATION.lat),
            longitude: longitude.unwrap_or(DEFAULT_SEARCH_LOCATION.lng),
            phone: self.phone.trim().to_string(),
            email: trimmed(&self.email),
            license_number: trimmed(&self.license_number),
            opening_time: trimmed(&self.opening_time).unwrap_or_else(|| DEFAULT_OPENING_TIME.to_string()),
            closing_time: trimmed(&self.closing_time).unwrap_or_else(|| DEFAULT_CLOSING_TIME.to_string()),
            is_open: self.is_open,
            store_image_url: image_url,
            ..Default::default()
        };

        PreparedStore {
            record,
            used_default_coordinates,
        }
    }
}

/// An image picked for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ValidationError> {
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ValidationError::ImageTooLarge);
        }
        Ok(Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        })
    }
}

/// Result of saving a store.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedStore {
    pub store: StoreRecord,
    pub created: bool,
    /// Non-fatal problems to show alongside the success message
    pub warnings: Vec<&'static str>,
}

impl SavedStore {
    pub fn message(&self) -> &'static str {
        if self.created {
            "Store added successfully!"
        } else {
            "Store updated successfully!"
        }
    }
}

pub struct StoreManager<B: ?Sized> {
    backend: Arc<B>,
}

impl<B: ?Sized> Clone for StoreManager<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: DataBackend + ?Sized> StoreManager<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// The owner's stores, newest first.
    pub async fn list(&self, owner_id: &str) -> RetailerResult<Vec<StoreRecord>> {
        Ok(self.backend.list_stores(owner_id).await?)
    }

    /// Create a store, or update `editing` when given.
    ///
    /// A failed image upload keeps the previous image and is reported as a
    /// warning rather than failing the save.
    pub async fn save(
        &self,
        owner_id: &str,
        draft: StoreDraft,
        editing: Option<&StoreRecord>,
        image: Option<ImageUpload>,
    ) -> RetailerResult<SavedStore> {
        draft.validate()?;

        let mut warnings = Vec::new();
        let mut image_url = editing.and_then(|s| s.store_image_url.clone());

        if let Some(image) = image {
            let path = image_path(owner_id, Utc::now().timestamp_millis(), &image.file_name);
            match self
                .backend
                .upload_image(STORE_IMAGE_BUCKET, &path, image.bytes, &image.content_type)
                .await
            {
                Ok(url) => image_url = Some(url),
                Err(e) => {
                    warn!(path = %path, error = %e, "Store image upload failed");
                    warnings.push(IMAGE_UPLOAD_FAILED);
                }
            }
        }

        let prepared = draft.into_record(owner_id, image_url);
        if prepared.used_default_coordinates {
            warnings.push(DEFAULT_COORDINATES_USED);
        }

        let (store, created) = match editing {
            Some(existing) => {
                let id = existing.id.as_deref().ok_or(RetailerError::MissingId)?;
                (self.backend.update_store(id, &prepared.record).await?, false)
            }
            None => (self.backend.insert_store(&prepared.record).await?, true),
        };

        info!(store_id = ?store.id, created, "Saved store");
        Ok(SavedStore {
            store,
            created,
            warnings,
        })
    }

    /// Delete a store. Its medicines go with it.
    pub async fn delete(&self, store_id: &str) -> RetailerResult<()> {
        self.backend.delete_store(store_id).await?;
        info!(store_id, "Deleted store");
        Ok(())
    }

    /// Flip the open flag. Returns the new value.
    pub async fn toggle_open(&self, store: &StoreRecord) -> RetailerResult<bool> {
        let id = store.id.as_deref().ok_or(RetailerError::MissingId)?;
        let is_open = !store.is_open;
        self.backend.set_store_open(id, is_open).await?;
        Ok(is_open)
    }
}

/// Status message after [`StoreManager::toggle_open`].
pub fn open_status_message(is_open: bool) -> String {
    format!("Store marked as {}", if is_open { "open" } else { "closed" })
}
