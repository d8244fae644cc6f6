//! Medicines stocked by a store.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use super::{RetailerError, RetailerResult, ValidationError};
use crate::backend::DataBackend;
use crate::models::MedicineRecord;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MedicineDraft {
    pub name: String,
    pub generic_name: String,
    pub manufacturer: String,
    pub dosage: String,
    pub price: f64,
    pub quantity: i64,
    pub min_stock_alert: Option<i64>,
    pub requires_prescription: bool,
    pub image_url: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

fn trimmed(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl MedicineDraft {
    pub fn from_record(medicine: &MedicineRecord) -> Self {
        Self {
            name: medicine.name.clone(),
            generic_name: medicine.generic_name.clone().unwrap_or_default(),
            manufacturer: medicine.manufacturer.clone().unwrap_or_default(),
            dosage: medicine.dosage.clone().unwrap_or_default(),
            price: medicine.price,
            quantity: medicine.quantity,
            min_stock_alert: medicine.min_stock_alert,
            requires_prescription: medicine.requires_prescription,
            image_url: medicine.image_url.clone(),
            expiry_date: medicine.expiry_date,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MedicineNameRequired);
        }
        if self.price.is_nan() || self.price < 0.0 {
            return Err(ValidationError::NegativePrice);
        }
        if self.quantity < 0 || self.min_stock_alert.is_some_and(|m| m < 0) {
            return Err(ValidationError::NegativeQuantity);
        }
        Ok(())
    }

    pub fn into_record(self, store_id: &str) -> MedicineRecord {
        MedicineRecord {
            id: None,
            store_id: store_id.to_string(),
            name: self.name.trim().to_string(),
            generic_name: trimmed(&self.generic_name),
            manufacturer: trimmed(&self.manufacturer),
            dosage: trimmed(&self.dosage),
            price: self.price,
            quantity: self.quantity,
            min_stock_alert: self.min_stock_alert,
            requires_prescription: self.requires_prescription,
            image_url: self.image_url.and_then(|url| trimmed(&url)),
            expiry_date: self.expiry_date,
        }
    }
}

pub struct InventoryManager<B: ?Sized> {
    backend: Arc<B>,
}

impl<B: ?Sized> Clone for InventoryManager<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: DataBackend + ?Sized> InventoryManager<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// A store's medicines, by name.
    pub async fn list(&self, store_id: &str) -> RetailerResult<Vec<MedicineRecord>> {
        Ok(self.backend.list_medicines(&[store_id.to_string()]).await?)
    }

    pub async fn add(&self, store_id: &str, draft: MedicineDraft) -> RetailerResult<MedicineRecord> {
        draft.validate()?;
        let medicine = self.backend.insert_medicine(&draft.into_record(store_id)).await?;
        info!(store_id, medicine_id = ?medicine.id, "Added medicine");
        Ok(medicine)
    }

    pub async fn update(&self, existing: &MedicineRecord, draft: MedicineDraft) -> RetailerResult<MedicineRecord> {
        let id = existing.id.as_deref().ok_or(RetailerError::MissingId)?;
        draft.validate()?;
        Ok(self
            .backend
            .update_medicine(id, &draft.into_record(&existing.store_id))
            .await?)
    }

    pub async fn delete(&self, medicine_id: &str) -> RetailerResult<()> {
        self.backend.delete_medicine(medicine_id).await?;
        info!(medicine_id, "Deleted medicine");
        Ok(())
    }

    /// Add `amount` units to the stock on hand.
    pub async fn restock(&self, existing: &MedicineRecord, amount: i64) -> RetailerResult<MedicineRecord> {
        let id = existing.id.as_deref().ok_or(RetailerError::MissingId)?;
        if amount < 0 {
            return Err(ValidationError::NegativeQuantity.into());
        }

        let mut medicine = existing.clone();
        medicine.quantity = medicine.quantity.saturating_add(amount);
        Ok(self.backend.update_medicine(id, &medicine).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn draft(name: &str, quantity: i64) -> MedicineDraft {
        MedicineDraft {
            name: name.into(),
            generic_name: "  ".into(),
            price: 12.5,
            quantity,
            ..Default::default()
        }
    }

    #[test]
    fn test_validation() {
        assert_eq!(draft(" ", 1).validate(), Err(ValidationError::MedicineNameRequired));

        let mut d = draft("Aspirin", 1);
        d.price = -1.0;
        assert_eq!(d.validate(), Err(ValidationError::NegativePrice));
        d.price = f64::NAN;
        assert_eq!(d.validate(), Err(ValidationError::NegativePrice));

        assert_eq!(draft("Aspirin", -3).validate(), Err(ValidationError::NegativeQuantity));
        assert!(draft("Aspirin", 0).validate().is_ok());
    }

    #[tokio::test]
    async fn test_add_restock_delete() {
        let backend = Arc::new(MemoryBackend::new());
        let inventory = InventoryManager::new(backend.clone());

        let added = inventory.add("s1", draft(" Aspirin ", 4)).await.unwrap();
        assert_eq!(added.name, "Aspirin");
        assert_eq!(added.generic_name, None);
        assert!(added.is_low_stock());

        let restocked = inventory.restock(&added, 20).await.unwrap();
        assert_eq!(restocked.quantity, 24);
        assert!(!restocked.is_low_stock());

        let listed = inventory.list("s1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].quantity, 24);

        inventory.delete(added.id.as_deref().unwrap()).await.unwrap();
        assert!(inventory.list("s1").await.unwrap().is_empty());
    }
}
