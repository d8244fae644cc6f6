//! Retailer store and inventory management.

mod inventory;
mod stores;

pub use inventory::*;
pub use stores::*;

use thiserror::Error;

use crate::backend::BackendError;

/// Form validation failures, caught before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Store name is required")]
    StoreNameRequired,

    #[error("Please fill in all address fields")]
    AddressIncomplete,

    #[error("Phone number is required")]
    PhoneRequired,

    #[error("Image must be less than 5MB")]
    ImageTooLarge,

    #[error("Medicine name is required")]
    MedicineNameRequired,

    #[error("Price cannot be negative")]
    NegativePrice,

    #[error("Quantity cannot be negative")]
    NegativeQuantity,
}

/// Retailer errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetailerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Backend(#[from] BackendError),

    #[error("Store has no id")]
    MissingId,
}

pub type RetailerResult<T> = Result<T, RetailerError>;
