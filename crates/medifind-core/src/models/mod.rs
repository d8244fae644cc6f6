//! Domain models for MediFind.

mod favorite;
mod profile;
mod session;
mod store;

pub use favorite::*;
pub use profile::*;
pub use session::*;
pub use store::*;

use serde::{Deserialize, Deserializer};

/// Deserialize `null` as the type's default (PostgREST returns explicit nulls).
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
