//! Map composition.
//!
//! Turns normalized search results and the user's location into marker,
//! viewport and route commands for a map widget. The widget itself sits behind
//! [`MapSurface`]; route lookups sit behind [`DirectionsService`].

mod controller;
mod directions;
mod geometry;

pub use controller::*;
pub use directions::*;
pub use geometry::*;
