//! Search result normalizer.
//!
//! Maps raw backend rows onto [`NormalizedStore`]. Two upstream shapes are
//! understood:
//! - `Joined`: a medicine row from the search RPC with its store nested
//!   under `stores` (or `store`)
//! - `StoreView`: a flat store object, optionally carrying a `medicine`
//!
//! Every field is read in both snake_case and camelCase. Numbers may arrive
//! as JSON numbers or as strings with a numeric prefix. Non-finite values
//! never reach the output.

use serde_json::{Map, Value};

use crate::models::{NormalizedMedicine, NormalizedStore};

pub const DEFAULT_STORE_NAME: &str = "Unknown Store";
pub const DEFAULT_ADDRESS: &str = "Address not available";
pub const DEFAULT_RATING: f64 = 4.0;
pub const DEFAULT_OPENING_HOURS: &str = "9:00 AM - 9:00 PM";

/// Upstream row shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    Joined,
    StoreView,
}

impl RowShape {
    /// Classify a raw row. Anything without a nested store object is
    /// treated as a store view.
    pub fn classify(row: &Value) -> Self {
        match nested_store(Fields::of(row)) {
            Some(_) => RowShape::Joined,
            None => RowShape::StoreView,
        }
    }
}

fn nested_store(row: Fields<'_>) -> Option<Fields<'_>> {
    row.object("stores").or_else(|| row.object("store"))
}

/// Lenient field reader over one JSON object. Non-objects read as empty.
#[derive(Clone, Copy)]
struct Fields<'a> {
    map: Option<&'a Map<String, Value>>,
}

impl<'a> Fields<'a> {
    fn of(value: &'a Value) -> Self {
        Self {
            map: value.as_object(),
        }
    }

    /// Non-null value under `key` (snake_case) or its camelCase form.
    fn get(&self, key: &str) -> Option<&'a Value> {
        let map = self.map?;
        map.get(key)
            .filter(|v| !v.is_null())
            .or_else(|| map.get(&to_camel_case(key)).filter(|v| !v.is_null()))
    }

    fn object(&self, key: &str) -> Option<Fields<'a>> {
        self.get(key)
            .and_then(Value::as_object)
            .map(|map| Fields { map: Some(map) })
    }

    /// Non-empty string; numbers are rendered.
    fn string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(value_to_string)
    }

    fn first_string(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.string(k))
    }

    fn float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(lenient_float)
    }

    fn first_float(&self, keys: &[&str]) -> Option<f64> {
        keys.iter().find_map(|k| self.float(k))
    }

    fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(lenient_bool)
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `snake_case` to `camelCase`.
fn to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Parse the longest numeric prefix of `input`, the way browsers'
/// `parseFloat` does. Leading whitespace is skipped; trailing garbage is
/// ignored. Returns `None` when there is no numeric prefix or the value is
/// not finite.
pub fn parse_float_prefix(input: &str) -> Option<f64> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    // Exponent only counts when at least one digit follows.
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Finite number from a JSON number or numeric string.
fn lenient_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float_prefix(s),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn lenient_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "t" | "1" | "yes" => Some(true),
            "false" | "f" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Format a `HH:MM[:SS]` time as `h:MM AM/PM`. Unparsable input comes back
/// unchanged; blank input is `None`.
pub fn format_time(time: &str) -> Option<String> {
    let time = time.trim();
    if time.is_empty() {
        return None;
    }

    let mut parts = time.split(':');
    let hour = parts.next().and_then(|h| h.trim().parse::<u32>().ok());
    let minutes = parts.next().map(|m| m.chars().take(2).collect::<String>());

    match (hour, minutes) {
        (Some(hour), Some(minutes)) if hour < 24 && minutes.len() == 2 => {
            let suffix = if hour >= 12 { "PM" } else { "AM" };
            let hour12 = match hour % 12 {
                0 => 12,
                h => h,
            };
            Some(format!("{}:{} {}", hour12, minutes, suffix))
        }
        _ => Some(time.to_string()),
    }
}

fn opening_hours_from_times(store: &Fields<'_>) -> Option<String> {
    let open = store.string("opening_time").and_then(|t| format_time(&t))?;
    let close = store.string("closing_time").and_then(|t| format_time(&t))?;
    Some(format!("{} - {}", open, close))
}

fn rating(store: &Fields<'_>) -> f64 {
    store
        .float("rating")
        .filter(|r| *r >= 0.0)
        .unwrap_or(DEFAULT_RATING)
}

fn total_reviews(store: &Fields<'_>) -> u32 {
    store
        .float("total_reviews")
        .map(|n| n.floor().clamp(0.0, u32::MAX as f64) as u32)
        .unwrap_or(0)
}

fn coordinate(store: &Fields<'_>, key: &str) -> f64 {
    store.float(key).unwrap_or(0.0)
}

fn full_address(store: &Fields<'_>, address: &str) -> String {
    let joined = ["address", "city", "state", "pincode"]
        .iter()
        .filter_map(|k| store.string(k))
        .map(|s| s.trim().to_string())
        .collect::<Vec<_>>()
        .join(", ");

    if joined.is_empty() {
        address.to_string()
    } else {
        joined
    }
}

fn medicine(fields: &Fields<'_>) -> NormalizedMedicine {
    NormalizedMedicine {
        id: fields.string("id"),
        name: fields.string("name").unwrap_or_default(),
        generic_name: fields.string("generic_name"),
        price: fields.float("price"),
        quantity: fields.float("quantity").map(|q| q.floor() as i64),
        image_url: fields.string("image_url"),
        manufacturer: fields.string("manufacturer"),
        dosage: fields.string("dosage"),
        requires_prescription: fields.bool("requires_prescription").unwrap_or(false),
    }
}

fn distance(fields: &Fields<'_>) -> Option<f64> {
    fields
        .first_float(&["distance_km", "distance"])
        .filter(|d| *d >= 0.0)
}

/// Joined search row: medicine fields at the top, store nested.
fn normalize_joined(row: Fields<'_>, store: Fields<'_>) -> NormalizedStore {
    let address = store.string("address").unwrap_or_else(|| DEFAULT_ADDRESS.to_string());

    NormalizedStore {
        id: store.string("id").or_else(|| row.string("id")).unwrap_or_default(),
        name: store
            .first_string(&["store_name", "name"])
            .unwrap_or_else(|| DEFAULT_STORE_NAME.to_string()),
        full_address: full_address(&store, &address),
        address,
        phone: store.string("phone").unwrap_or_default(),
        email: store.string("email").unwrap_or_default(),
        rating: rating(&store),
        total_reviews: total_reviews(&store),
        is_open: store.bool("is_open").unwrap_or(true),
        opening_hours: opening_hours_from_times(&store)
            .unwrap_or_else(|| DEFAULT_OPENING_HOURS.to_string()),
        store_image_url: store.string("store_image_url"),
        latitude: coordinate(&store, "latitude"),
        longitude: coordinate(&store, "longitude"),
        distance_km: distance(&row),
        medicine: medicine(&row),
        rank: 1,
    }
}

/// Flat store view, as already-shaped results are passed between views.
fn normalize_store_view(store: Fields<'_>) -> NormalizedStore {
    let address = store.string("address").unwrap_or_else(|| DEFAULT_ADDRESS.to_string());
    let full_address = store
        .string("full_address")
        .unwrap_or_else(|| full_address(&store, &address));

    NormalizedStore {
        id: store.string("id").unwrap_or_default(),
        name: store
            .first_string(&["name", "store_name"])
            .unwrap_or_else(|| DEFAULT_STORE_NAME.to_string()),
        address,
        full_address,
        phone: store.string("phone").unwrap_or_default(),
        email: store.string("email").unwrap_or_default(),
        rating: rating(&store),
        total_reviews: total_reviews(&store),
        is_open: store.bool("is_open").unwrap_or(true),
        opening_hours: store
            .string("opening_hours")
            .or_else(|| opening_hours_from_times(&store))
            .unwrap_or_else(|| DEFAULT_OPENING_HOURS.to_string()),
        store_image_url: store.string("store_image_url"),
        latitude: coordinate(&store, "latitude"),
        longitude: coordinate(&store, "longitude"),
        distance_km: distance(&store),
        medicine: store.object("medicine").map(|m| medicine(&m)).unwrap_or_default(),
        rank: store
            .float("rank")
            .filter(|r| *r >= 1.0)
            .map(|r| r as usize)
            .unwrap_or(1),
    }
}

/// Normalize one raw row. Pure and deterministic.
///
/// The `rank` of a single row is taken from the row when it carries one,
/// otherwise 1; [`normalize_rows`] assigns ranks by position.
pub fn normalize_row(row: &Value) -> NormalizedStore {
    let fields = Fields::of(row);

    match nested_store(fields) {
        Some(store) => normalize_joined(fields, store),
        None => normalize_store_view(fields),
    }
}

/// Normalize a distance-sorted result set. Order is preserved and `rank`
/// is the 1-based position, so rank 1 is the nearest store.
pub fn normalize_rows(rows: &[Value]) -> Vec<NormalizedStore> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let mut store = normalize_row(row);
            store.rank = index + 1;
            store
        })
        .collect()
}

/// Find the raw row behind a selected store: by store id, else by exact
/// coordinates.
pub fn find_row_for_store<'a>(rows: &'a [Value], store: &NormalizedStore) -> Option<&'a Value> {
    rows.iter().find(|row| {
        let Some(nested) = nested_store(Fields::of(row)) else {
            return false;
        };

        let same_id = !store.id.is_empty() && nested.string("id").as_deref() == Some(store.id.as_str());
        let same_position = nested.float("latitude") == Some(store.latitude)
            && nested.float("longitude") == Some(store.longitude);
        same_id || same_position
    })
}
