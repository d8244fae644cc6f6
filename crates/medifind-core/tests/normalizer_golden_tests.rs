//! Golden tests for the search result normalizer.
//!
//! Each case is a raw row as one of the upstream shapes delivers it.

use medifind_core::search::{normalize_row, normalize_rows, RowShape};
use serde_json::{json, Value};

/// Expected canonical fields for one raw row.
struct GoldenCase {
    id: &'static str,
    input: Value,
    shape: RowShape,
    expected_store_id: &'static str,
    expected_name: &'static str,
    expected_address: &'static str,
    expected_full_address: &'static str,
    expected_rating: f64,
    expected_reviews: u32,
    expected_open: bool,
    expected_hours: &'static str,
    expected_lat: f64,
    expected_lng: f64,
    expected_distance: Option<f64>,
    expected_medicine: &'static str,
    expected_price: Option<f64>,
}

fn get_golden_cases() -> Vec<GoldenCase> {
    vec![
        GoldenCase {
            id: "rpc-row-snake-case",
            input: json!({
                "id": "m1",
                "name": "Paracetamol 500",
                "generic_name": "Acetaminophen",
                "price": "25.50",
                "quantity": 40,
                "distance_km": 1.234,
                "stores": {
                    "id": "s1",
                    "store_name": "Apollo Pharmacy",
                    "address": "12 Link Rd",
                    "city": "Mumbai",
                    "state": "MH",
                    "pincode": "400001",
                    "phone": "022 5550",
                    "rating": "4.6",
                    "total_reviews": 12,
                    "is_open": false,
                    "opening_time": "08:30",
                    "closing_time": "22:00",
                    "latitude": "19.07",
                    "longitude": 72.87
                }
            }),
            shape: RowShape::Joined,
            expected_store_id: "s1",
            expected_name: "Apollo Pharmacy",
            expected_address: "12 Link Rd",
            expected_full_address: "12 Link Rd, Mumbai, MH, 400001",
            expected_rating: 4.6,
            expected_reviews: 12,
            expected_open: false,
            expected_hours: "8:30 AM - 10:00 PM",
            expected_lat: 19.07,
            expected_lng: 72.87,
            expected_distance: Some(1.234),
            expected_medicine: "Paracetamol 500",
            expected_price: Some(25.5),
        },
        GoldenCase {
            id: "camel-case-sparse-store",
            input: json!({
                "id": "m2",
                "name": "Insulin",
                "genericName": "Human insulin",
                "requiresPrescription": true,
                "store": {
                    "id": "s2",
                    "storeName": "Wellness Forever",
                    "rating": null,
                    "latitude": null
                }
            }),
            shape: RowShape::Joined,
            expected_store_id: "s2",
            expected_name: "Wellness Forever",
            expected_address: "Address not available",
            expected_full_address: "Address not available",
            expected_rating: 4.0,
            expected_reviews: 0,
            expected_open: true,
            expected_hours: "9:00 AM - 9:00 PM",
            expected_lat: 0.0,
            expected_lng: 0.0,
            expected_distance: None,
            expected_medicine: "Insulin",
            expected_price: None,
        },
        GoldenCase {
            id: "flat-store-view",
            input: json!({
                "id": "s3",
                "name": "CarePlus",
                "fullAddress": "1 A St, Pune",
                "openingHours": "Open 24 hours",
                "rating": 0,
                "totalReviews": "3",
                "latitude": "abc",
                "longitude": "18.5xyz",
                "distanceKm": 0.4,
                "medicine": {"name": "Aspirin", "price": 5}
            }),
            shape: RowShape::StoreView,
            expected_store_id: "s3",
            expected_name: "CarePlus",
            expected_address: "Address not available",
            expected_full_address: "1 A St, Pune",
            // A stored 0 is a real rating; only missing, negative or
            // unparseable values fall back to 4.0.
            expected_rating: 0.0,
            expected_reviews: 3,
            expected_open: true,
            expected_hours: "Open 24 hours",
            expected_lat: 0.0,
            expected_lng: 18.5,
            expected_distance: Some(0.4),
            expected_medicine: "Aspirin",
            expected_price: Some(5.0),
        },
        GoldenCase {
            id: "malformed-numbers",
            input: json!({
                "name": "Cetirizine",
                "price": "abc",
                "stores": {
                    "id": "s4",
                    "rating": "excellent",
                    "total_reviews": -4,
                    "latitude": "NaN",
                    "longitude": "Infinity",
                    "opening_time": "9am",
                    "closing_time": "21:00"
                }
            }),
            shape: RowShape::Joined,
            expected_store_id: "s4",
            expected_name: "Unknown Store",
            expected_address: "Address not available",
            expected_full_address: "Address not available",
            expected_rating: 4.0,
            expected_reviews: 0,
            expected_open: true,
            expected_hours: "9am - 9:00 PM",
            expected_lat: 0.0,
            expected_lng: 0.0,
            expected_distance: None,
            expected_medicine: "Cetirizine",
            expected_price: None,
        },
    ]
}

#[test]
fn test_golden_cases() {
    for case in get_golden_cases() {
        assert_eq!(RowShape::classify(&case.input), case.shape, "case {}", case.id);

        let store = normalize_row(&case.input);
        assert_eq!(store.id, case.expected_store_id, "case {}: id", case.id);
        assert_eq!(store.name, case.expected_name, "case {}: name", case.id);
        assert_eq!(store.address, case.expected_address, "case {}: address", case.id);
        assert_eq!(store.full_address, case.expected_full_address, "case {}: full address", case.id);
        assert_eq!(store.rating, case.expected_rating, "case {}: rating", case.id);
        assert_eq!(store.total_reviews, case.expected_reviews, "case {}: reviews", case.id);
        assert_eq!(store.is_open, case.expected_open, "case {}: is_open", case.id);
        assert_eq!(store.opening_hours, case.expected_hours, "case {}: hours", case.id);
        assert_eq!(store.latitude, case.expected_lat, "case {}: latitude", case.id);
        assert_eq!(store.longitude, case.expected_lng, "case {}: longitude", case.id);
        assert_eq!(store.distance_km, case.expected_distance, "case {}: distance", case.id);
        assert_eq!(store.medicine.name, case.expected_medicine, "case {}: medicine", case.id);
        assert_eq!(store.medicine.price, case.expected_price, "case {}: price", case.id);
    }
}

#[test]
fn test_joined_row_medicine_details() {
    let store = normalize_row(&get_golden_cases()[1].input);
    assert_eq!(store.medicine.generic_name.as_deref(), Some("Human insulin"));
    assert!(store.medicine.requires_prescription);
}

#[test]
fn test_ranks_follow_input_order() {
    let rows: Vec<Value> = get_golden_cases().into_iter().map(|c| c.input).collect();
    let stores = normalize_rows(&rows);

    let ids: Vec<&str> = stores.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "s2", "s3", "s4"]);
    let ranks: Vec<usize> = stores.iter().map(|s| s.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4]);
    assert!(stores[0].is_nearest());
    assert!(!stores[1].is_nearest());
}

#[test]
fn test_serializes_camel_case() {
    let store = normalize_row(&get_golden_cases()[0].input);
    let value = serde_json::to_value(&store).unwrap();

    assert_eq!(value["fullAddress"], json!("12 Link Rd, Mumbai, MH, 400001"));
    assert_eq!(value["openingHours"], json!("8:30 AM - 10:00 PM"));
    assert_eq!(value["medicine"]["genericName"], json!("Acetaminophen"));
}
