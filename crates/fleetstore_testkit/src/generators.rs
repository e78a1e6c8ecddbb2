//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random warranty data, sort
//! specifications and page requests.

use crate::fixtures::{Customer, WarrantyClaim};
use fleetstore_core::SortKey;
use proptest::prelude::*;
use uuid::Uuid;

/// Claim statuses used by the warranty workflow.
pub const CLAIM_STATUSES: [&str; 4] = ["Sent", "Pending", "Accepted", "Processed"];

/// Strategy for customer names: short, mixed case, with frequent repeats
/// so that ties in ordering actually occur.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Ada".to_string()),
        Just("ada".to_string()),
        Just("Grace".to_string()),
        prop::string::string_regex("[A-Za-z]{1,6}").expect("Invalid regex"),
    ]
}

/// Strategy for a list of customers with distinct IDs `1..=n`.
pub fn customers_strategy(max: usize) -> impl Strategy<Value = Vec<Customer>> {
    prop::collection::vec(
        (
            name_strategy(),
            prop::option::of(prop::string::string_regex("[a-z ]{0,8}").expect("Invalid regex")),
            0u8..3,
        ),
        0..max,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (name, address, bucket))| Customer {
                id: i as i64 + 1,
                phone: format!("555-{bucket}"),
                email: format!("{}@example.com", name.to_lowercase()),
                name,
                address,
                vehicles: Vec::new(),
            })
            .collect()
    })
}

/// Strategy for a list of claims with distinct IDs.
pub fn claims_strategy(max: usize) -> impl Strategy<Value = Vec<WarrantyClaim>> {
    prop::collection::vec(
        (
            prop::sample::select(CLAIM_STATUSES.to_vec()),
            19_000i64..19_010,
            any::<bool>(),
        ),
        0..max,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (status, claim_date, archived))| WarrantyClaim {
                id: Uuid::from_u128(i as u128 + 1),
                vehicle_id: Uuid::from_u128(0x1001),
                claim_date,
                status: status.to_string(),
                archived,
                ..WarrantyClaim::default()
            })
            .collect()
    })
}

/// Strategy for customer sort specifications. Names vary in case and
/// include properties that do not exist.
pub fn customer_sort_strategy() -> impl Strategy<Value = Vec<SortKey>> {
    prop::collection::vec(
        (
            prop::sample::select(vec![
                "Name", "name", "PHONE", "Address", "Id", "Colour", "vin",
            ]),
            any::<bool>(),
        )
            .prop_map(|(name, ascending)| SortKey::new(name, ascending)),
        0..4,
    )
}

/// Strategy for `(page_number, page_size)` requests, including the
/// non-positive values that disable pagination.
pub fn page_request_strategy() -> impl Strategy<Value = (i64, i64)> {
    (-2i64..8, -1i64..7)
}

/// Strategy for key text that stresses the encoded key form: delimiters,
/// escapes and the `null` literal.
pub fn key_text_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("null".to_string()),
        Just("::".to_string()),
        prop::string::string_regex(r"[a-z:\\]{0,8}").expect("Invalid regex"),
    ]
}
