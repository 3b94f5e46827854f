//! Human-readable order numbers.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Number of random hex characters appended to an order number (48 bits).
const RANDOM_SUFFIX_LEN: usize = 12;

/// Generates an order number of the form `ORD-{unix_seconds}-{RANDOM}`.
///
/// The random suffix comes from a v4 UUID, so two orders created within the
/// same second collide with probability around 2^-48.
pub fn generate_order_number() -> String {
    generate_order_number_at(Utc::now())
}

pub(crate) fn generate_order_number_at(now: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("ORD-{}-{}", now.timestamp(), &random[..RANDOM_SUFFIX_LEN])
}
