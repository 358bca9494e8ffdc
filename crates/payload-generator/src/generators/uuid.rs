//! GUID and ULID generators.

use chrono::Utc;
use rand::Rng;
use ulid::Ulid;
use uuid::Builder;

/// Random v4 GUID drawn from `rng`, so seeded runs repeat.
pub fn generate_guid<R: Rng + ?Sized>(rng: &mut R) -> String {
    Builder::from_random_bytes(rng.gen())
        .into_uuid()
        .to_string()
}

/// Generate a ULID stamped with the current time and random bits from `rng`.
pub fn generate_ulid<R: Rng + ?Sized>(rng: &mut R) -> String {
    let timestamp_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    Ulid::from_parts(timestamp_ms, rng.gen::<u128>()).to_string()
}
