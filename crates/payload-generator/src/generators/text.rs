//! Random alphanumeric text.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Generate `length` characters drawn uniformly from `[A-Za-z0-9]`.
pub fn generate_text<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length.max(1))
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}
