//! Numeric value generators.

use crate::format::pad_integer;
use rand::Rng;

/// Generate a random integer in `[min, max]` (inclusive), zero-padded to
/// `padding` digits when set.
pub fn generate_number<R: Rng + ?Sized>(
    rng: &mut R,
    min: i64,
    max: i64,
    padding: Option<usize>,
) -> String {
    let (low, high) = if max < min { (max, min) } else { (min, max) };
    pad_integer(rng.gen_range(low..=high), padding)
}
