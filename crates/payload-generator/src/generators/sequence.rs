//! Index-derived sequence values.

use crate::error::GenerateError;
use crate::format::pad_integer;

/// `start + (index - 1) * step`, where `index` is the 1-based global index of
/// the scheduled item.
pub fn generate_sequence(
    start: i64,
    step: i64,
    padding: Option<usize>,
    index: u64,
) -> Result<String, GenerateError> {
    let overflow = || GenerateError::SequenceOverflow { start, step, index };

    let offset = i64::try_from(index.saturating_sub(1)).map_err(|_| overflow())?;
    let value = offset
        .checked_mul(step)
        .and_then(|delta| start.checked_add(delta))
        .ok_or_else(overflow)?;

    Ok(pad_integer(value, padding))
}
