//! Individual value generators for each variable kind.
//!
//! Every generator returns the final string form of the value. Randomness
//! comes from the caller's RNG so tests can seed it.

pub mod numeric;
pub mod sequence;
pub mod text;
pub mod timestamp;
pub mod uuid;

use crate::error::GenerateError;
use payload_core::{FormattingOptions, PayloadContext, RandomValueDefinition};
use rand::Rng;

/// Generate a value for `definition`.
///
/// Date/time kinds fall back to `formatting` when the definition carries no
/// format of its own.
pub fn generate_value<R: Rng + ?Sized>(
    definition: &RandomValueDefinition,
    context: &PayloadContext,
    formatting: &FormattingOptions,
    rng: &mut R,
) -> Result<String, GenerateError> {
    match definition {
        RandomValueDefinition::Number { min, max, padding } => {
            Ok(numeric::generate_number(rng, *min, *max, *padding))
        }

        RandomValueDefinition::Text { length } => Ok(text::generate_text(rng, *length)),

        RandomValueDefinition::Guid => Ok(uuid::generate_guid(rng)),

        RandomValueDefinition::Ulid => Ok(uuid::generate_ulid(rng)),

        RandomValueDefinition::DateTime { from, to, format } => timestamp::generate_datetime(
            rng,
            *from,
            *to,
            format.as_deref().unwrap_or(&formatting.datetime),
        ),

        RandomValueDefinition::Date { from, to, format } => timestamp::generate_date(
            rng,
            *from,
            *to,
            format.as_deref().unwrap_or(&formatting.date),
        ),

        RandomValueDefinition::Time { from, to, format } => timestamp::generate_time(
            rng,
            *from,
            *to,
            format.as_deref().unwrap_or(&formatting.time),
        ),

        RandomValueDefinition::Sequence {
            start,
            step,
            padding,
            ..
        } => sequence::generate_sequence(*start, *step, *padding, context.index),
    }
}
