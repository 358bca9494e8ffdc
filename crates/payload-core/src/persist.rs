//! Write advanced sequence starts back to the definition document.
//!
//! After a run that scheduled `total` payloads, every `sequence` variable with
//! `update: true` gets `start = start + total * step`, so the next run
//! continues where this one stopped.

use crate::document::DefinitionDocument;
use crate::error::DefinitionError;
use crate::loader::{read_bool, read_i64};
use serde_json::Value;
use tracing::{debug, warn};

/// Outcome of advancing sequence variables in a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceAdvance {
    /// Sequences whose `start` was rewritten.
    pub advanced: usize,
    /// Updatable sequences left untouched because the new start overflowed.
    pub skipped: usize,
}

/// Advance every updatable sequence in the document-level `variables` and in
/// each payload object's `variables`.
pub fn advance_sequences(root: &mut Value, total: u64) -> SequenceAdvance {
    let mut outcome = SequenceAdvance::default();

    if let Some(variables) = root.get_mut("variables") {
        advance_in(variables, total, &mut outcome);
    }

    if let Some(payloads) = root.get_mut("payloads").and_then(Value::as_array_mut) {
        for payload in payloads {
            if let Some(variables) = payload.get_mut("variables") {
                advance_in(variables, total, &mut outcome);
            }
        }
    }

    outcome
}

fn advance_in(variables: &mut Value, total: u64, outcome: &mut SequenceAdvance) {
    let Some(variables) = variables.as_object_mut() else {
        return;
    };

    for (name, node) in variables.iter_mut() {
        let Some(obj) = node.as_object_mut() else {
            continue;
        };

        let is_sequence = obj
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("sequence"));
        if !is_sequence || !read_bool(obj, "update") {
            continue;
        }

        let start = read_i64(obj.get("start")).unwrap_or(1);
        let step = read_i64(obj.get("step")).unwrap_or(1).max(1);

        let next = i64::try_from(total)
            .ok()
            .and_then(|total| total.checked_mul(step))
            .and_then(|delta| start.checked_add(delta));

        match next {
            Some(next) => {
                debug!("Advancing sequence '{}' from {} to {}", name, start, next);
                obj.insert("start".to_string(), Value::from(next));
                outcome.advanced += 1;
            }
            None => {
                warn!(
                    "Sequence '{}' would overflow (start {}, step {}, {} payload(s)); leaving it unchanged",
                    name, start, step, total
                );
                outcome.skipped += 1;
            }
        }
    }
}

/// Advance sequences for `total` scheduled payloads and save the document if
/// anything changed. Does nothing when `total` is 0.
pub fn persist_sequence_progress(
    document: &mut DefinitionDocument,
    total: u64,
) -> Result<SequenceAdvance, DefinitionError> {
    if total == 0 {
        return Ok(SequenceAdvance::default());
    }

    let outcome = advance_sequences(document.root_mut(), total);
    if outcome.advanced > 0 {
        document.save()?;
    }

    Ok(outcome)
}
