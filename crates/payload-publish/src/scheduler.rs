//! Expand per-iteration payloads into the ordered list of scheduled items.

use payload_core::{PayloadContext, PayloadDefinition, RouteDefaults};
use std::sync::Arc;

/// One unit of work for the dispatcher.
#[derive(Debug, Clone)]
pub struct ScheduledPayload {
    pub definition: Arc<PayloadDefinition>,
    pub context: PayloadContext,
    pub exchange: String,
    pub routing_key: String,
    pub message_type: String,
}

/// Build the full run: `iterations` passes over `payloads` in document order.
///
/// Context indices start at 1 and keep counting across iterations, so the
/// item at position `p` always has index `p + 1` regardless of how the list
/// is later split between workers.
pub fn schedule(
    payloads: &[Arc<PayloadDefinition>],
    iterations: u32,
    routes: &RouteDefaults,
) -> Vec<ScheduledPayload> {
    let total = payloads.len() * iterations as usize;
    let mut scheduled = Vec::with_capacity(total);
    let mut index = 1u64;

    for _ in 0..iterations {
        for definition in payloads {
            let exchange = definition
                .exchange
                .clone()
                .unwrap_or_else(|| routes.exchange.clone());
            let message_type = definition
                .message_type
                .clone()
                .unwrap_or_else(|| routes.message_type.clone());
            let routing_key = definition
                .routing_key
                .clone()
                .or_else(|| routes.routing_key.clone())
                .unwrap_or_else(|| message_type.clone());

            scheduled.push(ScheduledPayload {
                definition: Arc::clone(definition),
                context: PayloadContext::new(index, &definition.path),
                exchange,
                routing_key,
                message_type,
            });
            index += 1;
        }
    }

    scheduled
}

/// Machine parallelism used when no thread count is configured.
pub fn available_parallelism() -> usize {
    num_cpus::get()
}

/// Number of workers for a run of `scheduled` items.
///
/// `configured` of 0 means "use `available`". The result is never below 1
/// and never above the item count.
pub fn resolve_parallelism(configured: usize, available: usize, scheduled: usize) -> usize {
    let desired = if configured == 0 { available } else { configured };
    desired.max(1).min(scheduled.max(1))
}
