//! payload-sender: render templated message payloads and publish them.
//!
//! [`run`] drives one invocation end to end:
//!
//! 1. load the definition document ([`payload_core::Definition`])
//! 2. expand it into scheduled items ([`payload_publish::schedule`])
//! 3. render and publish (or only render, with `--validate`) on a worker pool
//! 4. advance `sequence` variables flagged with `update` and write the
//!    document back
//!
//! Broker adapters are compiled in with the `amqp` / `mqtt` features.

use anyhow::Context;
use payload_core::{persist_sequence_progress, Definition};
use payload_generator::PayloadBuilder;
use payload_publish::{
    adapters, available_parallelism, resolve_parallelism, round3, schedule, DispatchError,
    DispatchMetrics, Dispatcher, Publisher, SendArgs,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Every scheduled item was processed (some may have failed).
    Completed(DispatchMetrics),
    /// The definition produced no items; nothing was sent or persisted.
    NothingScheduled,
    /// Ctrl+C (or another cancel) stopped the run before it finished.
    Cancelled,
}

/// Run one send (or validation) pass.
pub async fn run(args: &SendArgs, cancel: CancellationToken) -> anyhow::Result<RunOutcome> {
    run_with_publisher(args, cancel, None).await
}

/// Like [`run`], but publish through `publisher` instead of connecting to
/// the broker named in the document.
pub async fn run_with_publisher(
    args: &SendArgs,
    cancel: CancellationToken,
    publisher: Option<Arc<dyn Publisher>>,
) -> anyhow::Result<RunOutcome> {
    let mut definition = Definition::from_file(&args.definition)
        .with_context(|| format!("Failed to load definition from {:?}", args.definition))?;

    if let Some(threads) = args.threads {
        definition.threads = threads;
    }

    let items = schedule(&definition.payloads, definition.iterations, &definition.routes);
    let scheduled = items.len();
    let available = available_parallelism();
    log_summary(&definition, scheduled, available);

    if scheduled == 0 {
        info!("No payloads scheduled.");
        return Ok(RunOutcome::NothingScheduled);
    }

    let workers = resolve_parallelism(definition.threads, available, scheduled);
    let builder = Arc::new(PayloadBuilder::new(definition.formatting.clone()));
    let mut dispatcher = Dispatcher::new(builder, cancel).with_workers(workers);

    let publisher = if args.validate {
        info!("Validation mode: payloads are rendered but not sent.");
        None
    } else {
        let publisher = match publisher {
            Some(publisher) => publisher,
            None => connect(&definition).await?,
        };
        dispatcher = dispatcher.with_publisher(Arc::clone(&publisher));
        Some(publisher)
    };

    let result = dispatcher.run(items).await;

    if let Some(publisher) = &publisher {
        if let Err(e) = publisher.close().await {
            warn!("Failed to close broker connection: {}", e);
        }
    }

    let metrics = match result {
        Ok(metrics) => metrics,
        Err(DispatchError::Cancelled) => {
            info!("Operation cancelled by user.");
            return Ok(RunOutcome::Cancelled);
        }
        Err(e) => return Err(e).context("Dispatch failed"),
    };

    report(&definition, &metrics, args.validate);

    match persist_sequence_progress(&mut definition.document, metrics.scheduled) {
        Ok(advance) if advance.advanced > 0 => info!(
            "Updated {} sequence variable(s) in {}",
            advance.advanced,
            definition.path().display()
        ),
        Ok(_) => {}
        Err(e) => warn!("Unable to persist updated sequence values: {}", e),
    }

    if let Some(path) = &args.emit_metrics {
        match metrics.write_report(path) {
            Ok(()) => info!("Metrics written to {}", path.display()),
            Err(e) => warn!("Failed to write metrics to {}: {}", path.display(), e),
        }
    }

    Ok(RunOutcome::Completed(metrics))
}

async fn connect(definition: &Definition) -> anyhow::Result<Arc<dyn Publisher>> {
    let protocol = definition.connection.protocol;
    if !adapters::is_available(protocol) {
        anyhow::bail!(
            "Protocol '{}' is not available in this build; rebuild with `--features {}` or use --validate",
            protocol,
            adapters::feature_for(protocol)
        );
    }

    adapters::connect(&definition.connection)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to {}",
                definition.connection.masked_target()
            )
        })
}

fn log_summary(definition: &Definition, scheduled: usize, available: usize) {
    debug!("Definition file: {}", definition.path().display());
    debug!("Protocol: {}", definition.connection.protocol);
    debug!(
        "Default message type: '{}', exchange: '{}', routing key: '{}'",
        definition.routes.message_type,
        definition.routes.exchange,
        definition
            .routes
            .routing_key
            .as_deref()
            .unwrap_or(&definition.routes.message_type)
    );
    debug!(
        "Payloads per iteration: {}, iterations: {}, scheduled: {}",
        definition.payloads.len(),
        definition.iterations,
        scheduled
    );
    debug!(
        "Configured threads: {}, machine parallelism: {}",
        definition.threads, available
    );
    debug!("Target: {}", definition.connection.masked_target());
}

fn report(definition: &Definition, metrics: &DispatchMetrics, validate: bool) {
    info!(
        "{} payload(s) per iteration x {} iteration(s) = {} message(s)",
        definition.payloads.len(),
        definition.iterations,
        metrics.scheduled
    );

    if validate {
        info!(
            "Validation completed successfully. {} message(s) would be sent.",
            metrics.succeeded
        );
    } else {
        info!(
            "Sent {} message(s) in {:.3}s ({} msg/s) with {} worker(s)",
            metrics.succeeded,
            metrics.elapsed.as_secs_f64(),
            round3(metrics.messages_per_second()),
            metrics.workers
        );
    }

    if metrics.failed > 0 {
        warn!("{} message(s) failed; see errors above.", metrics.failed);
    }
}
