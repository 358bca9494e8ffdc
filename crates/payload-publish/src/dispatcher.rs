//! Render and publish scheduled items across workers.
//!
//! With one worker, items run strictly in schedule order. With `K > 1`
//! workers, worker `w` takes items `w, w + K, w + 2K, ...` and owns its own
//! publish channel. A failing item is logged and counted and the run goes on.
//! Cancellation is checked before every item and ends the run with
//! [`DispatchError::Cancelled`].

use crate::error::{DispatchError, ItemError};
use crate::metrics::{DispatchCounters, DispatchMetrics, DispatchMode};
use crate::publisher::{PublishChannel, Publisher};
use crate::scheduler::ScheduledPayload;
use payload_generator::PayloadBuilder;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Drives a run of scheduled payloads.
///
/// Without a publisher the dispatcher validates: every item is rendered (and
/// exported) but nothing is sent.
pub struct Dispatcher {
    builder: Arc<PayloadBuilder>,
    publisher: Option<Arc<dyn Publisher>>,
    workers: usize,
    cancel: CancellationToken,
}

impl Dispatcher {
    /// Create a validating dispatcher with a single worker.
    pub fn new(builder: Arc<PayloadBuilder>, cancel: CancellationToken) -> Self {
        Self {
            builder,
            publisher: None,
            workers: 1,
            cancel,
        }
    }

    /// Publish through `publisher` instead of validating.
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn mode(&self) -> DispatchMode {
        if self.publisher.is_some() {
            DispatchMode::Publish
        } else {
            DispatchMode::Validate
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process every item.
    ///
    /// Returns an error only for cancellation, a worker that cannot open its
    /// channel, or a panicked worker task. Per-item failures are counted in
    /// the returned metrics.
    pub async fn run(&self, items: Vec<ScheduledPayload>) -> Result<DispatchMetrics, DispatchError> {
        let started = Instant::now();
        let scheduled = items.len() as u64;
        let items: Arc<[ScheduledPayload]> = items.into();
        let counters = Arc::new(DispatchCounters::default());

        if self.cancel.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }

        if self.workers <= 1 {
            debug!("Dispatching sequentially with a single worker");
            self.worker(0, 1, &items, &counters).run().await?;
        } else {
            info!("Sending messages in parallel with {} worker(s).", self.workers);
            self.run_parallel(&items, &counters).await?;
        }

        if self.cancel.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }

        Ok(counters.snapshot(self.mode(), scheduled, self.workers, started.elapsed()))
    }

    async fn run_parallel(
        &self,
        items: &Arc<[ScheduledPayload]>,
        counters: &Arc<DispatchCounters>,
    ) -> Result<(), DispatchError> {
        let mut tasks = JoinSet::new();
        for id in 0..self.workers {
            let worker = self.worker(id, self.workers, items, counters);
            tasks.spawn(async move { worker.run().await });
        }

        // Every worker runs to completion; the first fatal error wins, with
        // cancellation taking precedence.
        let mut outcome = Ok(());
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(DispatchError::from).and_then(|r| r);
            match result {
                Ok(()) => {}
                Err(DispatchError::Cancelled) => outcome = Err(DispatchError::Cancelled),
                Err(e) => {
                    error!("{}", e);
                    if outcome.is_ok() {
                        outcome = Err(e);
                    }
                }
            }
        }
        outcome
    }

    fn worker(
        &self,
        id: usize,
        stride: usize,
        items: &Arc<[ScheduledPayload]>,
        counters: &Arc<DispatchCounters>,
    ) -> Worker {
        Worker {
            id,
            stride,
            items: Arc::clone(items),
            builder: Arc::clone(&self.builder),
            publisher: self.publisher.clone(),
            counters: Arc::clone(counters),
            cancel: self.cancel.clone(),
        }
    }
}

/// One worker's share of a run.
struct Worker {
    id: usize,
    stride: usize,
    items: Arc<[ScheduledPayload]>,
    builder: Arc<PayloadBuilder>,
    publisher: Option<Arc<dyn Publisher>>,
    counters: Arc<DispatchCounters>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) -> Result<(), DispatchError> {
        if self.cancel.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }

        let mut channel = match &self.publisher {
            Some(publisher) => Some(publisher.open_channel().await.map_err(|source| {
                DispatchError::Channel {
                    worker: self.id,
                    source,
                }
            })?),
            None => None,
        };
        debug!("Worker {} started (stride {})", self.id, self.stride);

        for item in self.items.iter().skip(self.id).step_by(self.stride) {
            if self.cancel.is_cancelled() {
                return Err(DispatchError::Cancelled);
            }

            match self.process(item, &mut channel).await {
                Ok(()) => self.counters.record_success(),
                Err(e) => {
                    error!("ERR {} -> {}", item.context.template_file_name, e);
                    self.counters.record_failure();
                }
            }
        }

        debug!("Worker {} finished", self.id);
        Ok(())
    }

    async fn process(
        &self,
        item: &ScheduledPayload,
        channel: &mut Option<Box<dyn PublishChannel>>,
    ) -> Result<(), ItemError> {
        let body = self.builder.build_body(&item.definition, &item.context)?;

        let Some(channel) = channel.as_mut() else {
            debug!(
                "Validated '{}' #{} ({} bytes)",
                item.context.template_file_name,
                item.context.index,
                body.len()
            );
            return Ok(());
        };

        debug!(
            "Publishing '{}' to '{}'/'{}' ({} bytes)",
            item.context.template_file_name,
            item.exchange,
            item.routing_key,
            body.len()
        );
        channel
            .publish(&item.exchange, &item.routing_key, &item.message_type, &body)
            .await?;
        info!("OK -> {} / {}", item.exchange, item.routing_key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PublishError;
    use crate::publisher::FakePublisher;
    use crate::scheduler::schedule;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use payload_core::{
        PayloadDefinition, RandomValueDefinition, RouteDefaults, VariableDefinition, VariableMap,
    };

    fn sequence_payload(name: &str) -> Arc<PayloadDefinition> {
        let mut variables = VariableMap::new();
        variables.insert(
            "seq",
            VariableDefinition::Random(RandomValueDefinition::Sequence {
                start: 10,
                step: 5,
                padding: None,
                update: true,
            }),
        );
        Arc::new(PayloadDefinition {
            variables,
            ..PayloadDefinition::new(format!("/tpl/{name}"), "{{seq}}")
        })
    }

    fn routes() -> RouteDefaults {
        RouteDefaults {
            exchange: "orders".to_string(),
            routing_key: None,
            message_type: "OrderCreated".to_string(),
        }
    }

    fn dispatcher(publisher: &FakePublisher, workers: usize) -> Dispatcher {
        Dispatcher::new(Arc::new(PayloadBuilder::default()), CancellationToken::new())
            .with_publisher(Arc::new(publisher.clone()))
            .with_workers(workers)
    }

    #[tokio::test]
    async fn test_sequential_publish_in_order() {
        let publisher = FakePublisher::new();
        let items = schedule(&[sequence_payload("a.json")], 3, &routes());

        let metrics = dispatcher(&publisher, 1).run(items).await.unwrap();

        assert_eq!(metrics.mode, DispatchMode::Publish);
        assert_eq!(metrics.scheduled, 3);
        assert_eq!(metrics.succeeded, 3);
        assert_eq!(metrics.failed, 0);
        assert_eq!(publisher.channels_opened(), 1);

        let calls = publisher.calls();
        let bodies: Vec<&str> = calls.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, vec!["10", "15", "20"]);
        assert!(calls.iter().all(|c| c.exchange == "orders"
            && c.routing_key == "OrderCreated"
            && c.message_type == "OrderCreated"));
    }

    #[tokio::test]
    async fn test_parallel_values_match_sequential() {
        let publisher = FakePublisher::new();
        let items = schedule(&[sequence_payload("a.json")], 10, &routes());

        let metrics = dispatcher(&publisher, 3).run(items).await.unwrap();
        assert_eq!(metrics.workers, 3);
        assert_eq!(metrics.succeeded, 10);
        assert_eq!(publisher.channels_opened(), 3);

        let mut values: Vec<i64> = publisher
            .calls()
            .iter()
            .map(|c| c.body.parse().unwrap())
            .collect();
        values.sort_unstable();
        let expected: Vec<i64> = (1..=10).map(|i| 10 + (i - 1) * 5).collect();
        assert_eq!(values, expected);
    }

    #[tokio::test]
    async fn test_each_worker_keeps_stride_order() {
        let publisher = FakePublisher::new();
        let items = schedule(&[sequence_payload("a.json")], 9, &routes());

        dispatcher(&publisher, 3).run(items).await.unwrap();

        let calls = publisher.calls();
        for channel in 0..3 {
            let values: Vec<i64> = calls
                .iter()
                .filter(|c| c.channel == channel)
                .map(|c| c.body.parse().unwrap())
                .collect();
            assert_eq!(values.len(), 3);
            assert!(values.windows(2).all(|w| w[1] - w[0] == 15));
        }
    }

    #[tokio::test]
    async fn test_item_failures_do_not_stop_run() {
        let publisher = FakePublisher::new();
        let broken = Arc::new(PayloadDefinition::new("/tpl/broken.json", "{{missing}}"));
        let items = schedule(&[sequence_payload("a.json"), broken], 2, &routes());

        let metrics = dispatcher(&publisher, 1).run(items).await.unwrap();

        // a#1 -> "10" ok, broken#2 render error, a#3 -> "20" ok, broken#4 render error
        assert_eq!(metrics.scheduled, 4);
        assert_eq!(metrics.succeeded, 2);
        assert_eq!(metrics.failed, 2);
        assert_eq!(publisher.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_publish_is_counted() {
        let publisher = FakePublisher::new().reject_bodies_containing("15");
        let items = schedule(&[sequence_payload("a.json")], 3, &routes());

        let metrics = dispatcher(&publisher, 1).run(items).await.unwrap();
        assert_eq!(metrics.succeeded, 2);
        assert_eq!(metrics.failed, 1);
    }

    #[tokio::test]
    async fn test_validate_mode_never_publishes() {
        let items = schedule(&[sequence_payload("a.json")], 4, &routes());
        let dispatcher = Dispatcher::new(Arc::new(PayloadBuilder::default()), CancellationToken::new())
            .with_workers(2);

        let metrics = dispatcher.run(items).await.unwrap();
        assert_eq!(metrics.mode, DispatchMode::Validate);
        assert_eq!(metrics.succeeded, 4);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let publisher = FakePublisher::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let dispatcher = Dispatcher::new(Arc::new(PayloadBuilder::default()), cancel)
            .with_publisher(Arc::new(publisher.clone()));

        let items = schedule(&[sequence_payload("a.json")], 3, &routes());
        let result = dispatcher.run(items).await;

        assert!(matches!(result, Err(DispatchError::Cancelled)));
        assert!(publisher.calls().is_empty());
    }

    /// Cancels `cancel` once `limit` publishes have gone through `inner`.
    struct CancelAfter {
        inner: FakePublisher,
        limit: usize,
        published: Arc<AtomicUsize>,
        cancel: CancellationToken,
    }

    struct CancelAfterChannel {
        inner: Box<dyn PublishChannel>,
        limit: usize,
        published: Arc<AtomicUsize>,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl Publisher for CancelAfter {
        async fn open_channel(&self) -> Result<Box<dyn PublishChannel>, PublishError> {
            Ok(Box::new(CancelAfterChannel {
                inner: self.inner.open_channel().await?,
                limit: self.limit,
                published: Arc::clone(&self.published),
                cancel: self.cancel.clone(),
            }))
        }
    }

    #[async_trait]
    impl PublishChannel for CancelAfterChannel {
        async fn publish(
            &mut self,
            exchange: &str,
            routing_key: &str,
            message_type: &str,
            body: &[u8],
        ) -> Result<(), PublishError> {
            self.inner
                .publish(exchange, routing_key, message_type, body)
                .await?;
            if self.published.fetch_add(1, Ordering::SeqCst) + 1 == self.limit {
                self.cancel.cancel();
            }
            Ok(())
        }
    }

    async fn run_cancelled_after(limit: usize, workers: usize, iterations: u32) -> FakePublisher {
        let publisher = FakePublisher::new();
        let cancel = CancellationToken::new();
        let cancelling = CancelAfter {
            inner: publisher.clone(),
            limit,
            published: Arc::new(AtomicUsize::new(0)),
            cancel: cancel.clone(),
        };
        let dispatcher = Dispatcher::new(Arc::new(PayloadBuilder::default()), cancel)
            .with_publisher(Arc::new(cancelling))
            .with_workers(workers);

        let items = schedule(&[sequence_payload("a.json")], iterations, &routes());
        let result = dispatcher.run(items).await;

        assert!(matches!(result, Err(DispatchError::Cancelled)));
        publisher
    }

    #[tokio::test]
    async fn test_cancelled_mid_run_sequential() {
        let publisher = run_cancelled_after(2, 1, 5).await;

        let bodies: Vec<String> = publisher.calls().into_iter().map(|c| c.body).collect();
        assert_eq!(bodies, vec!["10", "15"]);
    }

    #[tokio::test]
    async fn test_cancelled_mid_run_parallel() {
        let publisher = run_cancelled_after(2, 3, 9).await;

        // One worker reaches the limit; every later item, in any worker, is
        // skipped.
        let calls = publisher.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].channel, calls[1].channel);
        let first: i64 = calls[0].body.parse().unwrap();
        let second: i64 = calls[1].body.parse().unwrap();
        assert_eq!(second - first, 15);
    }

    #[tokio::test]
    async fn test_channel_open_failure_is_fatal() {
        let publisher = FakePublisher::new().fail_channel_open();
        let items = schedule(&[sequence_payload("a.json")], 4, &routes());

        let result = dispatcher(&publisher, 2).run(items).await;
        assert!(matches!(result, Err(DispatchError::Channel { .. })));
    }
}
