use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::FutureExt;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{span, Level};
use tracing_futures::Instrument;

use crate::{
    batch_function::BatchFunction,
    config::LoaderConfig,
    dispatcher,
    loader_op::{LoadRequest, LoaderOp},
    loader_stats::LoaderStats,
    pending_batch::PendingBatch,
    scheduler::{CloseReason, Scheduler},
};

/// A `LoaderWorker` is the "single-thread" worker task that owns the open batch.
///
/// Once started, it runs in a loop until the parent Loader drops the request queue tx channel. It
/// then dispatches the batch that is still open, if any, and exits.
///
/// The worker can be in one of three states during its lifetime:
///
/// 1. Waiting for requests (or for the open batch's window to elapse).
/// 2. Flushing the request queue and attaching each request to the open batch.
/// 3. Closing the open batch and handing it to the dispatcher.
///
/// One cycle through this loop may be called an "execution frame".
///
/// In state (1), the worker awaits any message on the request queue channel. When the scheduler
/// gives the open batch a deadline, the worker also waits on that deadline.
///
/// In state (2), the worker synchronously pulls requests from the queue until none are left. Each
/// load request is attached to the open batch, opening a new one if needed. A batch that reaches
/// the size limit is closed immediately and later requests start the next batch. Under the
/// yield-boundary policy the worker then yields to the runtime so that tasks launched in the same
/// turn get to enqueue their requests, and drains the queue again.
///
/// In state (3), the batch is moved out of the worker and dispatched on its own task. The worker
/// goes back to (1) right away, so the next batch collects while the previous one is fetched.
pub(crate) struct LoaderWorker<K, V, F>
where
    F: BatchFunction<K, V>,
{
    batch_fn: Arc<F>,
    request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V, F::Error>>,
    scheduler: Scheduler,
    require_all_keys: bool,
    open_batch: Option<PendingBatch<K, V, F::Error>>,
    next_batch_id: u64,
    stats: LoaderStats,
    debug_name: &'static str,
}

enum Wake<Op> {
    Op(Option<Op>),
    Deadline,
}

impl<K, V, F> LoaderWorker<K, V, F>
where
    K: 'static + Eq + Hash + Clone + Debug + Send + Sync,
    V: 'static + Clone + Send + Sync,
    F: BatchFunction<K, V>,
{
    pub fn new(
        batch_fn: F,
        request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V, F::Error>>,
        config: &LoaderConfig,
    ) -> Self {
        Self {
            batch_fn: Arc::new(batch_fn),
            request_rx,
            scheduler: Scheduler::new(config),
            require_all_keys: config.require_all_keys,
            open_batch: None,
            next_batch_id: 0,
            stats: LoaderStats::default(),
            debug_name: std::any::type_name::<(K, V)>(),
        }
    }

    pub async fn start(self) {
        let span = span!(
            Level::TRACE,
            "LoaderWorker",
            kv = self.debug_name,
            policy = ?self.scheduler.policy()
        );
        self.run().instrument(span).await
    }

    async fn run(mut self) {
        loop {
            // Async await until we receive the first op or the open batch's deadline passes.
            match self.next_wake().await {
                Wake::Op(None) => {
                    tracing::info!("Tx channel closed. Terminating LoaderWorker.");
                    self.close_open_batch(CloseReason::Shutdown);
                    tracing::debug!(stats = ?self.stats, "final loader stats");
                    return;
                }
                Wake::Op(Some(op)) => self.mux_op(op),
                Wake::Deadline => {
                    self.close_open_batch(CloseReason::Window);
                    continue;
                }
            }
            // Flush remainder of the op queue before closing the frame.
            self.drain_queue();
            if let Some(yield_rounds) = self.scheduler.frame_end_yields() {
                for _ in 0..yield_rounds {
                    tokio::task::yield_now().await;
                    self.drain_queue();
                }
                self.close_open_batch(CloseReason::YieldBoundary);
            }
        }
    }

    async fn next_wake(&mut self) -> Wake<LoaderOp<K, V, F::Error>> {
        let deadline: Option<Instant> =
            self.open_batch.as_ref().and_then(|batch| self.scheduler.deadline(batch));
        match deadline {
            Some(deadline) => tokio::select! {
                op = self.request_rx.recv() => Wake::Op(op),
                _ = time::sleep_until(deadline) => Wake::Deadline,
            },
            None => Wake::Op(self.request_rx.recv().await),
        }
    }

    fn drain_queue(&mut self) {
        while let Some(Some(op)) = self.request_rx.recv().now_or_never() {
            self.mux_op(op);
        }
    }

    #[tracing::instrument(skip(self, op))]
    fn mux_op(&mut self, op: LoaderOp<K, V, F::Error>) {
        match op {
            LoaderOp::Load(request) => {
                self.stats.record_load_request(request.keys().len());
                self.attach(request);
            }
            LoaderOp::Flush => self.close_open_batch(CloseReason::Flush),
            LoaderOp::Stats(response_tx) => {
                if response_tx.send(self.stats.clone()).is_err() {
                    tracing::debug!("stats receiver dropped");
                }
            }
        }
    }

    fn attach(&mut self, request: LoadRequest<K, V, F::Error>) {
        let overflows = self
            .open_batch
            .as_ref()
            .map_or(false, |batch| self.scheduler.overflows(batch, request.keys()));
        if overflows {
            self.close_open_batch(CloseReason::MaxBatchSize);
        }

        let mut request = request;
        loop {
            let next_batch_id = &mut self.next_batch_id;
            let batch = self.open_batch.get_or_insert_with(|| {
                *next_batch_id += 1;
                PendingBatch::new(*next_batch_id)
            });
            match batch.attach(request) {
                Ok(()) => break,
                // Only open batches live in the slot, but a rejected request must never be lost.
                Err(rejected) => {
                    self.open_batch = None;
                    request = rejected;
                }
            }
        }

        if let Some(batch) = self.open_batch.as_ref() {
            tracing::trace!(batch_id = batch.id(), keys = batch.key_count(), "attached request");
            if self.scheduler.is_full(batch) {
                self.close_open_batch(CloseReason::MaxBatchSize);
            }
        }
    }

    fn close_open_batch(&mut self, reason: CloseReason) {
        let mut batch = match self.open_batch.take() {
            Some(batch) => batch,
            None => return,
        };
        batch.begin_closing();
        self.stats.record_batch_closed(batch.key_count(), reason);
        tracing::debug!(
            batch_id = batch.id(),
            ?reason,
            keys = batch.key_count(),
            waiters = batch.waiter_count(),
            "closing batch"
        );

        let span = span!(
            Level::DEBUG,
            "dispatch",
            batch_id = batch.id(),
            keys = batch.key_count(),
            waiters = batch.waiter_count()
        );
        tokio::spawn(
            dispatcher::dispatch(batch, Arc::clone(&self.batch_fn), self.require_all_keys)
                .instrument(span),
        );
    }
}
