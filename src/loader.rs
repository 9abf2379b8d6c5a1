use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use tokio::sync::{mpsc, oneshot};

use crate::{
    batch_function::BatchFunction,
    config::LoaderConfig,
    error::{ConfigError, LoadError},
    loader_op::{LoadRequest, LoaderOp},
    loader_stats::LoaderStats,
    loader_worker::LoaderWorker,
};

/// Coalesces concurrent keyed lookups into batched calls of a [`BatchFunction`].
///
/// Users call [`Loader::load_by_ids`] (or the [`Loader::load`] and [`Loader::load_many`]
/// conveniences) from as many tasks as they like. Requests that arrive while a batch is open are
/// merged into it, each distinct key is fetched once per batch, and each caller gets back exactly
/// the keys it asked for.
///
/// The `Loader` struct acts as an intermediary between the async domain in which `load` calls are
/// invoked and the pseudo-single-threaded domain of the `LoaderWorker`. Callers enqueue their
/// requests on the worker's queue and await a oneshot response. The worker owns the open batch;
/// closed batches are fetched on their own tasks.
///
/// A `Loader` must be created inside a tokio runtime. Share it between tasks with an `Arc`.
/// Dropping it closes the request queue: the worker dispatches whatever batch is still open, logs
/// its final stats and exits. Batches already being fetched still answer their callers.
pub struct Loader<K, V, E> {
    request_tx: mpsc::UnboundedSender<LoaderOp<K, V, E>>,
}

impl<K, V, E> Loader<K, V, E>
where
    K: 'static + Eq + Hash + Clone + Debug + Send + Sync,
    V: 'static + Clone + Send + Sync,
    E: 'static + Debug + Send + Sync,
{
    /// Creates a new Loader for the provided BatchFunction with the default configuration: a batch
    /// closes once the worker runs out of queued requests.
    pub fn new<F>(batch_fn: F) -> Self
    where
        F: BatchFunction<K, V, Error = E>,
    {
        Self::spawn(batch_fn, &LoaderConfig::default())
    }

    /// Creates a new Loader with an explicit configuration, rejecting invalid ones.
    pub fn with_config<F>(batch_fn: F, config: LoaderConfig) -> Result<Self, ConfigError>
    where
        F: BatchFunction<K, V, Error = E>,
    {
        config.validate()?;
        Ok(Self::spawn(batch_fn, &config))
    }

    fn spawn<F>(batch_fn: F, config: &LoaderConfig) -> Self
    where
        F: BatchFunction<K, V, Error = E>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        // Detached: the worker exits once `request_tx` is dropped.
        tokio::task::spawn(LoaderWorker::new(batch_fn, rx, config).start());
        Self { request_tx: tx }
    }
}

impl<K, V, E> Loader<K, V, E>
where
    K: Eq + Hash + Clone,
{
    /// Loads the values of `ids` from the underlying resource.
    ///
    /// The returned map holds a value for every requested key the batch function returned, and
    /// nothing else. An empty request is answered immediately without joining a batch. If the
    /// batch function fails, every caller in that batch gets the same
    /// [`LoadError::BatchFailed`].
    pub async fn load_by_ids<I>(&self, ids: I) -> Result<HashMap<K, V>, LoadError<K, E>>
    where
        I: IntoIterator<Item = K>,
    {
        let keys = ids.into_iter().collect::<HashSet<_>>();
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(LoaderOp::Load(LoadRequest::new(keys, response_tx)))
            .map_err(|_| LoadError::Disconnected)?;
        response_rx.await.map_err(|_| LoadError::Disconnected)?
    }

    /// Loads a single value.
    ///
    /// Returns `Ok(None)` if the batch function did not return the key.
    pub async fn load(&self, key: K) -> Result<Option<V>, LoadError<K, E>> {
        let mut values = self.load_by_ids(std::iter::once(key.clone())).await?;
        Ok(values.remove(&key))
    }

    /// Loads many values at once, answering positionally: the i-th entry belongs to `keys[i]`.
    /// Repeated keys are fetched once.
    pub async fn load_many(&self, keys: Vec<K>) -> Result<Vec<Option<V>>, LoadError<K, E>>
    where
        V: Clone,
    {
        let values = self.load_by_ids(keys.iter().cloned()).await?;
        Ok(keys.iter().map(|k| values.get(k).cloned()).collect())
    }

    /// Closes the open batch now rather than waiting for the flush policy.
    pub fn flush(&self) -> Result<(), LoadError<K, E>> {
        self.request_tx.send(LoaderOp::Flush).map_err(|_| LoadError::Disconnected)
    }

    /// Returns a snapshot of the worker's counters.
    pub async fn stats(&self) -> Result<LoaderStats, LoadError<K, E>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx.send(LoaderOp::Stats(response_tx)).map_err(|_| LoadError::Disconnected)?;
        response_rx.await.map_err(|_| LoadError::Disconnected)
    }
}
