use std::collections::{HashMap, HashSet};

use tokio::sync::oneshot;

use crate::{error::LoadError, loader_stats::LoaderStats};

pub(crate) type LoadResponse<K, V, E> = Result<HashMap<K, V>, LoadError<K, E>>;

/// Set of possible requests that can be sent to the [`crate::loader_worker::LoaderWorker`].
#[derive(Debug)]
pub(crate) enum LoaderOp<K, V, E> {
    /// Attach keys to the open batch and answer once that batch has been fetched.
    Load(LoadRequest<K, V, E>),
    /// Close the open batch now instead of waiting for the scheduler.
    Flush,
    /// Report the worker's counters.
    Stats(oneshot::Sender<LoaderStats>),
}

/// One caller's request: the keys it asked for and the channel its answer goes back on.
#[derive(Debug)]
pub(crate) struct LoadRequest<K, V, E> {
    keys: HashSet<K>,
    response_tx: oneshot::Sender<LoadResponse<K, V, E>>,
}

impl<K, V, E> LoadRequest<K, V, E> {
    pub fn new(keys: HashSet<K>, response_tx: oneshot::Sender<LoadResponse<K, V, E>>) -> Self {
        Self { keys, response_tx }
    }

    pub fn keys(&self) -> &HashSet<K> {
        &self.keys
    }

    /// Delivers the answer. A caller that stopped waiting has dropped its receiver, in which case
    /// the answer is discarded.
    pub fn send_response(self, response: LoadResponse<K, V, E>) {
        if self.response_tx.send(response).is_err() {
            tracing::debug!(keys = self.keys.len(), "receiver dropped, discarding response");
        }
    }
}
