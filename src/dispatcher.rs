use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use crate::{batch_function::BatchFunction, error::LoadError, pending_batch::PendingBatch};

/// Fetches a closed batch with a single call to the batch function and answers every waiter.
///
/// On success each waiter receives the part of the result it asked for. On failure every waiter
/// receives the same error.
pub(crate) async fn dispatch<K, V, F>(
    mut batch: PendingBatch<K, V, F::Error>,
    batch_fn: Arc<F>,
    require_all_keys: bool,
) where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    V: Clone + Send,
    F: BatchFunction<K, V>,
{
    batch.mark_dispatched();
    let result = batch_fn.load(batch.keys()).await;

    match result {
        Ok(loaded) => {
            tracing::debug!(loaded = loaded.len(), "batch loaded");
            for waiter in batch.into_waiters() {
                let response = fan_out(waiter.keys(), &loaded, require_all_keys);
                waiter.send_response(response);
            }
        }
        Err(e) => {
            tracing::warn!(error = ?e, "batch function failed");
            let e = Arc::new(e);
            for waiter in batch.into_waiters() {
                waiter.send_response(Err(LoadError::BatchFailed(Arc::clone(&e))));
            }
        }
    }
}

/// Restricts the batch result to one waiter's keys.
fn fan_out<'a, K, V, E, I>(
    keys: I,
    loaded: &HashMap<K, V>,
    require_all_keys: bool,
) -> Result<HashMap<K, V>, LoadError<K, E>>
where
    K: 'a + Eq + Hash + Clone,
    V: Clone,
    I: IntoIterator<Item = &'a K>,
{
    let mut found = HashMap::new();
    let mut missing = HashSet::new();
    for key in keys {
        match loaded.get(key) {
            Some(value) => {
                found.insert(key.clone(), value.clone());
            }
            None => {
                missing.insert(key.clone());
            }
        }
    }
    if require_all_keys && !missing.is_empty() {
        return Err(LoadError::MissingKeys(missing));
    }
    Ok(found)
}
