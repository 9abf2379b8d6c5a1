use std::collections::{HashMap, HashSet};
use std::fmt::Debug;

use async_trait::async_trait;

/// A `BatchFunction` defines the method through which a `Loader` fetches batched data from some
/// resource. It receives the deduplicated set of keys collected in one batch and returns whatever
/// key value pairs it could load.
///
/// The `BatchFunction` is not required to return a value for every key. Callers that asked for a
/// key that is absent from the returned map simply don't see it in their result (unless the
/// loader was configured with `require_all_keys`). Returning `Err` fails the whole batch: every
/// caller waiting on it receives the same error.
///
/// Batches are dispatched on their own tasks, so `load` may run concurrently for several batches
/// with disjoint key sets. Implementations keep any shared state behind `&self`.
#[async_trait]
pub trait BatchFunction<K, V>: Send + Sync + 'static {
    type Error: Debug + Send + Sync + 'static;

    async fn load(&self, keys: &HashSet<K>) -> Result<HashMap<K, V>, Self::Error>;
}
