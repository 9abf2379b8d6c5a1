use std::collections::HashSet;
use std::hash::Hash;

use tokio::time::Instant;

use crate::loader_op::LoadRequest;

/// Lifecycle of a [`PendingBatch`]. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BatchState {
    Open,
    Closing,
    Dispatched,
}

/// Keys and waiters collected for one call of the batch function.
///
/// `collected_keys` is always the union of the keys of every attached waiter. Once the batch
/// leaves `Open` it refuses new waiters.
#[derive(Debug)]
pub(crate) struct PendingBatch<K, V, E> {
    id: u64,
    opened_at: Instant,
    collected_keys: HashSet<K>,
    waiters: Vec<LoadRequest<K, V, E>>,
    state: BatchState,
}

impl<K, V, E> PendingBatch<K, V, E>
where
    K: Eq + Hash + Clone,
{
    pub fn new(id: u64) -> Self {
        Self {
            id,
            opened_at: Instant::now(),
            collected_keys: HashSet::new(),
            waiters: Vec::new(),
            state: BatchState::Open,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    #[cfg(test)]
    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn keys(&self) -> &HashSet<K> {
        &self.collected_keys
    }

    pub fn key_count(&self) -> usize {
        self.collected_keys.len()
    }

    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    /// Number of `keys` this batch does not already hold.
    pub fn new_key_count(&self, keys: &HashSet<K>) -> usize {
        keys.iter().filter(|k| !self.collected_keys.contains(*k)).count()
    }

    /// Adds a waiter. A batch that is no longer open hands the request back so it can be attached
    /// to the next batch.
    pub fn attach(&mut self, request: LoadRequest<K, V, E>) -> Result<(), LoadRequest<K, V, E>> {
        if self.state != BatchState::Open {
            return Err(request);
        }
        self.collected_keys.extend(request.keys().iter().cloned());
        self.waiters.push(request);
        Ok(())
    }

    pub fn begin_closing(&mut self) {
        debug_assert_eq!(self.state, BatchState::Open, "batch {} closed twice", self.id);
        self.state = BatchState::Closing;
    }

    pub fn mark_dispatched(&mut self) {
        debug_assert_eq!(
            self.state,
            BatchState::Closing,
            "batch {} dispatched before closing",
            self.id
        );
        self.state = BatchState::Dispatched;
    }

    pub fn into_waiters(self) -> Vec<LoadRequest<K, V, E>> {
        self.waiters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader_op::LoadResponse;
    use tokio::sync::oneshot;

    type Response = LoadResponse<u32, String, ()>;

    fn request(keys: &[u32]) -> (LoadRequest<u32, String, ()>, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        (LoadRequest::new(keys.iter().copied().collect(), tx), rx)
    }

    #[tokio::test]
    async fn collected_keys_are_union_of_waiters() {
        let mut batch = PendingBatch::new(1);
        let (first, _rx1) = request(&[1, 2, 3]);
        let (second, _rx2) = request(&[3, 4, 5]);

        assert!(batch.attach(first).is_ok());
        assert!(batch.attach(second).is_ok());

        let expected: HashSet<u32> = [1, 2, 3, 4, 5].into_iter().collect();
        assert_eq!(batch.keys(), &expected);
        assert_eq!(batch.waiter_count(), 2);
    }

    #[tokio::test]
    async fn counts_only_unseen_keys() {
        let mut batch = PendingBatch::new(1);
        let (first, _rx) = request(&[1, 2]);
        batch.attach(first).unwrap();

        let incoming: HashSet<u32> = [2, 3, 4].into_iter().collect();
        assert_eq!(batch.new_key_count(&incoming), 2);
    }

    #[tokio::test]
    async fn closing_batch_hands_request_back() {
        let mut batch = PendingBatch::new(7);
        let (first, _rx1) = request(&[1]);
        batch.attach(first).unwrap();
        batch.begin_closing();
        assert_eq!(batch.state(), BatchState::Closing);

        let (late, _rx2) = request(&[2]);
        let rejected = batch.attach(late).unwrap_err();
        assert_eq!(rejected.keys().len(), 1);
        assert_eq!(batch.key_count(), 1);

        batch.mark_dispatched();
        assert_eq!(batch.state(), BatchState::Dispatched);
        assert_eq!(batch.into_waiters().len(), 1);
    }
}
