use crate::scheduler::CloseReason;

/// Counters kept by the loader worker. Obtain a snapshot with [`crate::Loader::stats`].
///
/// `batches_dispatched` always equals the number of times the batch function was called.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoaderStats {
    /// Number of non-empty load requests received by the worker.
    pub load_requests: u64,
    /// The total number of keys that were requested (not necessarily unique).
    pub keys_requested: u64,
    /// Number of batches handed to the dispatcher.
    pub batches_dispatched: u64,
    /// The total number of unique keys sent to the batch function.
    pub keys_dispatched: u64,
    /// The max number of unique keys fetched in a single batch.
    pub max_batch_keys: u64,
    /// The min number of unique keys fetched in a single batch. Zero until a batch is dispatched.
    pub min_batch_keys: u64,
    /// The average number of unique keys fetched per batch.
    pub average_batch_keys: f64,

    /// Batches closed because they reached `max_batch_size` distinct keys.
    pub closed_by_max_batch_size: u64,
    /// Batches closed because their window elapsed.
    pub closed_by_window: u64,
    /// Batches closed at the end of the worker's execution frame.
    pub closed_by_yield_boundary: u64,
    /// Batches closed by [`crate::Loader::flush`].
    pub closed_by_flush: u64,
    /// Batches dispatched because the loader was dropped while they were open.
    pub closed_by_shutdown: u64,
}

impl LoaderStats {
    pub(crate) fn record_load_request(&mut self, keys_requested: usize) {
        self.load_requests += 1;
        self.keys_requested += keys_requested as u64;
    }

    pub(crate) fn record_batch_closed(&mut self, unique_keys: usize, reason: CloseReason) {
        let unique_keys = unique_keys as u64;
        if self.batches_dispatched == 0 || unique_keys < self.min_batch_keys {
            self.min_batch_keys = unique_keys;
        }
        if unique_keys > self.max_batch_keys {
            self.max_batch_keys = unique_keys;
        }
        self.batches_dispatched += 1;
        self.keys_dispatched += unique_keys;
        self.average_batch_keys = self.keys_dispatched as f64 / self.batches_dispatched as f64;

        match reason {
            CloseReason::MaxBatchSize => self.closed_by_max_batch_size += 1,
            CloseReason::Window => self.closed_by_window += 1,
            CloseReason::YieldBoundary => self.closed_by_yield_boundary += 1,
            CloseReason::Flush => self.closed_by_flush += 1,
            CloseReason::Shutdown => self.closed_by_shutdown += 1,
        }
    }

    /// Requested keys saved by coalescing: keys asked for by callers minus keys actually fetched.
    pub fn keys_coalesced(&self) -> u64 {
        self.keys_requested.saturating_sub(self.keys_dispatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_batch_size_extremes() {
        let mut stats = LoaderStats::default();
        stats.record_load_request(3);
        stats.record_load_request(3);
        stats.record_batch_closed(5, CloseReason::YieldBoundary);
        stats.record_load_request(2);
        stats.record_batch_closed(1, CloseReason::MaxBatchSize);

        assert_eq!(stats.load_requests, 3);
        assert_eq!(stats.batches_dispatched, 2);
        assert_eq!(stats.min_batch_keys, 1);
        assert_eq!(stats.max_batch_keys, 5);
        assert_eq!(stats.average_batch_keys, 3.0);
        assert_eq!(stats.keys_coalesced(), 2);
        assert_eq!(stats.closed_by_yield_boundary, 1);
        assert_eq!(stats.closed_by_max_batch_size, 1);
    }
}
