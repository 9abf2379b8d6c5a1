use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scheduler::FlushPolicy;

/// Tuning knobs for a [`crate::Loader`].
///
/// With no `window_millis` the loader closes a batch at the end of the worker's execution frame
/// (after `yield_rounds` extra yields). With `window_millis` set, a batch stays open for that long
/// after its first request instead. `max_batch_size` applies under both policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Force-close a batch once it holds this many distinct keys.
    pub max_batch_size: Option<usize>,
    /// Close a batch this long after its first request.
    pub window_millis: Option<u64>,
    /// Times the worker yields to the runtime, draining newly queued requests after each yield,
    /// before closing a batch at the end of a frame.
    pub yield_rounds: usize,
    /// Report keys the batch function did not return as [`crate::LoadError::MissingKeys`].
    pub require_all_keys: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { max_batch_size: None, window_millis: None, yield_rounds: 1, require_all_keys: false }
    }
}

impl LoaderConfig {
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = Some(max_batch_size);
        self
    }

    /// Sets the batch window. Windows have millisecond granularity; a fractional millisecond is
    /// rounded up so that a non-zero window never collapses to zero.
    pub fn with_window(mut self, window: Duration) -> Self {
        let partial = u128::from(window.subsec_nanos() % 1_000_000 != 0);
        let millis = window.as_millis() + partial;
        self.window_millis = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }

    pub fn with_yield_rounds(mut self, yield_rounds: usize) -> Self {
        self.yield_rounds = yield_rounds;
        self
    }

    pub fn with_require_all_keys(mut self, require_all_keys: bool) -> Self {
        self.require_all_keys = require_all_keys;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.max_batch_size {
            Some(0) => Err(ConfigError::ZeroMaxBatchSize),
            _ => Ok(()),
        }
    }

    pub fn flush_policy(&self) -> FlushPolicy {
        match self.window_millis {
            Some(millis) => FlushPolicy::Window(Duration::from_millis(millis)),
            None => FlushPolicy::YieldBoundary { yield_rounds: self.yield_rounds },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_closes_on_yield_boundary() {
        let config = LoaderConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.flush_policy(), FlushPolicy::YieldBoundary { yield_rounds: 1 });
    }

    #[test]
    fn window_selects_window_policy() {
        let config = LoaderConfig::default().with_window(Duration::from_millis(5));
        assert_eq!(config.flush_policy(), FlushPolicy::Window(Duration::from_millis(5)));
    }

    #[test]
    fn sub_millisecond_window_rounds_up() {
        let config = LoaderConfig::default().with_window(Duration::from_micros(300));
        assert_eq!(config.window_millis, Some(1));
        assert_eq!(config.flush_policy(), FlushPolicy::Window(Duration::from_millis(1)));

        let config = LoaderConfig::default().with_window(Duration::from_micros(1500));
        assert_eq!(config.window_millis, Some(2));

        let config = LoaderConfig::default().with_window(Duration::from_millis(7));
        assert_eq!(config.window_millis, Some(7));
    }

    #[test]
    fn huge_window_saturates() {
        let config = LoaderConfig::default().with_window(Duration::MAX);
        assert_eq!(config.window_millis, Some(u64::MAX));
    }

    #[test]
    fn zero_max_batch_size_is_rejected() {
        let config = LoaderConfig::default().with_max_batch_size(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroMaxBatchSize));
    }

    #[test]
    fn deserializes_partial_json() {
        let config: LoaderConfig =
            serde_json::from_str(r#"{"max_batch_size": 100, "window_millis": 2}"#).unwrap();
        assert_eq!(
            config,
            LoaderConfig {
                max_batch_size: Some(100),
                window_millis: Some(2),
                yield_rounds: 1,
                require_all_keys: false,
            }
        );
    }
}
