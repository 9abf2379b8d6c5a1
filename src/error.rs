use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Failure delivered to a caller of [`crate::Loader`].
#[derive(Debug)]
pub enum LoadError<K, E> {
    /// The batch function failed. Every caller attached to the failing batch receives a clone of
    /// the same `Arc`.
    BatchFailed(Arc<E>),
    /// The batch function did not return these requested keys and the loader was configured to
    /// require all of them. Only the keys of the caller receiving the error are included.
    MissingKeys(HashSet<K>),
    /// The loader worker or the dispatch task went away before answering.
    Disconnected,
}

impl<K: Clone, E> Clone for LoadError<K, E> {
    fn clone(&self) -> Self {
        match self {
            LoadError::BatchFailed(e) => LoadError::BatchFailed(Arc::clone(e)),
            LoadError::MissingKeys(keys) => LoadError::MissingKeys(keys.clone()),
            LoadError::Disconnected => LoadError::Disconnected,
        }
    }
}

impl<K: fmt::Debug, E: fmt::Display> fmt::Display for LoadError<K, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::BatchFailed(e) => write!(f, "batch load failed: {e}"),
            LoadError::MissingKeys(keys) => {
                write!(f, "batch function returned no value for keys {keys:?}")
            }
            LoadError::Disconnected => write!(f, "loader worker disconnected"),
        }
    }
}

impl<K, E> std::error::Error for LoadError<K, E>
where
    K: fmt::Debug,
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::BatchFailed(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Rejected [`crate::LoaderConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroMaxBatchSize,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroMaxBatchSize => write!(f, "max_batch_size must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[derive(Debug)]
    struct Unavailable;

    impl fmt::Display for Unavailable {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "backend unavailable")
        }
    }

    impl Error for Unavailable {}

    #[test]
    fn batch_failure_exposes_source() {
        let err: LoadError<u32, Unavailable> = LoadError::BatchFailed(Arc::new(Unavailable));
        assert_eq!(err.to_string(), "batch load failed: backend unavailable");
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("backend unavailable"));
    }

    #[test]
    fn clone_shares_the_failure() {
        let err: LoadError<u32, Unavailable> = LoadError::BatchFailed(Arc::new(Unavailable));
        match (&err, err.clone()) {
            (LoadError::BatchFailed(a), LoadError::BatchFailed(b)) => assert!(Arc::ptr_eq(a, &b)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_keys_message_lists_keys() {
        let err: LoadError<u32, Unavailable> = LoadError::MissingKeys(HashSet::from([7]));
        assert_eq!(err.to_string(), "batch function returned no value for keys {7}");
        assert!(err.source().is_none());
    }
}
