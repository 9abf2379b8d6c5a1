//! Batches concurrent keyed lookups into deduplicated bulk fetches.
//!
//! A [`Loader`] accepts point lookups from any number of tasks, merges the ones that arrive
//! together into a single batch, calls its [`BatchFunction`] once per batch with every distinct
//! key, and hands each caller the part of the result it asked for.

mod batch_function;
mod config;
mod dispatcher;
mod error;
mod loader;
mod loader_op;
mod loader_stats;
mod loader_worker;
mod pending_batch;
mod scheduler;

pub use batch_function::BatchFunction;
pub use config::LoaderConfig;
pub use error::{ConfigError, LoadError};
pub use loader::Loader;
pub use loader_stats::LoaderStats;
pub use scheduler::{CloseReason, FlushPolicy};
