use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use batchload_rs::{BatchFunction, Loader, LoaderConfig};
use futures::future;
use tracing_subscriber::EnvFilter;

// Loads titles from an in-memory table with a fixed delay, standing in for a slow backend that
// supports bulk lookups.
struct Films {
    titles: HashMap<i64, String>,
}

#[async_trait]
impl BatchFunction<i64, String> for Films {
    type Error = String;

    async fn load(&self, keys: &HashSet<i64>) -> Result<HashMap<i64, String>, String> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(keys.iter().filter_map(|k| self.titles.get(k).cloned().map(|v| (*k, v))).collect())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let mut titles = HashMap::new();
    titles.insert(2001, "a space odyssey".to_owned());
    titles.insert(7, "samurai".to_owned());
    titles.insert(12, "angry men".to_owned());

    let config = LoaderConfig::default().with_max_batch_size(64);
    let loader = Loader::with_config(Films { titles }, config).expect("valid config");

    assert_eq!(loader.load(7).await.unwrap().as_deref(), Some("samurai"));
    assert_eq!(loader.load(15).await.unwrap(), None);

    let (first, second) =
        future::join(loader.load_by_ids([12, 2001]), loader.load_by_ids([2001, 7])).await;
    assert_eq!(first.unwrap().len(), 2);
    assert_eq!(second.unwrap().len(), 2);

    let stats = loader.stats().await.unwrap();
    println!(
        "{} requests served by {} batch calls ({} keys coalesced)",
        stats.load_requests,
        stats.batches_dispatched,
        stats.keys_coalesced()
    );
}
