use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use batchload_rs::{BatchFunction, Loader};
use futures::future;
use proptest::prelude::*;
use proptest::test_runner::Config;

/// Doubles every key except multiples of 7, which it never finds.
#[derive(Clone, Default)]
struct Doubler {
    calls: Arc<Mutex<Vec<HashSet<u16>>>>,
}

#[async_trait]
impl BatchFunction<u16, u32> for Doubler {
    type Error = String;

    async fn load(&self, keys: &HashSet<u16>) -> Result<HashMap<u16, u32>, String> {
        self.calls.lock().unwrap().push(keys.clone());
        Ok(keys.iter().filter(|k| **k % 7 != 0).map(|k| (*k, u32::from(*k) * 2)).collect())
    }
}

fn requests() -> impl Strategy<Value = Vec<Vec<u16>>> {
    proptest::collection::vec(proptest::collection::vec(0u16..40, 0..6), 1..8)
}

proptest! {
    #![proptest_config(Config::with_cases(64))]

    #[test]
    fn same_turn_requests_coalesce_into_one_call(requests in requests()) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let batch_fn = Doubler::default();

        let results = runtime.block_on(async {
            let loader = Loader::new(batch_fn.clone());
            future::join_all(requests.iter().map(|keys| loader.load_by_ids(keys.clone()))).await
        });

        let union = requests.iter().flatten().copied().collect::<HashSet<_>>();
        let calls = batch_fn.calls.lock().unwrap().clone();
        if union.is_empty() {
            prop_assert!(calls.is_empty());
        } else {
            prop_assert_eq!(calls, vec![union]);
        }

        for (keys, result) in requests.iter().zip(results) {
            let result = result.unwrap();
            let expected = keys
                .iter()
                .filter(|k| **k % 7 != 0)
                .map(|k| (*k, u32::from(*k) * 2))
                .collect::<HashMap<_, _>>();
            prop_assert_eq!(result, expected);
        }
    }
}
