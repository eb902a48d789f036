use rocksdb::{Direction, IteratorMode, Options, DB};
use std::sync::Arc;
use std::path::Path;
use anyhow::Result;

#[derive(Clone)]
pub struct KvStore {
    db: Arc<DB>,
}

impl KvStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self {
            db: Arc::new(db),
        })
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.put(key, value)?;
        Ok(())
    }

    /// The last `limit` entries under `prefix`, in ascending key order.
    ///
    /// Walks backwards from the first key past the prefix, so cost is bounded
    /// by `limit` rather than by the number of keys sharing the prefix.
    pub fn scan_tail(&self, prefix: &[u8], limit: usize) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let iter = match prefix_upper_bound(prefix) {
            Some(upper) => self.db.iterator(IteratorMode::From(&upper, Direction::Reverse)),
            None => self.db.iterator(IteratorMode::End),
        };

        // `limit` is caller-controlled; do not preallocate from it.
        let mut results = Vec::new();
        for item in iter {
            let (k, v) = item?;
            if k.as_ref() > prefix && !k.starts_with(prefix) {
                // Reverse seek lands on the upper bound itself when it exists.
                continue;
            }
            if !k.starts_with(prefix) {
                break;
            }
            results.push((k.to_vec(), v.to_vec()));
            if results.len() == limit {
                break;
            }
        }
        results.reverse();
        Ok(results)
    }
}

/// Smallest key strictly greater than every key starting with `prefix`.
fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.pop() {
        if last < u8::MAX {
            upper.push(last + 1);
            return Some(upper);
        }
    }
    None
}
