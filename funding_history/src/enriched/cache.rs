//! Lock-free, read-mostly snapshot of the enriched view.
//!
//! Readers load an `Arc<HashMap<..>>` with one atomic operation; writers call
//! [`EnrichedCache::refresh`] after a rebuild to swap in a new snapshot. A
//! reader holding the old snapshot keeps using it until it drops the `Arc`.

use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;
use diesel::SqliteConnection;
use rust_decimal::Decimal;

use super::{EnrichedContract, load_enriched};
use crate::{models::ContractId, multiplier::Horizon};

type Snapshot = HashMap<ContractId, EnrichedContract>;

/// In-process copy of `contract_enriched`. Starts empty.
#[derive(Debug)]
pub struct EnrichedCache {
    inner: ArcSwap<Snapshot>,
}

impl Default for EnrichedCache {
    fn default() -> Self {
        Self {
            inner: ArcSwap::from_pointee(Snapshot::new()),
        }
    }
}

impl EnrichedCache {
    /// Empty cache; every lookup misses until [`refresh`](Self::refresh).
    pub fn new() -> Self {
        Self::default()
    }

    /// Reload from the database and swap atomically. Returns the new row count.
    pub fn refresh(&self, conn: &mut SqliteConnection) -> anyhow::Result<usize> {
        let snap: Snapshot = load_enriched(conn)?.into_iter().map(|e| (e.id, e)).collect();
        let n = snap.len();
        self.inner.store(Arc::new(snap));
        Ok(n)
    }

    /// Cached row for `id`.
    pub fn get(&self, id: ContractId) -> Option<EnrichedContract> {
        self.inner.load().get(&id).cloned()
    }

    /// Cached multiplier for `id` at `horizon`.
    pub fn multiplier(&self, id: ContractId, horizon: Horizon) -> Option<Decimal> {
        self.inner.load().get(&id).map(|e| e.multiplier(horizon))
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.load_full()
    }

    /// Number of cached contracts.
    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    /// True until the first non-empty refresh.
    pub fn is_empty(&self) -> bool {
        self.inner.load().is_empty()
    }
}
