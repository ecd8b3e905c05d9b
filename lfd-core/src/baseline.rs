//! Per-flow leaky bucket, the simplest possible ground-truth baseline.
//!
//! Ported from `original_source/baseline/baseline.go`: one exact counter per
//! flow (no hashing, no collisions, unbounded memory) that leaks at `gamma`
//! bytes/ns and convicts a flow once its bucket exceeds `beta`.

use crate::blacklist::Blacklist;
use crate::types::{FlowId, Nanos};
use ahash::AHashMap;

#[derive(Debug, Clone, Copy)]
struct LeakyBucket {
    level: u64,
    last_seen: Nanos,
}

#[derive(Debug)]
pub struct BaselineDetector {
    beta: u64,
    gamma: f64,
    buckets: AHashMap<FlowId, LeakyBucket>,
    blacklist: Blacklist,
}

impl BaselineDetector {
    pub fn new(beta: u64, gamma: f64) -> Self {
        Self { beta, gamma, buckets: AHashMap::new(), blacklist: Blacklist::unbounded() }
    }

    pub fn num_flows(&self) -> usize {
        self.buckets.len()
    }

    /// `spec.md` §6's `get_blacklist()` — read access to the set of flows this
    /// detector has already convicted.
    pub fn get_blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    /// `spec.md` §6's `set_blacklist(table)` — replaces this detector's
    /// blacklist wholesale, e.g. when a caller wants Baseline to start from a
    /// table another detector already populated.
    pub fn set_blacklist(&mut self, blacklist: Blacklist) {
        self.blacklist = blacklist;
    }

    /// `spec.md` §4.4's `Detect(fid, size, ts) -> bool`.
    ///
    /// Already-convicted flows short-circuit to `true` without touching the
    /// bucket, matching the Go original's blacklist-first check.
    pub fn detect(&mut self, fid: FlowId, size: u32, ts: Nanos) -> bool {
        if self.blacklist.contains(fid) {
            return true;
        }

        let bucket = self.buckets.entry(fid).or_insert(LeakyBucket { level: 0, last_seen: ts });

        let elapsed = ts.saturating_sub(bucket.last_seen);
        let leaked = (elapsed as f64 * self.gamma) as u64;
        bucket.level = bucket.level.saturating_sub(leaked);
        bucket.level = bucket.level.saturating_add(size as u64);
        bucket.last_seen = ts;

        if bucket.level > self.beta {
            self.blacklist.insert(fid);
            true
        } else {
            false
        }
    }
}
