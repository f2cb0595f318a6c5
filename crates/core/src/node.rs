//! Per-infoset storage and the concurrent node table.
//!
//! Regret and strategy accumulators live behind a per-node lock; the table
//! itself takes a short read-write lock only to look up or insert handles.
//! Nodes are heap-allocated behind `Arc`, so handles stay valid for the
//! table's lifetime no matter how the map rehashes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use rustc_hash::FxHashMap;

use crate::abstraction::ActionSpec;

/// The lock-protected accumulators of a node.
#[derive(Debug)]
pub struct NodeValues {
    pub regret_sum: Vec<f64>,
    pub strategy_sum: Vec<f64>,
}

/// CFR statistics for one infoset.
///
/// The action list is frozen at creation; the solver refuses to reuse a node
/// whose action count disagrees with the call site (that would mean the
/// abstraction stopped being a function of the infoset).
#[derive(Debug)]
pub struct Node {
    values: Mutex<NodeValues>,
    visit_count: AtomicU64,
    legal_actions: Vec<ActionSpec>,
}

impl Node {
    /// A zeroed node for the given action list.
    #[must_use]
    pub fn new(legal_actions: Vec<ActionSpec>) -> Self {
        let k = legal_actions.len();
        Self {
            values: Mutex::new(NodeValues {
                regret_sum: vec![0.0; k],
                strategy_sum: vec![0.0; k],
            }),
            visit_count: AtomicU64::new(0),
            legal_actions,
        }
    }

    /// Rebuild a node from checkpointed state.
    #[must_use]
    pub fn from_saved(
        legal_actions: Vec<ActionSpec>,
        regret_sum: Vec<f64>,
        strategy_sum: Vec<f64>,
        visit_count: u64,
    ) -> Self {
        debug_assert_eq!(legal_actions.len(), regret_sum.len());
        debug_assert_eq!(legal_actions.len(), strategy_sum.len());
        Self {
            values: Mutex::new(NodeValues {
                regret_sum,
                strategy_sum,
            }),
            visit_count: AtomicU64::new(visit_count),
            legal_actions,
        }
    }

    /// Number of abstracted actions at this infoset.
    #[must_use]
    pub fn num_actions(&self) -> usize {
        self.legal_actions.len()
    }

    /// The frozen action list.
    #[must_use]
    pub fn legal_actions(&self) -> &[ActionSpec] {
        &self.legal_actions
    }

    /// Lock the numeric accumulators. Never hold this across recursion.
    pub fn lock_values(&self) -> MutexGuard<'_, NodeValues> {
        self.values.lock()
    }

    #[must_use]
    pub fn visit_count(&self) -> u64 {
        self.visit_count.load(Ordering::Relaxed)
    }

    pub fn record_visit(&self) {
        self.visit_count.fetch_add(1, Ordering::Relaxed);
    }

    /// The normalized average strategy, or uniform when nothing has
    /// accumulated yet.
    #[must_use]
    pub fn average_strategy(&self) -> Vec<f64> {
        let values = self.values.lock();
        let total: f64 = values.strategy_sum.iter().sum();
        if total > 0.0 {
            values.strategy_sum.iter().map(|&s| s / total).collect()
        } else {
            #[allow(clippy::cast_precision_loss)]
            let uniform = 1.0 / values.strategy_sum.len().max(1) as f64;
            vec![uniform; values.strategy_sum.len()]
        }
    }
}

/// Concurrent map from infoset key to node handle.
#[derive(Debug, Default)]
pub struct NodeTable {
    nodes: RwLock<FxHashMap<String, Arc<Node>>>,
    total_created: AtomicU64,
}

impl NodeTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an existing node.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<Node>> {
        self.nodes.read().get(key).cloned()
    }

    /// Fetch the node for `key`, running `build` exactly once if it does
    /// not exist yet, even under contention.
    pub fn get_or_create<F>(&self, key: &str, build: F) -> Arc<Node>
    where
        F: FnOnce() -> Node,
    {
        if let Some(node) = self.nodes.read().get(key) {
            return Arc::clone(node);
        }
        let mut nodes = self.nodes.write();
        // Double-checked: another writer may have won the race.
        Arc::clone(nodes.entry(key.to_owned()).or_insert_with(|| {
            self.total_created.fetch_add(1, Ordering::Relaxed);
            Arc::new(build())
        }))
    }

    /// Insert a fully-built node, replacing any existing entry. Used by
    /// checkpoint load.
    pub fn insert(&self, key: String, node: Node) {
        let mut nodes = self.nodes.write();
        if nodes.insert(key, Arc::new(node)).is_none() {
            self.total_created.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Lifetime total of nodes created (survives checkpoint round-trips).
    #[must_use]
    pub fn total_created(&self) -> u64 {
        self.total_created.load(Ordering::Relaxed)
    }

    pub fn set_total_created(&self, value: u64) {
        self.total_created.store(value, Ordering::Relaxed);
    }

    /// Stable snapshot of `(key, handle)` pairs.
    ///
    /// Only meaningful when no training threads are mutating the table
    /// (checkpoint save/load, post-training queries).
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, Arc<Node>)> {
        self.nodes
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect()
    }

    /// Drop every node. Used before loading a checkpoint into a live table.
    pub fn clear(&self) {
        self.nodes.write().clear();
        self.total_created.store(0, Ordering::Relaxed);
    }
}
