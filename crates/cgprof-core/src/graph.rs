use crate::block::{BlockId, BlockRegistry};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// Accumulated calls into block `id`.
///
/// Inside a [`CallGraph`] row, `id` is the callee. In an aggregated caller
/// list, `id` is the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallData {
    pub id: BlockId,
    pub count: u64,
    pub time: u64,
}

impl CallData {
    pub fn new(id: BlockId) -> Self {
        CallData {
            id,
            count: 0,
            time: 0,
        }
    }
}

/// A call graph shared by the profile threads of one run.
///
/// `Rc<RefCell<_>>` keeps it on one OS thread: the host's cooperative
/// scheduler serializes all access.
pub type SharedCallGraph = Rc<RefCell<CallGraph>>;

/// Edges indexed by source block. Each row holds at most one edge per
/// destination, in order of first observation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallGraph {
    rows: Vec<Vec<CallData>>,
    /// Time sampled while no call was active.
    unattributed: u64,
}

impl CallGraph {
    pub fn new(block_count: usize) -> Self {
        CallGraph {
            rows: vec![Vec::new(); block_count.max(1)],
            unattributed: 0,
        }
    }

    /// A graph with one row per block currently in `registry`.
    pub fn for_registry(registry: &BlockRegistry) -> Self {
        Self::new(registry.len())
    }

    pub fn shared(block_count: usize) -> SharedCallGraph {
        Rc::new(RefCell::new(Self::new(block_count)))
    }

    /// Number of rows, which is at least one more than the largest block id
    /// seen so far.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Grow the graph so that `block` has a row.
    pub fn ensure_capacity(&mut self, block: BlockId) {
        if block.index() >= self.rows.len() {
            trace!(from = self.rows.len(), to = block.index() + 1, "growing call graph");
            self.rows.resize_with(block.index() + 1, Vec::new);
        }
    }

    /// Grow the graph to cover every block registered so far.
    pub fn track(&mut self, registry: &BlockRegistry) {
        self.ensure_capacity(registry.last_id());
    }

    /// Add `count` and `time` to the edge `source -> dest`, creating the
    /// edge if this pair has not been seen before.
    pub fn record_call(&mut self, source: BlockId, dest: BlockId, count: u64, time: u64) {
        self.ensure_capacity(source.max(dest));
        let row = &mut self.rows[source.index()];
        let edge = match row.iter().position(|e| e.id == dest) {
            Some(i) => &mut row[i],
            None => {
                row.push(CallData::new(dest));
                let last = row.len() - 1;
                &mut row[last]
            }
        };
        edge.count = edge.count.saturating_add(count);
        edge.time = edge.time.saturating_add(time);
    }

    /// Charge time that could not be attributed to any call.
    pub fn record_unattributed(&mut self, time: u64) {
        self.unattributed = self.unattributed.saturating_add(time);
    }

    pub fn unattributed_time(&self) -> u64 {
        self.unattributed
    }

    /// Outgoing edges of `source`. Empty for ids beyond the graph.
    pub fn row(&self, source: BlockId) -> &[CallData] {
        self.rows.get(source.index()).map_or(&[], Vec::as_slice)
    }

    pub fn edge(&self, source: BlockId, dest: BlockId) -> Option<&CallData> {
        self.row(source).iter().find(|e| e.id == dest)
    }

    /// Every `(source, edge)` pair, by source id then row order.
    pub fn edges(&self) -> impl Iterator<Item = (BlockId, &CallData)> {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row.iter().map(move |e| (BlockId(i), e)))
    }

    /// Edges targeting `dest`, as `(source, edge)`. A linear scan.
    pub fn callers_of(&self, dest: BlockId) -> impl Iterator<Item = (BlockId, &CallData)> {
        self.edges().filter(move |(_, e)| e.id == dest)
    }

    pub fn edge_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_call_creates_then_accumulates() {
        let mut graph = CallGraph::new(3);
        graph.record_call(BlockId(1), BlockId(2), 1, 0);
        graph.record_call(BlockId(1), BlockId(2), 0, 15);
        graph.record_call(BlockId(1), BlockId(2), 1, 5);

        assert_eq!(graph.row(BlockId(1)).len(), 1);
        let edge = graph.edge(BlockId(1), BlockId(2)).unwrap();
        assert_eq!((edge.count, edge.time), (2, 20));
    }

    #[test]
    fn rows_keep_first_observation_order() {
        let mut graph = CallGraph::new(1);
        graph.record_call(BlockId(0), BlockId(3), 1, 0);
        graph.record_call(BlockId(0), BlockId(1), 1, 0);
        graph.record_call(BlockId(0), BlockId(3), 1, 0);

        let ids: Vec<_> = graph.row(BlockId(0)).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![BlockId(3), BlockId(1)]);
    }

    #[test]
    fn grows_for_unknown_source_and_dest() {
        let mut graph = CallGraph::new(1);
        graph.record_call(BlockId(0), BlockId(7), 1, 0);
        assert_eq!(graph.len(), 8);
        graph.record_call(BlockId(9), BlockId(2), 1, 0);
        assert_eq!(graph.len(), 10);
        assert!(graph.row(BlockId(42)).is_empty());
    }

    #[test]
    fn track_follows_registry() {
        let mut registry = BlockRegistry::new();
        let mut graph = CallGraph::for_registry(&registry);
        assert_eq!(graph.len(), 1);
        registry.register("a", crate::Loc::unknown());
        registry.register("b", crate::Loc::unknown());
        graph.track(&registry);
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn totals_saturate_instead_of_overflowing() {
        let mut graph = CallGraph::new(2);
        graph.record_call(BlockId(0), BlockId(1), u64::MAX, u64::MAX);
        graph.record_call(BlockId(0), BlockId(1), 1, 1);
        graph.record_unattributed(u64::MAX);
        graph.record_unattributed(1);
        let edge = graph.edge(BlockId(0), BlockId(1)).unwrap();
        assert_eq!((edge.count, edge.time), (u64::MAX, u64::MAX));
        assert_eq!(graph.unattributed_time(), u64::MAX);
    }

    #[test]
    fn self_edges_are_ordinary_edges() {
        let mut graph = CallGraph::new(2);
        graph.record_call(BlockId(1), BlockId(1), 1, 4);
        assert_eq!(graph.edge(BlockId(1), BlockId(1)).unwrap().time, 4);
        let callers: Vec<_> = graph.callers_of(BlockId(1)).map(|(s, _)| s).collect();
        assert_eq!(callers, vec![BlockId(1)]);
    }
}
