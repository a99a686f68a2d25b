use crate::block::{BlockId, BlockRegistry, ROOT_BLOCK_ID};
use crate::graph::{CallData, CallGraph};
use tracing::debug;

/// Aggregated statistics for one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockProfile {
    /// Inclusive count and time of the block itself; `block.id` is the
    /// block's own id.
    pub block: CallData,
    /// One entry per distinct caller, `id` being the caller.
    pub callers: Vec<CallData>,
    /// One entry per distinct callee, `id` being the callee.
    pub callees: Vec<CallData>,
}

impl BlockProfile {
    pub fn id(&self) -> BlockId {
        self.block.id
    }

    pub fn count(&self) -> u64 {
        self.block.count
    }

    pub fn time(&self) -> u64 {
        self.block.time
    }

    /// Inclusive time not spent in calls to other blocks.
    pub fn self_time(&self) -> u64 {
        let in_callees: u64 = self
            .callees
            .iter()
            .filter(|c| c.id != self.block.id)
            .fold(0u64, |acc, c| acc.saturating_add(c.time));
        self.block.time.saturating_sub(in_callees)
    }

    pub fn caller(&self, id: BlockId) -> Option<&CallData> {
        self.callers.iter().find(|c| c.id == id)
    }

    pub fn callee(&self, id: BlockId) -> Option<&CallData> {
        self.callees.iter().find(|c| c.id == id)
    }
}

/// Snapshot of a call graph, indexed by block id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    blocks: Vec<BlockProfile>,
}

impl Profile {
    pub fn get(&self, id: BlockId) -> Option<&BlockProfile> {
        self.blocks.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockProfile> {
        self.blocks.iter()
    }

    pub fn root(&self) -> &BlockProfile {
        &self.blocks[ROOT_BLOCK_ID.index()]
    }

    /// Total measured cost of the run.
    pub fn total_time(&self) -> u64 {
        self.root().time()
    }

    /// Number of blocks that ran at least once. The root always counts.
    pub fn covered(&self) -> usize {
        self.blocks.iter().filter(|b| b.count() > 0).count()
    }
}

impl std::ops::Index<BlockId> for Profile {
    type Output = BlockProfile;

    fn index(&self, id: BlockId) -> &BlockProfile {
        &self.blocks[id.index()]
    }
}

/// Collapse a call graph into per-block statistics.
///
/// Callees keep the graph's row order; callers are listed by caller id. A
/// block's count and time are the sums over its callers. The root has no
/// callers: its count is 1 and its time is the sum of its outgoing edges
/// plus any unattributed time.
///
/// # Panics
///
/// Panics if `graph` has fewer rows than `registry` has blocks. Call
/// [`CallGraph::track`] after registering blocks mid-run.
pub fn compute(graph: &CallGraph, registry: &BlockRegistry) -> Profile {
    assert!(
        graph.len() >= registry.len(),
        "call graph covers {} blocks but the registry holds {}",
        graph.len(),
        registry.len()
    );

    let mut blocks: Vec<BlockProfile> = (0..graph.len())
        .map(|i| {
            let id = BlockId(i);
            BlockProfile {
                block: CallData::new(id),
                callers: Vec::new(),
                callees: graph.row(id).to_vec(),
            }
        })
        .collect();

    for (source, edge) in graph.edges() {
        let callee = &mut blocks[edge.id.index()];
        callee.callers.push(CallData {
            id: source,
            count: edge.count,
            time: edge.time,
        });
        callee.block.count = callee.block.count.saturating_add(edge.count);
        callee.block.time = callee.block.time.saturating_add(edge.time);
    }

    // Edges into the root can only come from hand-built graphs; the
    // root's statistics are defined rather than summed.
    let root = &mut blocks[ROOT_BLOCK_ID.index()];
    let total_time = root
        .callees
        .iter()
        .fold(graph.unattributed_time(), |acc, c| acc.saturating_add(c.time));
    root.callers.clear();
    root.block.count = 1;
    root.block.time = total_time;

    debug!(
        blocks = blocks.len(),
        edges = graph.edge_count(),
        total_time,
        "computed profile"
    );
    Profile { blocks }
}
