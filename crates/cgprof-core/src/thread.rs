//! Live call-stack tracking for one logical execution context.
//!
//! A [`ProfileThread`] is the only thing that mutates a [`CallGraph`]. The
//! evaluator tells it when control enters and leaves blocks and when
//! measurable work happens:
//!
//! - `enter_call(b)` increments the edge from the current block to `b` and
//!   makes `b` current.
//! - `sample(dt)` charges `dt` to every edge on the path from the root to
//!   the current block, so an edge's time is the inclusive cost of the
//!   calls it represents.
//! - `exit_call()` returns to the caller.
//!
//! Besides the call stack the thread keeps the *active path*: the distinct
//! `(caller, callee)` edges currently running, in stack order. An edge that
//! is already running when it is entered again (recursion) is not added a
//! second time, so a sample is charged to it once. Tail calls
//! (`auto_exit`/`replace_call`) reuse the current stack frame and leave the
//! replaced frame's edges on the active path until the replacement exits.

use crate::block::{BlockId, ROOT_BLOCK_ID};
use crate::graph::SharedCallGraph;
use std::collections::HashMap;

type Edge = (BlockId, BlockId);

#[derive(Debug, Clone, Copy)]
struct Frame {
    block: BlockId,
    /// Number of active-path edges to drop when this frame exits.
    exit: usize,
}

/// Call-stack tracker bound to a shared call graph.
///
/// Every `enter_call` must be matched by an `exit_call` on every exit path
/// of the evaluator, including error unwinding, before the thread is
/// dropped. Frames inherited through [`ProfileThread::fork`] are exempt.
#[derive(Debug)]
pub struct ProfileThread {
    graph: SharedCallGraph,
    stack: Vec<Frame>,
    active: Vec<Edge>,
    /// Index into `active` where each edge was last pushed. Stale entries
    /// are detected by comparing against `active`.
    slots: HashMap<Edge, usize>,
    auto_exit: bool,
    /// Stack depth inherited from a parent thread.
    base: usize,
}

impl ProfileThread {
    /// Create a thread whose stack holds only the root block.
    pub fn new(graph: SharedCallGraph) -> Self {
        ProfileThread {
            graph,
            stack: vec![Frame {
                block: ROOT_BLOCK_ID,
                exit: 0,
            }],
            active: Vec::new(),
            slots: HashMap::new(),
            auto_exit: false,
            base: 1,
        }
    }

    /// Create a thread that continues from this thread's current call
    /// stack, charging the same graph.
    pub fn fork(&self) -> Self {
        ProfileThread {
            graph: self.graph.clone(),
            stack: self.stack.clone(),
            active: self.active.clone(),
            slots: self.slots.clone(),
            auto_exit: false,
            base: self.stack.len(),
        }
    }

    pub fn graph(&self) -> &SharedCallGraph {
        &self.graph
    }

    /// The block currently executing (the root when no call is active).
    pub fn current(&self) -> BlockId {
        self.top().block
    }

    /// Call stack depth, counting the root frame.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Blocks on the call stack, root first.
    pub fn stack(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.stack.iter().map(|f| f.block)
    }

    /// Enter a call from the current block into `callee`.
    pub fn enter_call(&mut self, callee: BlockId) {
        let caller = self.current();
        self.graph.borrow_mut().record_call(caller, callee, 1, 0);

        if self.auto_exit {
            self.auto_exit = false;
            self.top_mut().block = callee;
        } else {
            self.stack.push(Frame {
                block: callee,
                exit: 0,
            });
        }

        let edge = (caller, callee);
        let running = matches!(
            self.slots.get(&edge),
            Some(&i) if self.active.get(i) == Some(&edge)
        );
        if !running {
            self.slots.insert(edge, self.active.len());
            self.active.push(edge);
            self.top_mut().exit += 1;
        }
    }

    /// Mark the current call so that the next `enter_call` replaces it
    /// instead of nesting inside it. Used for tail calls.
    ///
    /// # Panics
    ///
    /// Panics if no call is active.
    pub fn auto_exit(&mut self) {
        assert!(
            self.stack.len() > 1,
            "profile thread: auto-exit with no active call (the root frame can never be exited)"
        );
        self.auto_exit = true;
    }

    /// Tail call from the current block into `callee`.
    pub fn replace_call(&mut self, callee: BlockId) {
        self.auto_exit();
        self.enter_call(callee);
    }

    /// Return from the current call, along with every call it replaced.
    ///
    /// # Panics
    ///
    /// Panics if no call is active.
    pub fn exit_call(&mut self) {
        assert!(
            self.stack.len() > 1,
            "profile thread: exit with no active call (the root frame can never be exited)"
        );
        self.auto_exit = false;
        if let Some(frame) = self.stack.pop() {
            self.active.truncate(self.active.len() - frame.exit);
        }
    }

    /// Charge `time` to every edge on the active path.
    ///
    /// With no call active the time is recorded as unattributed root time.
    pub fn sample(&mut self, time: u64) {
        let mut graph = self.graph.borrow_mut();
        if self.active.is_empty() {
            graph.record_unattributed(time);
            return;
        }
        for &(caller, callee) in &self.active {
            graph.record_call(caller, callee, 0, time);
        }
    }

    fn top(&self) -> &Frame {
        // The root frame is pushed at construction and never popped.
        &self.stack[self.stack.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Frame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }
}

impl Drop for ProfileThread {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            debug_assert!(
                self.stack.len() <= self.base,
                "profile thread dropped with {} unmatched enter_call(s)",
                self.stack.len() - self.base
            );
        }
    }
}
