//! Call-graph accounting for a language runtime.
//!
//! The evaluator registers its code blocks in a [`BlockRegistry`], creates
//! one [`CallGraph`] per run and one [`ProfileThread`] per logical execution
//! context, and reports calls and measured work as they happen:
//!
//! ```
//! use cgprof_core::{BlockRegistry, CallGraph, Loc, ProfileThread, compute};
//!
//! let mut registry = BlockRegistry::new();
//! let main = registry.register("main", Loc::new("main.fble", 1, 1));
//! let work = registry.register("work", Loc::new("main.fble", 4, 1));
//!
//! let graph = CallGraph::shared(registry.len());
//! let mut thread = ProfileThread::new(graph.clone());
//! thread.enter_call(main);
//! thread.sample(3);
//! thread.enter_call(work);
//! thread.sample(7);
//! thread.exit_call();
//! thread.exit_call();
//! drop(thread);
//!
//! let profile = compute(&graph.borrow(), &registry);
//! assert_eq!(profile[main].time(), 10);
//! assert_eq!(profile[work].time(), 7);
//! ```
//!
//! Graphs are not synchronized. All threads of one graph must be driven
//! from the same OS thread, which `Rc` enforces, and [`compute`] must not
//! run while a thread is mid-update.

pub mod block;
pub mod graph;
pub mod profile;
pub mod report;
pub mod thread;

pub use block::{Block, BlockId, BlockRegistry, Loc, ROOT_BLOCK_ID};
pub use graph::{CallData, CallGraph, SharedCallGraph};
pub use profile::{BlockProfile, Profile, compute};
pub use report::{ReportOptions, write_report};
pub use thread::ProfileThread;
