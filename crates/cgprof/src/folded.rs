//! Folded stack ingestion.
//!
//! Each input line has the form `<count> <outer>;<middle>;<inner>`, as
//! written by `perf report -q -g folded,count,0` or `stackcollapse` tools.
//! Every frame name is resolved to a block (registering unknown names), the
//! path is entered outermost first, sampled once with the line's count, and
//! unwound again.
//!
//! Input ends at the first line that starts with a space or has no space at
//! all; perf uses such a line to open its next report section.

use crate::error::{Error, Result};
use cgprof_core::{BlockId, BlockRegistry, Loc, ProfileThread};
use std::io::BufRead;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct FoldedOptions {
    /// Drop the first input line (perf's per-command summary).
    pub skip_header: bool,
    /// Demangle Rust symbol names, dropping the hash suffix.
    pub demangle: bool,
}

/// What an ingestion pass consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Sample lines applied to the thread.
    pub lines: usize,
    /// Sum of the sample counts.
    pub samples: u64,
    /// Blocks registered for names not seen before.
    pub new_blocks: usize,
    /// Line number of the end-of-section line, if input stopped at one.
    pub stopped_at: Option<usize>,
}

/// A single parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    Sample { count: u64, frames: Vec<&'a str> },
    End,
}

/// Parse one line. `number` is 1-based and only used for errors.
pub fn parse_line(line: &str, number: usize) -> Result<Line<'_>> {
    let line = line.trim_end_matches(['\n', '\r']);
    let space = match line.find(' ') {
        None | Some(0) => return Ok(Line::End),
        Some(i) => i,
    };

    let field = &line[..space];
    let count = field.parse::<u64>().map_err(|e| Error::Parse {
        line: number,
        reason: format!("invalid sample count '{field}': {e}"),
    })?;

    let path = &line[space + 1..];
    let frames = if path.is_empty() {
        Vec::new()
    } else {
        path.split(';').collect()
    };
    Ok(Line::Sample { count, frames })
}

/// Look a frame name up by exact match, registering it if it is new.
///
/// The root is never returned: a frame named like it gets its own block.
pub fn resolve_block(registry: &mut BlockRegistry, name: &str) -> (BlockId, bool) {
    let found = registry
        .iter()
        .find(|(id, block)| !id.is_root() && block.name == name)
        .map(|(id, _)| id);
    match found {
        Some(id) => (id, false),
        None => (registry.register(name, Loc::unknown()), true),
    }
}

fn frame_name(raw: &str, demangle: bool) -> String {
    if demangle {
        format!("{:#}", rustc_demangle::demangle(raw))
    } else {
        raw.to_string()
    }
}

/// Apply every sample in `reader` to `thread`.
///
/// A line is parsed completely before any call is entered, so on error the
/// thread is left at the depth it started with.
pub fn ingest<R: BufRead>(
    reader: R,
    registry: &mut BlockRegistry,
    thread: &mut ProfileThread,
    options: &FoldedOptions,
) -> Result<IngestStats> {
    let mut stats = IngestStats::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let number = index + 1;
        if number == 1 && options.skip_header {
            debug!(header = %line.trim_end(), "skipping header line");
            continue;
        }

        let (count, frames) = match parse_line(&line, number)? {
            Line::End => {
                warn!(line = number, "end of folded stack section, ignoring the rest");
                stats.stopped_at = Some(number);
                break;
            }
            Line::Sample { count, frames } => (count, frames),
        };

        let mut ids = Vec::with_capacity(frames.len());
        for raw in frames {
            let (id, new) = resolve_block(registry, &frame_name(raw, options.demangle));
            if new {
                stats.new_blocks += 1;
            }
            ids.push(id);
        }

        for &id in &ids {
            thread.enter_call(id);
        }
        thread.sample(count);
        for _ in &ids {
            thread.exit_call();
        }

        stats.lines += 1;
        stats.samples = stats.samples.saturating_add(count);
    }

    Ok(stats)
}
