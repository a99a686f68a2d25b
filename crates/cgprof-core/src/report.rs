use crate::block::{BlockId, BlockRegistry};
use crate::graph::CallData;
use crate::profile::{BlockProfile, Profile};
use std::cmp::Reverse;
use std::io::{self, Write};

const SEPARATOR: &str = "-------------------------------";

/// Knobs for [`write_report`].
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    /// Show at most this many callers and callees per call graph entry.
    pub max_edges: Option<usize>,
}

/// Blocks in descending order of inclusive time, ties broken by id.
pub fn by_time(profile: &Profile) -> Vec<&BlockProfile> {
    let mut blocks: Vec<&BlockProfile> = profile.iter().collect();
    blocks.sort_by_key(|b| (Reverse(b.time()), b.id()));
    blocks
}

/// Percentage of `total`, or 0 when nothing was measured.
pub fn percent(time: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * time as f64 / total as f64
    }
}

/// `name[xxxx]`, the form blocks take throughout the report.
pub fn block_label(registry: &BlockRegistry, id: BlockId) -> String {
    format!("{}[{}]", registry.name(id), id)
}

/// Write a human-readable report: coverage summary, flat profile, call
/// graph, uncovered blocks and block locations.
pub fn write_report<W: Write>(
    out: &mut W,
    profile: &Profile,
    registry: &BlockRegistry,
    options: &ReportOptions,
) -> io::Result<()> {
    let total = profile.total_time();
    let sorted = by_time(profile);

    writeln!(out, "Profile Report")?;
    writeln!(out, "==============")?;
    writeln!(
        out,
        "blocks executed: {:.2}% of {}",
        percent(profile.covered() as u64, profile.len() as u64),
        profile.len()
    )?;
    writeln!(out, "total time: {total}")?;
    writeln!(out)?;

    writeln!(out, "Flat Profile")?;
    writeln!(out, "------------")?;
    writeln!(
        out,
        "   {:>8} {:>8} {:>8} {:>7}  block",
        "count", "time", "self", "time%"
    )?;
    for block in &sorted {
        writeln!(
            out,
            "** {:>8} {:>8} {:>8} {:>6.2}%  {} **",
            block.count(),
            block.time(),
            block.self_time(),
            percent(block.time(), total),
            block_label(registry, block.id())
        )?;
    }
    writeln!(out)?;

    writeln!(out, "Call Graph")?;
    writeln!(out, "----------")?;
    writeln!(out, "   {:>8} {:>8} {:>7}  block", "count", "time", "time%")?;
    for block in sorted.iter().filter(|b| b.count() > 0) {
        let mut callers: Vec<&CallData> = block.callers.iter().collect();
        callers.sort_by_key(|c| c.time);
        let skipped = options
            .max_edges
            .map_or(0, |max| callers.len().saturating_sub(max));
        if skipped > 0 {
            writeln!(out, "   ... {skipped} more")?;
        }
        for call in &callers[skipped..] {
            write_call(out, registry, false, call, total)?;
        }

        write_call(out, registry, true, &block.block, total)?;

        let mut callees: Vec<&CallData> = block.callees.iter().collect();
        callees.sort_by_key(|c| Reverse(c.time));
        let shown = options.max_edges.unwrap_or(callees.len()).min(callees.len());
        for call in &callees[..shown] {
            write_call(out, registry, false, call, total)?;
        }
        if shown < callees.len() {
            writeln!(out, "   ... {} more", callees.len() - shown)?;
        }
        writeln!(out, "{SEPARATOR}")?;
    }
    writeln!(out)?;

    writeln!(out, "Uncovered Blocks")?;
    writeln!(out, "----------------")?;
    for block in profile.iter().filter(|b| b.count() == 0) {
        writeln!(out, "{}", block_label(registry, block.id()))?;
    }
    writeln!(out)?;

    writeln!(out, "Block Locations")?;
    writeln!(out, "---------------")?;
    for (id, block) in registry.iter() {
        writeln!(out, "{}: {}", block_label(registry, id), block.loc)?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_call<W: Write>(
    out: &mut W,
    registry: &BlockRegistry,
    highlight: bool,
    call: &CallData,
    total: u64,
) -> io::Result<()> {
    let h = if highlight { "**" } else { "  " };
    writeln!(
        out,
        "{h} {:>8} {:>8} {:>6.2}%  {} {h}",
        call.count,
        call.time,
        percent(call.time, total),
        block_label(registry, call.id)
    )
}
