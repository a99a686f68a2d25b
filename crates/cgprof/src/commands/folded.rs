use crate::cli::OutputFormat;
use crate::error::Result;
use crate::folded::{FoldedOptions, IngestStats, ingest};
use cgprof_core::report::{block_label, by_time, percent};
use cgprof_core::{
    BlockProfile, BlockRegistry, CallData, CallGraph, Profile, ProfileThread, ReportOptions,
    compute, write_report,
};
use comfy_table::{Cell, CellAlignment, Table, presets};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// A profile built from one folded stack input.
pub struct Loaded {
    pub registry: BlockRegistry,
    pub profile: Profile,
    pub stats: IngestStats,
}

/// Replay every folded stack in `reader` on a fresh graph and aggregate it.
pub fn load<R: BufRead>(reader: R, options: &FoldedOptions) -> Result<Loaded> {
    let mut registry = BlockRegistry::new();
    let graph = CallGraph::shared(registry.len());
    let mut thread = ProfileThread::new(graph.clone());
    let stats = ingest(reader, &mut registry, &mut thread, options)?;
    drop(thread);

    graph.borrow_mut().track(&registry);
    let profile = compute(&graph.borrow(), &registry);
    Ok(Loaded {
        registry,
        profile,
        stats,
    })
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    file: Option<&Path>,
    options: &FoldedOptions,
    format: OutputFormat,
    limit: usize,
    threshold: f64,
    max_edges: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let started = Instant::now();
    let source = file.map_or_else(|| "<stdin>".to_string(), |f| f.display().to_string());

    let loaded = match file {
        Some(path) => load(BufReader::new(File::open(path)?), options)?,
        None => load(io::stdin().lock(), options)?,
    };
    info!(
        source = %source,
        lines = loaded.stats.lines,
        samples = loaded.stats.samples,
        blocks = loaded.registry.len(),
        elapsed = %humantime::format_duration(started.elapsed()),
        "loaded folded stacks"
    );

    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let Loaded {
        registry, profile, ..
    } = &loaded;
    match format {
        OutputFormat::Report => {
            write_report(&mut out, profile, registry, &ReportOptions { max_edges })?;
        }
        OutputFormat::Table => {
            let entries = top_blocks(profile, limit, threshold);
            print_table(&mut out, &source, profile, registry, &entries)?;
        }
        OutputFormat::Json => {
            let entries = top_blocks(profile, limit, threshold);
            print_json(&mut out, &source, profile, registry, &entries)?;
        }
        OutputFormat::Csv => {
            let entries = top_blocks(profile, limit, threshold);
            print_csv(&mut out, profile, registry, &entries)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Non-root blocks that ran, by descending time, at most `limit` of them
/// and none under `threshold` percent of the total.
pub fn top_blocks(profile: &Profile, limit: usize, threshold: f64) -> Vec<&BlockProfile> {
    let total = profile.total_time();
    let entries: Vec<_> = by_time(profile)
        .into_iter()
        .filter(|b| !b.id().is_root() && b.count() > 0)
        .filter(|b| percent(b.time(), total) >= threshold)
        .take(limit)
        .collect();
    debug!(entries = entries.len(), limit, threshold, "selected top blocks");
    entries
}

fn print_table<W: Write>(
    out: &mut W,
    source: &str,
    profile: &Profile,
    registry: &BlockRegistry,
    entries: &[&BlockProfile],
) -> Result<()> {
    let total = profile.total_time();
    writeln!(
        out,
        "# {} | Blocks: {} of {} | Total time: {} | {}",
        source,
        profile.covered(),
        profile.len(),
        format_count(total),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;

    let mut table = Table::new();
    table.load_preset(presets::NOTHING);
    table.set_header(vec!["COUNT", "TIME", "SELF", "TIME%", "BLOCK", "LOCATION"]);
    for entry in entries {
        let loc = registry
            .get(entry.id())
            .map(|b| b.loc.to_string())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(format_count(entry.count())).set_alignment(CellAlignment::Right),
            Cell::new(format_count(entry.time())).set_alignment(CellAlignment::Right),
            Cell::new(format_count(entry.self_time())).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}%", percent(entry.time(), total)))
                .set_alignment(CellAlignment::Right),
            Cell::new(block_label(registry, entry.id())),
            Cell::new(loc),
        ]);
    }
    writeln!(out, "{table}")?;
    Ok(())
}

#[derive(Serialize)]
struct JsonProfile<'a> {
    source: &'a str,
    total_time: u64,
    blocks: usize,
    covered: usize,
    entries: Vec<JsonBlock<'a>>,
}

#[derive(Serialize)]
struct JsonBlock<'a> {
    id: usize,
    name: &'a str,
    location: String,
    count: u64,
    time: u64,
    self_time: u64,
    time_pct: f64,
    callers: Vec<JsonCall<'a>>,
    callees: Vec<JsonCall<'a>>,
}

#[derive(Serialize)]
struct JsonCall<'a> {
    id: usize,
    name: &'a str,
    count: u64,
    time: u64,
}

impl<'a> JsonCall<'a> {
    fn new(registry: &'a BlockRegistry, call: &CallData) -> Self {
        JsonCall {
            id: call.id.index(),
            name: registry.name(call.id),
            count: call.count,
            time: call.time,
        }
    }
}

fn print_json<W: Write>(
    out: &mut W,
    source: &str,
    profile: &Profile,
    registry: &BlockRegistry,
    entries: &[&BlockProfile],
) -> Result<()> {
    let total = profile.total_time();
    let doc = JsonProfile {
        source,
        total_time: total,
        blocks: profile.len(),
        covered: profile.covered(),
        entries: entries
            .iter()
            .map(|b| JsonBlock {
                id: b.id().index(),
                name: registry.name(b.id()),
                location: registry
                    .get(b.id())
                    .map(|block| block.loc.to_string())
                    .unwrap_or_default(),
                count: b.count(),
                time: b.time(),
                self_time: b.self_time(),
                time_pct: round2(percent(b.time(), total)),
                callers: b.callers.iter().map(|c| JsonCall::new(registry, c)).collect(),
                callees: b.callees.iter().map(|c| JsonCall::new(registry, c)).collect(),
            })
            .collect(),
    };
    serde_json::to_writer_pretty(&mut *out, &doc)?;
    writeln!(out)?;
    Ok(())
}

fn print_csv<W: Write>(
    out: &mut W,
    profile: &Profile,
    registry: &BlockRegistry,
    entries: &[&BlockProfile],
) -> Result<()> {
    let total = profile.total_time();
    writeln!(out, "count,time,self_time,time_pct,id,name,location")?;
    for entry in entries {
        let loc = registry
            .get(entry.id())
            .map(|b| b.loc.to_string())
            .unwrap_or_default();
        writeln!(
            out,
            "{},{},{},{:.2},{},{},{}",
            entry.count(),
            entry.time(),
            entry.self_time(),
            percent(entry.time(), total),
            entry.id().index(),
            csv_field(registry.name(entry.id())),
            csv_field(&loc)
        )?;
    }
    Ok(())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Quote a CSV field, doubling embedded quotes.
fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Format a number with commas for readability
fn format_count(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
