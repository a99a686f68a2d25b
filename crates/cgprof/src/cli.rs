use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cgprof")]
#[command(about = "Call-graph profile reports from folded stack samples")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a profile from folded stacks (`count a;b;c` per line)
    Folded {
        /// Input file (defaults to stdin)
        file: Option<PathBuf>,

        /// Ignore the first input line
        #[arg(long)]
        skip_header: bool,

        /// Demangle Rust symbol names
        #[arg(long)]
        demangle: bool,

        /// Output format
        #[arg(long, short = 'f', value_enum, default_value = "report")]
        format: OutputFormat,

        /// Number of blocks to list (table, json and csv)
        #[arg(long, short = 'n', default_value = "20")]
        top: usize,

        /// Minimum percentage of total time to list (table, json and csv)
        #[arg(long, short = 't', default_value = "0")]
        threshold: f64,

        /// Callers and callees shown per call graph entry
        #[arg(long)]
        max_edges: Option<usize>,

        /// Write output here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Full text report with call graph
    Report,
    Table,
    Json,
    Csv,
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        if let Command::Folded {
            top,
            threshold,
            max_edges,
            ..
        } = &self.command
        {
            if *top == 0 {
                return Err("--top must be at least 1".to_string());
            }
            if !(0.0..=100.0).contains(threshold) {
                return Err(format!(
                    "Threshold must be between 0 and 100 percent, got {threshold}"
                ));
            }
            if *max_edges == Some(0) {
                return Err("--max-edges must be at least 1".to_string());
            }
        }
        Ok(())
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn folded_defaults() {
        let cli = parse(&["cgprof", "folded"]);
        assert_eq!(cli.log_level(), "warn");
        match cli.command {
            Command::Folded {
                file,
                skip_header,
                format,
                top,
                max_edges,
                ..
            } => {
                assert!(file.is_none());
                assert!(!skip_header);
                assert_eq!(format, OutputFormat::Report);
                assert_eq!(top, 20);
                assert!(max_edges.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn verbose_is_global_and_counted() {
        let cli = parse(&["cgprof", "folded", "-vv", "--format", "json", "perf.txt"]);
        assert_eq!(cli.log_level(), "debug");
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let cli = parse(&["cgprof", "folded", "-t", "150"]);
        assert!(cli.validate().unwrap_err().contains("150"));
    }

    #[test]
    fn rejects_zero_limits() {
        assert!(parse(&["cgprof", "folded", "-n", "0"]).validate().is_err());
        assert!(
            parse(&["cgprof", "folded", "--max-edges", "0"])
                .validate()
                .is_err()
        );
    }
}
