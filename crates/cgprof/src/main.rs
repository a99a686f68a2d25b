use anyhow::Context;
use cgprof::cli::{Cli, Command};
use cgprof::error::exit_code;
use cgprof::folded::FoldedOptions;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS as u8),
        Err(e) => {
            eprintln!("Error: {e:#}");
            if let Some(cgprof_err) = e.downcast_ref::<cgprof::Error>() {
                ExitCode::from(cgprof_err.exit_code() as u8)
            } else {
                ExitCode::from(exit_code::GENERAL_ERROR as u8)
            }
        }
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    cli.validate()
        .map_err(cgprof::Error::InvalidArgument)
        .context("Invalid arguments")?;

    match cli.command {
        Command::Folded {
            file,
            skip_header,
            demangle,
            format,
            top,
            threshold,
            max_edges,
            output,
        } => {
            let options = FoldedOptions {
                skip_header,
                demangle,
            };
            cgprof::commands::folded::run(
                file.as_deref(),
                &options,
                format,
                top,
                threshold,
                max_edges,
                output.as_deref(),
            )
            .with_context(|| match &file {
                Some(path) => format!("Failed to profile {}", path.display()),
                None => "Failed to profile stdin".to_string(),
            })?;
        }
        Command::Completions { shell } => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "cgprof", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
