use anyhow::{Context, Result};
use calcium_glm::{cli::Cli, cli::OutputFormat, output, Pipeline};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; `RUST_LOG` overrides the verbosity flag
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn,calcium_glm=info",
        1 => "warn,calcium_glm=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let config = args
        .pipeline_config()
        .context("invalid configuration")?;

    let report = Pipeline::new(config)
        .run_all(&args.input_dir, &args.output_dir)
        .context("pipeline could not start")?;

    match args.format {
        OutputFormat::Text => print!("{}", output::format_report(&report)),
        OutputFormat::Json => println!("{}", output::to_json_pretty(&report)?),
    }

    if let Some(path) = &args.json {
        std::fs::write(path, output::to_json_pretty(&report)?)
            .with_context(|| format!("cannot write report to {}", path.display()))?;
    }

    let failed = report.failed().count();
    if failed > 0 {
        anyhow::bail!("{} of {} tests failed", failed, report.tests.len());
    }
    Ok(())
}
