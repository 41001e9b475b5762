// external
use clap::Parser;
use tracing_subscriber::EnvFilter;

// internal
use geo_datagen::cli::Cli;
use geo_datagen::pipeline::{Benchmark, BenchmarkConfig, PipelineError};

fn run(config: BenchmarkConfig) -> Result<(), PipelineError> {
    let benchmark = Benchmark::new(config)?;
    tracing::info!(
        "Stats files: {} and {}",
        benchmark.stats_files().producer.display(),
        benchmark.stats_files().consumer.display()
    );
    let listener = benchmark.bind()?;
    let report = benchmark.run(listener)?;

    if !report.consumer.completed {
        tracing::warn!(
            "Only {} of {} tuples reached the client",
            report.consumer.processed,
            report.producer.processed
        );
    }
    report.persist_all()?;
    Ok(())
}

pub fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let cli = Cli::parse();
    tracing::info!(
        "Configuration: fraction={}, count={}, log_interval={}, port={}, stats_path={:?}",
        cli.fraction,
        cli.benchmark_count,
        cli.log_interval,
        cli.port,
        cli.stats_path
    );

    if let Err(e) = run(cli.into()) {
        tracing::error!("benchmark failed: {}", e);
        std::process::exit(1);
    }
    tracing::info!("Benchmark finished");
}
