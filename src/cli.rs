use std::num::{NonZeroU32, NonZeroUsize};

use clap::Parser;

use crate::generator::{DEFAULT_MAX_PRICE, DEFAULT_SEED};

#[derive(Debug, Parser)]
#[command(
    name = "geo-datagen",
    version,
    about = "Synthetic geo/price event generator streaming newline JSON to one consumer",
    allow_negative_numbers = true
)]
pub struct Cli {
    /// Fraction of the region list to use, in [-1, 1]. Positive takes the
    /// head of the list, negative (or zero) the tail.
    #[arg(value_parser = parse_fraction)]
    pub fraction: f64,

    /// Total number of events to generate and send
    pub benchmark_count: NonZeroUsize,

    /// Record a throughput checkpoint every N events
    pub log_interval: NonZeroUsize,

    /// TCP port to listen on
    pub port: u16,

    /// Prefix (directory with trailing slash, or file prefix) for the stats CSV files
    pub stats_path: String,

    /// Exclusive upper bound for generated prices
    #[arg(long, default_value_t = DEFAULT_MAX_PRICE)]
    pub max_price: NonZeroU32,

    /// Seed for the price generator
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Address to bind on
    #[arg(long, default_value = "0.0.0.0")]
    pub bind_host: String,
}

fn parse_fraction(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|e| format!("`{}` is not a number: {}", raw, e))?;
    if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
        return Err(format!("`{}` is outside [-1, 1]", raw));
    }
    Ok(value)
}
