use std::time::Duration;

use clap::Parser;
use geo_datagen::event::{EventLine, unix_millis};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::time;

/// Downstream reader for geo-datagen: counts events and reports latency.
#[derive(Debug, Parser)]
#[command(name = "sink", version)]
struct Args {
    /// Generator address
    #[arg(short, long, default_value = "127.0.0.1:9000")]
    addr: String,

    /// Fail unless exactly this many events arrive
    #[arg(short, long)]
    expect: Option<u64>,

    /// Seconds between throughput reports
    #[arg(short, long, default_value_t = 1)]
    report_secs: u64,
}

#[derive(Debug, Default)]
struct Window {
    count: u64,
    total_latency_ms: u64,
}

impl Window {
    fn record(&mut self, event: &EventLine) {
        self.count += 1;
        self.total_latency_ms += unix_millis().saturating_sub(event.ts);
    }

    fn reset_and_report(&mut self, total: u64) {
        if self.count > 0 {
            tracing::info!(
                "{} events ({} total), avg latency {} ms",
                self.count,
                total,
                self.total_latency_ms / self.count
            );
        } else {
            tracing::info!("0 events ({} total)", total);
        }
        *self = Window::default();
    }
}

async fn connect(addr: &str) -> TcpStream {
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                tracing::info!("Connected to {}", addr);
                return stream;
            }
            Err(e) => {
                tracing::debug!("connect to {} failed: {}, retrying", addr, e);
                time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let args = Args::parse();
    let stream = connect(&args.addr).await;
    stream.set_nodelay(true)?;
    let mut lines = BufReader::new(stream).lines();

    let mut interval = time::interval(Duration::from_secs(args.report_secs.max(1)));
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    let mut window = Window::default();
    let mut total = 0u64;
    let mut malformed = 0u64;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match EventLine::parse(&line) {
                    Ok(event) => {
                        window.record(&event);
                        total += 1;
                    }
                    Err(e) => {
                        malformed += 1;
                        tracing::warn!("malformed line {:?}: {}", line, e);
                    }
                }
            }
            _ = interval.tick() => window.reset_and_report(total),
        }
    }

    window.reset_and_report(total);
    tracing::info!("Stream closed: {} events, {} malformed", total, malformed);

    if let Some(expected) = args.expect {
        anyhow::ensure!(
            total == expected,
            "expected {} events, received {}",
            expected,
            total
        );
    }
    Ok(())
}
