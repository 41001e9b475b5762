// std
use std::io::{self, Write};
use std::net::TcpListener;
use std::num::{NonZeroU32, NonZeroUsize};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

// external
use tokio::sync::mpsc;

// internal
use crate::checkpoint::{CheckpointError, CheckpointLog, Role, StatsFiles};
use crate::cli::Cli;
use crate::event::Event;
use crate::generator::EventGenerator;
use crate::ipc::relay::{Acquirer, Publisher, RelayError, relay};
use crate::ipc::tcp;
use crate::region::{RegionPool, RegionPoolError};

const LINE_CAPACITY: usize = 96;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Region pool error: {0}")]
    Region(#[from] RegionPoolError),
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("{0} thread panicked")]
    WorkerPanicked(Role),
}

#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    pub fraction: f64,
    pub benchmark_count: NonZeroUsize,
    pub log_interval: NonZeroUsize,
    pub port: u16,
    pub bind_host: String,
    pub stats_path: String,
    pub max_price: NonZeroU32,
    pub seed: u64,
}

impl From<Cli> for BenchmarkConfig {
    fn from(cli: Cli) -> Self {
        Self {
            fraction: cli.fraction,
            benchmark_count: cli.benchmark_count,
            log_interval: cli.log_interval,
            port: cli.port,
            bind_host: cli.bind_host,
            stats_path: cli.stats_path,
            max_price: cli.max_price,
            seed: cli.seed,
        }
    }
}

/// Outcome of one loop, along with the log it recorded.
#[derive(Debug, Clone)]
pub struct LoopSummary {
    pub role: Role,
    pub processed: usize,
    pub completed: bool,
    pub log: CheckpointLog,
    pub stats_file: PathBuf,
}

impl LoopSummary {
    pub fn persist(&self) -> Result<(), CheckpointError> {
        self.log.persist(&self.stats_file)?;
        tracing::info!("{} stats appended to {}", self.role, self.stats_file.display());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    pub producer: LoopSummary,
    pub consumer: LoopSummary,
}

impl BenchmarkReport {
    /// Append both logs again. Used at shutdown so the measurements survive
    /// even if a loop-level write went missing.
    pub fn persist_all(&self) -> Result<(), CheckpointError> {
        self.producer.persist()?;
        self.consumer.persist()
    }
}

/// Fills the relay from the generator.
pub struct Producer {
    generator: EventGenerator,
    publisher: Publisher<Event>,
    interval: NonZeroUsize,
    stats_file: PathBuf,
}

impl Producer {
    pub fn new(
        generator: EventGenerator,
        publisher: Publisher<Event>,
        interval: NonZeroUsize,
        stats_file: PathBuf,
    ) -> Self {
        Self {
            generator,
            publisher,
            interval,
            stats_file,
        }
    }

    /// Publish one event into every slot, then persist the producer log.
    /// The relay is closed when this returns.
    pub fn run(mut self) -> Result<LoopSummary, PipelineError> {
        let total = self.publisher.capacity();
        let mut log = CheckpointLog::new(total, self.interval);

        for i in 0..total {
            let event = self.generator.next_event();
            self.publisher.publish(i, event)?;
            if log.observe(i) {
                tracing::info!("{} tuples produced", i);
            }
        }

        log.finish(total as u64);
        log.persist(&self.stats_file)?;
        tracing::info!(
            "Producer done, {} tuples published",
            self.publisher.published()
        );

        Ok(LoopSummary {
            role: Role::Producer,
            processed: total,
            completed: true,
            log,
            stats_file: self.stats_file,
        })
    }
}

/// Drains the relay into the downstream sink.
pub struct Consumer {
    acquirer: Acquirer<Event>,
    interval: NonZeroUsize,
    stats_file: PathBuf,
}

impl Consumer {
    pub fn new(acquirer: Acquirer<Event>, interval: NonZeroUsize, stats_file: PathBuf) -> Self {
        Self {
            acquirer,
            interval,
            stats_file,
        }
    }

    /// Write every slot to `sink` as one JSON line, then persist the consumer
    /// log. A peer disconnect stops the loop early without failing it.
    pub fn run<W: Write>(mut self, sink: &mut W) -> Result<LoopSummary, PipelineError> {
        let total = self.acquirer.capacity();
        let mut log = CheckpointLog::new(total, self.interval);
        let mut buf = Vec::with_capacity(LINE_CAPACITY);
        let mut delivered = 0;
        let mut failure = None;

        for i in 0..total {
            let event = self.acquirer.acquire_next(i)?;
            if let Err(e) = event.write_line(sink, &mut buf) {
                failure = Some(e);
                break;
            }
            delivered += 1;
            if log.observe(i) {
                tracing::info!("{} tuples sent from buffer", i);
            }
        }
        if failure.is_none() {
            failure = sink.flush().err();
        }

        log.finish(delivered as u64);
        log.persist(&self.stats_file)?;

        let completed = match failure {
            None => {
                tracing::info!("Consumer done, {} tuples sent", delivered);
                true
            }
            Some(e) if tcp::is_disconnect(&e) => {
                tracing::info!(
                    "Client disconnected after {} of {} tuples: {}",
                    delivered,
                    total,
                    e
                );
                false
            }
            Some(e) => {
                tracing::error!("write to client failed after {} tuples: {}", delivered, e);
                return Err(e.into());
            }
        };

        Ok(LoopSummary {
            role: Role::Consumer,
            processed: delivered,
            completed,
            log,
            stats_file: self.stats_file,
        })
    }
}

/// Everything one run needs, built once at startup.
pub struct Benchmark {
    config: BenchmarkConfig,
    pool: RegionPool,
    stats: StatsFiles,
}

impl Benchmark {
    /// Resolve the region pool and the stats file names for this host.
    pub fn new(config: BenchmarkConfig) -> Result<Self, PipelineError> {
        let stats = StatsFiles::for_host(&config.stats_path)?;
        Self::with_stats_files(config, stats)
    }

    pub fn with_stats_files(
        config: BenchmarkConfig,
        stats: StatsFiles,
    ) -> Result<Self, PipelineError> {
        let pool = RegionPool::from_fraction(config.fraction)?;
        tracing::info!(
            "Region pool of {} codes selected from the {}",
            pool.len(),
            if config.fraction > 0.0 { "head" } else { "tail" }
        );
        Ok(Self {
            config,
            pool,
            stats,
        })
    }

    pub fn pool(&self) -> &RegionPool {
        &self.pool
    }

    pub fn stats_files(&self) -> &StatsFiles {
        &self.stats
    }

    pub fn bind(&self) -> io::Result<TcpListener> {
        tcp::bind(&self.config.bind_host, self.config.port)
    }

    /// Run the producer and the consumer on their own threads until both
    /// have handled the whole benchmark. The consumer accepts exactly one
    /// connection on `listener` before it starts draining.
    ///
    /// The first worker error ends the run at once: the other worker is left
    /// detached (it may be parked in `accept` or on the relay) and the caller
    /// is expected to exit the process.
    pub fn run(self, listener: TcpListener) -> Result<BenchmarkReport, PipelineError> {
        let count = self.config.benchmark_count.get();
        let interval = self.config.log_interval;
        let (publisher, acquirer) = relay::<Event>(count);

        let generator = EventGenerator::new(self.pool, self.config.max_price, self.config.seed);
        let producer = Producer::new(generator, publisher, interval, self.stats.producer);
        let consumer = Consumer::new(acquirer, interval, self.stats.consumer);

        let (tx, mut rx) = mpsc::unbounded_channel::<WorkerOutcome>();

        tracing::info!("Starting benchmark of {} tuples", count);
        let producer_tx = tx.clone();
        let producer_handle = thread::Builder::new()
            .name(Role::Producer.to_string())
            .spawn(move || report_outcome(&producer_tx, Role::Producer, || producer.run()))?;
        // the producer never blocks, so joining it on a failed spawn returns
        let (producer_handle, consumer_handle) = spawn_or_join(
            producer_handle,
            thread::Builder::new().name(Role::Consumer.to_string()),
            move || {
                report_outcome(&tx, Role::Consumer, || {
                    let (mut stream, _peer) = tcp::accept_one(&listener)?;
                    consumer.run(&mut stream)
                })
            },
        )?;

        let mut producer = None;
        let mut consumer = None;
        loop {
            match (producer.take(), consumer.take()) {
                (Some(producer), Some(consumer)) => {
                    // both workers have reported, so these joins return immediately
                    let _ = producer_handle.join();
                    let _ = consumer_handle.join();
                    return Ok(BenchmarkReport { producer, consumer });
                }
                (p, c) => {
                    producer = p;
                    consumer = c;
                }
            }

            let (role, result) = match rx.blocking_recv() {
                Some(outcome) => outcome,
                None => {
                    let missing = if producer.is_none() {
                        Role::Producer
                    } else {
                        Role::Consumer
                    };
                    return Err(PipelineError::WorkerPanicked(missing));
                }
            };
            let summary = result.inspect_err(|e| tracing::error!("{} failed: {}", role, e))?;
            match summary.role {
                Role::Producer => producer = Some(summary),
                Role::Consumer => consumer = Some(summary),
            }
        }
    }
}

/// Spawn a second worker next to `running`. If the spawn fails, `running` is
/// joined before the error is returned so no thread is left behind.
fn spawn_or_join<F>(
    running: JoinHandle<()>,
    builder: thread::Builder,
    body: F,
) -> io::Result<(JoinHandle<()>, JoinHandle<()>)>
where
    F: FnOnce() + Send + 'static,
{
    match builder.spawn(body) {
        Ok(handle) => Ok((running, handle)),
        Err(e) => {
            let _ = running.join();
            Err(e)
        }
    }
}

type WorkerOutcome = (Role, Result<LoopSummary, PipelineError>);

/// Run one worker body and send its result, turning a panic into
/// `WorkerPanicked` so the main thread never waits on a dead worker.
fn report_outcome<F>(tx: &mpsc::UnboundedSender<WorkerOutcome>, role: Role, body: F)
where
    F: FnOnce() -> Result<LoopSummary, PipelineError>,
{
    let result = panic::catch_unwind(AssertUnwindSafe(body))
        .unwrap_or_else(|_| Err(PipelineError::WorkerPanicked(role)));
    let _ = tx.send((role, result));
}
