//! Throughput checkpoints and their CSV persistence.
//!
//! Each loop keeps its own [`CheckpointLog`] of `(second, cumulative count)`
//! samples. Samples taken within the same wall clock second collapse into one
//! entry holding the latest count.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::event::unix_seconds;

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("unable to open stats file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to write stats file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to resolve hostname: {0}")]
    Hostname(#[from] nix::errno::Errno),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Producer,
    Consumer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Producer => "producer",
            Role::Consumer => "consumer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn hostname() -> Result<String, CheckpointError> {
    let name = nix::unistd::gethostname()?;
    Ok(name
        .into_string()
        .unwrap_or_else(|raw| raw.to_string_lossy().into_owned()))
}

/// `<prefix><role>-<hostname>.csv`. The prefix is used verbatim, so a
/// directory needs its trailing separator.
pub fn stats_file(prefix: &str, role: Role, hostname: &str) -> PathBuf {
    PathBuf::from(format!("{}{}-{}.csv", prefix, role, hostname))
}

/// Output paths for both loops of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsFiles {
    pub producer: PathBuf,
    pub consumer: PathBuf,
}

impl StatsFiles {
    pub fn new(prefix: &str, hostname: &str) -> Self {
        Self {
            producer: stats_file(prefix, Role::Producer, hostname),
            consumer: stats_file(prefix, Role::Consumer, hostname),
        }
    }

    /// Resolve against the local hostname.
    pub fn for_host(prefix: &str) -> Result<Self, CheckpointError> {
        Ok(Self::new(prefix, &hostname()?))
    }

    pub fn path(&self, role: Role) -> &Path {
        match role {
            Role::Producer => &self.producer,
            Role::Consumer => &self.consumer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub second: u64,
    pub count: u64,
}

#[derive(Debug, Clone)]
pub struct CheckpointLog {
    entries: Vec<Checkpoint>,
    interval: NonZeroUsize,
}

impl CheckpointLog {
    /// Seeded with `{now, 0}`.
    pub fn new(total: usize, interval: NonZeroUsize) -> Self {
        Self::starting_at(unix_seconds(), total, interval)
    }

    pub fn starting_at(second: u64, total: usize, interval: NonZeroUsize) -> Self {
        // one slot per boundary, plus the seed and the closing entry
        let mut entries = Vec::with_capacity(total / interval.get() + 2);
        entries.push(Checkpoint { second, count: 0 });
        Self { entries, interval }
    }

    /// Sample the current second if `index` sits on a log boundary.
    pub fn observe(&mut self, index: usize) -> bool {
        self.observe_at(unix_seconds(), index)
    }

    pub fn observe_at(&mut self, second: u64, index: usize) -> bool {
        if index % self.interval.get() != 0 {
            return false;
        }
        self.record(second, index as u64);
        true
    }

    /// Append `{second, count}`, or overwrite the last count when `second`
    /// is not later than the last entry's second.
    pub fn record(&mut self, second: u64, count: u64) {
        match self.entries.last_mut() {
            Some(last) if second <= last.second => last.count = count,
            _ => self.entries.push(Checkpoint { second, count }),
        }
    }

    /// Closing sample carrying the loop's final cumulative count.
    pub fn finish(&mut self, count: u64) {
        self.record(unix_seconds(), count);
    }

    pub fn entries(&self) -> &[Checkpoint] {
        &self.entries
    }

    pub fn last(&self) -> Option<&Checkpoint> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One `"<second>, <count>"` line per entry, in log order.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for entry in &self.entries {
            writeln!(writer, "{}, {}", entry.second, entry.count)?;
        }
        Ok(())
    }

    /// Append the log to `path`, creating the file if needed.
    pub fn persist(&self, path: &Path) -> Result<(), CheckpointError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| CheckpointError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)
            .and_then(|_| writer.flush())
            .map_err(|source| CheckpointError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!("{} checkpoints written to {}", self.len(), path.display());
        Ok(())
    }
}
