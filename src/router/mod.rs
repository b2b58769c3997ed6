//! Log multiplexing.
//!
//! Every child's stdout and stderr, plus the supervisor's own status lines,
//! arrive on one channel consumed by a single router task. For each line the
//! router:
//!
//! 1. appends it to the service's log file and to `combined.log`,
//! 2. renders it to the terminal if the [`FilterSet`] lets it through,
//! 3. keeps it in the ring buffer for `logs` and start-up recaps.
//!
//! Lines of one service keep their arrival order in every sink because there
//! is exactly one consumer.

mod format;
mod ring;
mod sink;

pub use format::{LineFormatter, strip_child_prefix};
pub use ring::RingBuffer;
pub use sink::{COMBINED_LOG, Console, FileSinks};

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Pseudo-service for lines that belong to no service.
pub const MANAGER: &str = "manager";

/// Bound on lines queued between the readers and the router.
pub const LOG_CHANNEL_CAPACITY: usize = 1024;

/// Where a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
    /// Written by the supervisor, not by the child.
    Status,
}

impl StreamKind {
    /// Short tag used in log files.
    pub fn tag(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "out",
            StreamKind::Stderr => "err",
            StreamKind::Status => "status",
        }
    }
}

/// One line of output. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub service: String,
    pub timestamp: DateTime<Local>,
    pub text: String,
    pub stream: StreamKind,
}

impl LogLine {
    pub fn new(service: &str, stream: StreamKind, text: impl Into<String>) -> Self {
        Self {
            service: service.to_string(),
            timestamp: Local::now(),
            text: text.into(),
            stream,
        }
    }

    /// Supervisor status line about `service`.
    pub fn status(service: &str, text: impl Into<String>) -> Self {
        Self::new(service, StreamKind::Status, text)
    }

    /// Supervisor line that belongs to no service.
    pub fn manager(text: impl Into<String>) -> Self {
        Self::new(MANAGER, StreamKind::Status, text)
    }
}

/// Services whose lines reach the terminal. Empty means everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    names: Vec<String>,
}

impl FilterSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !out.contains(&name) {
                out.push(name);
            }
        }
        Self { names: out }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn allows(&self, service: &str) -> bool {
        service == MANAGER || self.names.is_empty() || self.names.iter().any(|n| n == service)
    }
}

/// Fan-in of every output stream, fan-out to terminal, files and history.
#[derive(Debug)]
pub struct LogRouter {
    filter: RwLock<FilterSet>,
    ring: Mutex<RingBuffer>,
    files: Mutex<FileSinks>,
    console: Arc<Console>,
    formatter: LineFormatter,
}

impl LogRouter {
    /// Create a router. `service_logs` maps each service to its log file.
    pub fn new(
        log_dir: &std::path::Path,
        service_logs: HashMap<String, std::path::PathBuf>,
        ring_capacity: usize,
        console: Arc<Console>,
        formatter: LineFormatter,
    ) -> Self {
        Self {
            filter: RwLock::new(FilterSet::default()),
            ring: Mutex::new(RingBuffer::new(ring_capacity)),
            files: Mutex::new(FileSinks::new(log_dir, service_logs)),
            console,
            formatter,
        }
    }

    /// Router for a resolved configuration.
    pub fn from_config(
        config: &crate::config::RunnerConfig,
        console: Arc<Console>,
        formatter: LineFormatter,
    ) -> Self {
        let service_logs = config
            .services
            .iter()
            .map(|s| (s.name.clone(), s.log_path.clone()))
            .collect();
        Self::new(
            &config.log_dir,
            service_logs,
            config.ring_capacity,
            console,
            formatter,
        )
    }

    pub fn channel() -> (mpsc::Sender<LogLine>, mpsc::Receiver<LogLine>) {
        mpsc::channel(LOG_CHANNEL_CAPACITY)
    }

    /// Start the router task. It ends when every sender is dropped.
    pub fn spawn(self: &Arc<Self>, rx: mpsc::Receiver<LogLine>) -> JoinHandle<()> {
        let router = Arc::clone(self);
        tokio::spawn(router.run(rx))
    }

    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<LogLine>) {
        while let Some(line) = rx.recv().await {
            self.ingest(line);
        }
        tracing::debug!("log channel closed, router exiting");
    }

    /// Route one line to every sink.
    pub fn ingest(&self, line: LogLine) {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .write(&line);

        // One read of the filter decides the whole line.
        let visible = self
            .filter
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .allows(&line.service);
        if visible {
            self.console.write_lines(&self.formatter.format(&line));
        }

        self.ring
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line);
    }

    /// Replace the filter. An empty list clears it.
    pub fn set_filter(&self, names: Vec<String>) {
        let next = FilterSet::new(names);
        tracing::info!(filter = ?next.names(), "filter changed");
        *self.filter.write().unwrap_or_else(|e| e.into_inner()) = next;
    }

    pub fn filter(&self) -> FilterSet {
        self.filter
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_visible(&self, service: &str) -> bool {
        self.filter
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .allows(service)
    }

    /// The last `n` lines of the given services (all when empty), oldest first.
    pub fn recent(&self, n: usize, services: &[String]) -> Vec<LogLine> {
        self.ring
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .recent(n, |l| services.is_empty() || services.contains(&l.service))
    }

    pub fn formatter(&self) -> &LineFormatter {
        &self.formatter
    }

    pub fn console(&self) -> &Arc<Console> {
        &self.console
    }
}
