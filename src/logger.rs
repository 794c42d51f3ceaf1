//! Asynchronous request logger.
//!
//! Producers push lines onto an unbounded channel and return immediately.
//! One dedicated thread drains the channel in FIFO order and, for each line,
//! opens the sink in append mode, writes the line and closes it again. A line
//! whose sink cannot be opened is reported through `tracing` and dropped.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::error::LoggerError;

/// Where request lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    /// Standard output, or the writer given to [`RequestLogger::with_console`].
    Console,
    /// A file opened in append mode for every line.
    File(PathBuf),
}

impl LogSink {
    /// `File(path)`, or `Console` when `path` is empty.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            LogSink::Console
        } else {
            LogSink::File(path.to_path_buf())
        }
    }
}

impl fmt::Display for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSink::Console => write!(f, "console"),
            LogSink::File(path) => write!(f, "{}", path.display()),
        }
    }
}

enum Message {
    Line(String),
    Configure(LogSink),
    Flush(oneshot::Sender<()>),
    Wake,
}

/// Counters kept by the consumer thread.
#[derive(Debug, Default)]
pub struct LoggerStats {
    written: AtomicU64,
    dropped: AtomicU64,
}

impl LoggerStats {
    /// Lines successfully written to the sink.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Lines lost to an unavailable sink, plus lines enqueued after or still
    /// queued at shutdown.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Hands request log lines to a background writer.
///
/// # Example
/// ```
/// use static_cache_server::logger::{LogSink, RequestLogger};
///
/// let dir = std::env::temp_dir().join(format!("request-log-doc-{}", std::process::id()));
/// std::fs::create_dir_all(&dir).unwrap();
/// let path = dir.join("requests.log");
///
/// let logger = RequestLogger::start(LogSink::File(path.clone()));
/// logger.enqueue("127.0.0.1 /a.txt 5.00 B");
/// assert!(logger.flush());
///
/// let text = std::fs::read_to_string(&path).unwrap();
/// assert!(text.ends_with("127.0.0.1 /a.txt 5.00 B\n"));
/// # std::fs::remove_dir_all(&dir).unwrap();
/// ```
pub struct RequestLogger {
    sender: mpsc::UnboundedSender<Message>,
    stop: Arc<AtomicBool>,
    stats: Arc<LoggerStats>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RequestLogger {
    /// Start the consumer thread, writing console lines to standard output.
    pub fn start(sink: LogSink) -> Self {
        Self::with_console(sink, io::stdout())
    }

    /// Start the consumer thread with `console` standing in for standard output.
    pub fn with_console(sink: LogSink, console: impl Write + Send + 'static) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(LoggerStats::default());

        let consumer = Consumer {
            receiver,
            sink,
            console: Box::new(console),
            stop: Arc::clone(&stop),
            stats: Arc::clone(&stats),
        };
        let worker = thread::Builder::new()
            .name("request-logger".to_string())
            .spawn(move || consumer.run())
            .map_err(|err| error!(%err, "failed to spawn request logger thread"))
            .ok();

        Self {
            sender,
            stop,
            stats,
            worker: Mutex::new(worker),
        }
    }

    /// Point subsequent lines at `sink`.
    ///
    /// The change travels through the queue, so lines enqueued before this
    /// call still go to the previous sink.
    pub fn configure(&self, sink: LogSink) {
        let _ = self.sender.send(Message::Configure(sink));
    }

    /// Append a line to the queue. Never blocks on I/O.
    pub fn enqueue(&self, line: impl Into<String>) {
        if self.sender.send(Message::Line(line.into())).is_err() {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            debug!("request logger stopped, line discarded");
        }
    }

    /// Block until every line enqueued before this call has been handled.
    ///
    /// Returns `false` if the logger stopped first. Must not be called from
    /// inside an async context; use [`flush_async`](Self::flush_async) there.
    pub fn flush(&self) -> bool {
        match self.request_flush() {
            Some(done) => done.blocking_recv().is_ok(),
            None => false,
        }
    }

    /// Async form of [`flush`](Self::flush).
    pub async fn flush_async(&self) -> bool {
        match self.request_flush() {
            Some(done) => done.await.is_ok(),
            None => false,
        }
    }

    fn request_flush(&self) -> Option<oneshot::Receiver<()>> {
        let (done, wait) = oneshot::channel();
        self.sender.send(Message::Flush(done)).ok()?;
        Some(wait)
    }

    /// Stop the consumer after the line it is currently writing.
    ///
    /// Lines still queued are discarded; call [`flush`](Self::flush) first if
    /// they matter.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Release);
        let _ = self.sender.send(Message::Wake);

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            let _ = worker.join();
        }
    }

    pub fn stats(&self) -> Arc<LoggerStats> {
        Arc::clone(&self.stats)
    }
}

impl Drop for RequestLogger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLogger")
            .field("written", &self.stats.written())
            .field("dropped", &self.stats.dropped())
            .field("stopped", &self.stop.load(Ordering::Relaxed))
            .finish()
    }
}

struct Consumer {
    receiver: mpsc::UnboundedReceiver<Message>,
    sink: LogSink,
    console: Box<dyn Write + Send>,
    stop: Arc<AtomicBool>,
    stats: Arc<LoggerStats>,
}

impl Consumer {
    fn run(mut self) {
        debug!(sink = %self.sink, "request logger started");
        while let Some(message) = self.receiver.blocking_recv() {
            if self.stop.load(Ordering::Acquire) {
                self.discard(message);
                break;
            }
            match message {
                Message::Line(line) => match self.write_line(&line) {
                    Ok(()) => {
                        self.stats.written.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(err) => {
                        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                        error!(%err, "dropping request log line");
                    }
                },
                Message::Configure(sink) => {
                    debug!(%sink, "request log sink changed");
                    self.sink = sink;
                }
                Message::Flush(done) => {
                    let _ = done.send(());
                }
                Message::Wake => {}
            }
        }
        debug!("request logger stopping");
    }

    /// Count `first` and everything still queued as dropped.
    ///
    /// The channel is closed first so later enqueues fail and are counted by
    /// the producer instead.
    fn discard(&mut self, first: Message) {
        self.receiver.close();
        let mut dropped = 0;
        let mut next = Some(first);
        while let Some(message) = next {
            if let Message::Line(_) = message {
                dropped += 1;
            }
            next = self.receiver.try_recv().ok();
        }
        if dropped > 0 {
            self.stats.dropped.fetch_add(dropped, Ordering::Relaxed);
            debug!(dropped, "request logger stopped with lines queued");
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), LoggerError> {
        let unavailable = |sink: &LogSink, source| LoggerError::SinkUnavailable {
            sink: sink.to_string(),
            source,
        };

        match &self.sink {
            LogSink::Console => {
                writeln!(self.console, "{line}")
                    .and_then(|()| self.console.flush())
                    .map_err(|source| unavailable(&self.sink, source))
            }
            LogSink::File(path) => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| unavailable(&self.sink, source))?;
                writeln!(file, "{line}").map_err(|source| unavailable(&self.sink, source))
            }
        }
    }
}
