//! Persistence and reporting sinks.
//!
//! Sinks are shared between sessions, so both traits take `&self` and
//! require `Send + Sync`. Policies never await a sink on the relay path:
//! deliveries go through a [`SinkQueue`], whose worker task calls the sinks
//! in order. A failing or slow sink costs log lines and dropped
//! deliveries, never relayed traffic.
//!
//! ```text
//! Inject ─► SinkQueue (bounded, try_send) ─► worker task ─► sink.dump / sink.report
//! ```

use std::io::Write;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};
use crate::policy::BoxFuture;
use crate::protocol::Role;
use crate::registry::Message;

/// Receives every decoded message an [`Inject`](crate::policy::Inject)
/// policy observes.
pub trait PersistenceSink: Send + Sync {
    /// Store one message together with the side it came from.
    fn dump<'a>(&'a self, message: &'a Message, origin: Role) -> BoxFuture<'a, Result<()>>;
}

/// Receives values extracted from configured response messages.
pub trait ReportingSink: Send + Sync {
    /// Report the numeric values observed for `identifier`.
    fn report<'a>(&'a self, identifier: &'a str, values: &'a [i64]) -> BoxFuture<'a, Result<()>>;
}

enum SinkJob {
    Dump {
        sink: Arc<dyn PersistenceSink>,
        message: Message,
        origin: Role,
    },
    Report {
        sink: Arc<dyn ReportingSink>,
        identifier: String,
        values: Vec<i64>,
    },
    Flush(oneshot::Sender<()>),
}

/// Bounded, ordered hand-off from a session to its sinks.
///
/// Deliveries that do not fit are dropped with a warning. The worker task
/// outlives the queue until every accepted delivery has been attempted.
#[derive(Debug, Clone)]
pub struct SinkQueue {
    tx: mpsc::Sender<SinkJob>,
}

impl SinkQueue {
    /// Spawn the worker task. Must be called from within a tokio runtime.
    pub fn spawn(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(deliver(rx));
        Self { tx }
    }

    /// Queue a persistence dump.
    pub fn dump(&self, sink: Arc<dyn PersistenceSink>, message: Message, origin: Role) {
        self.enqueue(SinkJob::Dump {
            sink,
            message,
            origin,
        });
    }

    /// Queue a report.
    pub fn report(&self, sink: Arc<dyn ReportingSink>, identifier: String, values: Vec<i64>) {
        self.enqueue(SinkJob::Report {
            sink,
            identifier,
            values,
        });
    }

    /// Wait until everything queued so far has been delivered.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(SinkJob::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }

    fn enqueue(&self, job: SinkJob) {
        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("sink queue full, dropping delivery");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("sink worker gone, dropping delivery");
            }
        }
    }
}

async fn deliver(mut rx: mpsc::Receiver<SinkJob>) {
    while let Some(job) = rx.recv().await {
        match job {
            SinkJob::Dump {
                sink,
                message,
                origin,
            } => {
                if let Err(e) = sink.dump(&message, origin).await {
                    warn!(name = %message.name, "dump failed: {}", e);
                }
            }
            SinkJob::Report {
                sink,
                identifier,
                values,
            } => match sink.report(&identifier, &values).await {
                Ok(()) => debug!(%identifier, "report delivered"),
                Err(e) => warn!(%identifier, "report failed: {}", e),
            },
            SinkJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("sink worker stopped");
}

#[derive(Serialize)]
struct DumpRecord<'a> {
    origin: Role,
    name: &'a str,
    body: &'a serde_json::Value,
}

#[derive(Serialize)]
struct ReportRecord<'a> {
    identifier: &'a str,
    values: &'a [i64],
}

/// Writes one JSON object per line to any writer.
///
/// Implements both sink traits, so the same file can hold message dumps
/// and reports. Writes run on the blocking pool.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    out: Arc<Mutex<W>>,
}

impl<W: Write + Send + 'static> JsonLinesSink<W> {
    /// Wrap a writer.
    pub fn new(out: W) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
        }
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        Arc::try_unwrap(self.out)
            .map_err(|_| BridgeError::Sink("sink write still in flight".to_string()))?
            .into_inner()
            .map_err(|_| BridgeError::Sink("sink lock poisoned".to_string()))
    }

    async fn write_line<T: Serialize>(&self, record: &T) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let out = Arc::clone(&self.out);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut out = out
                .lock()
                .map_err(|_| BridgeError::Sink("sink lock poisoned".to_string()))?;
            out.write_all(&line)?;
            out.flush()?;
            Ok(())
        })
        .await
        .map_err(|e| BridgeError::Sink(format!("sink write aborted: {}", e)))?
    }
}

impl<W: Write + Send + 'static> PersistenceSink for JsonLinesSink<W> {
    fn dump<'a>(&'a self, message: &'a Message, origin: Role) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.write_line(&DumpRecord {
                origin,
                name: &message.name,
                body: &message.body,
            })
            .await
        })
    }
}

impl<W: Write + Send + 'static> ReportingSink for JsonLinesSink<W> {
    fn report<'a>(&'a self, identifier: &'a str, values: &'a [i64]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.write_line(&ReportRecord { identifier, values }).await })
    }
}
