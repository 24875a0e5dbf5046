//! Session and relay loop.
//!
//! A [`Session`] owns one connection pair for its whole life. [`Session::run`]
//! waits for whichever side becomes readable, performs one bounded read, and
//! hands the bytes to the policy:
//!
//! ```text
//! loop {
//!     select! {
//!         primary readable   -> read -> policy.on_chunk(bytes, Primary)
//!         secondary readable -> read -> policy.on_chunk(bytes, Secondary)
//!         injection queued   -> policy.on_injection(injection)
//!     }
//! }
//! ```
//!
//! The loop ends on the first zero-length read (peer closed), read error,
//! or policy error. Both connections are shut down and released before
//! `run` returns, whichever way it ends.
//!
//! # Example
//!
//! ```ignore
//! use wirebridge::{policy::Forward, Session};
//!
//! let client = listener.accept().await?.0;
//! let server = TcpStream::connect(upstream).await?;
//! Session::new(client, server, Forward).run().await?;
//! ```

use std::future::pending;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::{SessionConfig, DEFAULT_INJECTION_QUEUE, DEFAULT_READ_BUFFER_SIZE};
use crate::error::{BridgeError, Result};
use crate::link::Link;
use crate::policy::{HandlerPolicy, Injection, Outbound};
use crate::protocol::{Directional, Role};

/// Type-erased read half of a connection.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Handle for queueing injections into a running session.
///
/// Cloneable; every clone feeds the same session. Sends fail with
/// [`BridgeError::ConnectionClosed`] once the session has ended.
#[derive(Debug, Clone)]
pub struct InjectHandle {
    tx: mpsc::Sender<Injection>,
}

impl InjectHandle {
    /// Queue an injection, waiting while the queue is full.
    pub async fn send(&self, injection: Injection) -> Result<()> {
        self.tx
            .send(injection)
            .await
            .map_err(|_| BridgeError::ConnectionClosed)
    }

    /// Queue a payload for the client.
    pub async fn send_to_primary(&self, payload: impl Into<Outbound>) -> Result<()> {
        self.send(Injection::new(Role::Primary, payload)).await
    }

    /// Queue a payload for the server.
    pub async fn send_to_secondary(&self, payload: impl Into<Outbound>) -> Result<()> {
        self.send(Injection::new(Role::Secondary, payload)).await
    }

    /// Whether the session has ended.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// One relayed connection pair and its policy.
pub struct Session<P> {
    readers: Directional<BoxedReader>,
    link: Link,
    policy: P,
    read_buffer_size: usize,
    injection_queue: usize,
    injections: Option<(mpsc::Sender<Injection>, mpsc::Receiver<Injection>)>,
}

impl<P: HandlerPolicy> Session<P> {
    /// Create a session over two established streams.
    ///
    /// `primary` is the client-side connection, `secondary` the server-side.
    pub fn new<A, B>(primary: A, secondary: B, policy: P) -> Self
    where
        A: AsyncRead + AsyncWrite + Send + Unpin + 'static,
        B: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (primary_read, primary_write) = tokio::io::split(primary);
        let (secondary_read, secondary_write) = tokio::io::split(secondary);
        Self {
            readers: Directional::new(Box::new(primary_read), Box::new(secondary_read)),
            link: Link::new(primary_write, secondary_write),
            policy,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            injection_queue: DEFAULT_INJECTION_QUEUE,
            injections: None,
        }
    }

    /// Apply session settings.
    pub fn with_config(mut self, config: &SessionConfig) -> Self {
        self.read_buffer_size = config.read_buffer_size.max(1);
        self.injection_queue = config.injection_queue.max(1);
        self
    }

    /// Set the number of bytes requested per read.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Get a handle for injecting into this session once it runs.
    pub fn inject_handle(&mut self) -> InjectHandle {
        let queue = self.injection_queue;
        let (tx, _) = self.injections.get_or_insert_with(|| mpsc::channel(queue));
        InjectHandle { tx: tx.clone() }
    }

    /// The policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Run the relay loop until either side closes or an error occurs.
    pub async fn run(self) -> Result<()> {
        let Session {
            mut readers,
            mut link,
            mut policy,
            read_buffer_size,
            injections,
            ..
        } = self;
        // Only handles keep the queue open from here on.
        let mut injections = injections.map(|(_, rx)| rx);

        info!(read_buffer_size, "session started");
        let result = relay(
            &mut readers,
            &mut link,
            &mut policy,
            read_buffer_size,
            &mut injections,
        )
        .await;

        link.shutdown().await;
        match &result {
            Ok(()) => info!(
                to_client = link.bytes_sent(Role::Primary),
                to_server = link.bytes_sent(Role::Secondary),
                "session closed"
            ),
            Err(e) => error!("session ended: {}", e),
        }
        result
    }
}

enum Event {
    Read(Role, std::io::Result<usize>),
    Injection(Option<Injection>),
}

async fn relay<P: HandlerPolicy>(
    readers: &mut Directional<BoxedReader>,
    link: &mut Link,
    policy: &mut P,
    read_buffer_size: usize,
    injections: &mut Option<mpsc::Receiver<Injection>>,
) -> Result<()> {
    let mut buffers = Directional::from_fn(|_| vec![0u8; read_buffer_size]);

    loop {
        let event = {
            let Directional {
                primary: primary_reader,
                secondary: secondary_reader,
            } = &mut *readers;
            let Directional {
                primary: primary_buf,
                secondary: secondary_buf,
            } = &mut buffers;

            tokio::select! {
                read = primary_reader.read(primary_buf) => Event::Read(Role::Primary, read),
                read = secondary_reader.read(secondary_buf) => Event::Read(Role::Secondary, read),
                injection = next_injection(injections) => Event::Injection(injection),
            }
        };

        match event {
            Event::Read(origin, Ok(0)) => {
                info!(%origin, "peer closed");
                return Ok(());
            }
            Event::Read(origin, Ok(n)) => {
                let chunk = &buffers.get(origin)[..n];
                policy.on_chunk(chunk, origin, link).await?;
            }
            Event::Read(origin, Err(e)) => {
                debug!(%origin, "read failed: {}", e);
                return Err(BridgeError::Io(e));
            }
            Event::Injection(Some(injection)) => {
                policy.on_injection(injection, link).await?;
            }
            Event::Injection(None) => {
                debug!("all inject handles dropped");
                *injections = None;
            }
        }
    }
}

async fn next_injection(rx: &mut Option<mpsc::Receiver<Injection>>) -> Option<Injection> {
    match rx {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}
