//! TCP listener with a supervised accept loop
//!
//! Binding is the only fatal step. Accept failures are retried with
//! exponential backoff, and each connection runs in its own task with panics
//! caught at the task boundary.

use futures_util::FutureExt;
use socket2::{Domain, Protocol, Socket, Type};
use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::Instrument;

use super::{serve_commands, serve_raw, ConnectionEnd, ConnectionStats};
use crate::channel::HandoffSender;
use crate::constants::{ACCEPT_BACKOFF_INITIAL_MS, ACCEPT_BACKOFF_MAX_MS};
use crate::error::NetworkError;
use crate::protocol::{Command, RawFrame};

const LISTEN_BACKLOG: i32 = 128;

/// Where accepted connections deliver their data
#[derive(Clone)]
pub enum Ingest {
    /// Decode the command protocol
    Commands(HandoffSender<Command>),
    /// Read fixed-size raw frames
    Raw {
        frames: HandoffSender<RawFrame>,
        pixel_count: usize,
    },
}

impl Ingest {
    fn protocol(&self) -> &'static str {
        match self {
            Self::Commands(_) => "command",
            Self::Raw { .. } => "raw",
        }
    }

    /// Run the matching connection handler on `stream`
    async fn serve(self, stream: TcpStream) -> (ConnectionEnd, ConnectionStats) {
        match self {
            Self::Commands(commands) => serve_commands(stream, commands).await,
            Self::Raw {
                frames,
                pixel_count,
            } => serve_raw(stream, pixel_count, frames).await,
        }
    }
}

/// Bind a non-blocking TCP listener with address reuse
pub fn bind(addr: SocketAddr) -> Result<TcpListener, NetworkError> {
    let bind_failed = |source| NetworkError::BindFailed {
        addr: addr.to_string(),
        source,
    };

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(bind_failed)?;
    socket.set_reuse_address(true).map_err(bind_failed)?;
    socket.set_nonblocking(true).map_err(bind_failed)?;
    socket.bind(&addr.into()).map_err(bind_failed)?;
    socket.listen(LISTEN_BACKLOG).map_err(bind_failed)?;

    TcpListener::from_std(socket.into()).map_err(bind_failed)
}

/// Exponential backoff for accept retries
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(ACCEPT_BACKOFF_INITIAL_MS),
            Duration::from_millis(ACCEPT_BACKOFF_MAX_MS),
        )
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; doubles the next one up to the ceiling
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Listening socket for one ingestion protocol
pub struct StrandListener {
    listener: TcpListener,
}

impl StrandListener {
    pub fn bind(addr: SocketAddr) -> Result<Self, NetworkError> {
        let listener = bind(addr)?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        self.listener
            .local_addr()
            .map_err(NetworkError::ConnectionFailed)
    }

    /// Accept connections forever, spawning a handler task for each
    pub async fn run(self, ingest: Ingest) {
        let addr = self
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "?".into());
        tracing::info!("Listening for {} connections on {}", ingest.protocol(), addr);

        let mut backoff = Backoff::default();
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    backoff.reset();
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!("Failed to set TCP_NODELAY for {}: {}", peer, e);
                    }
                    spawn_connection(peer, ingest.protocol(), ingest.clone().serve(stream));
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!("Accept failed: {}; retrying in {:?}", e, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Run a connection handler in its own task, confining panics to it
pub fn spawn_connection<F>(peer: SocketAddr, protocol: &'static str, handler: F)
where
    F: Future<Output = (ConnectionEnd, ConnectionStats)> + Send + 'static,
{
    let span = tracing::info_span!("connection", %peer, protocol);
    tokio::spawn(
        async move {
            tracing::debug!("Connection accepted");
            match AssertUnwindSafe(handler).catch_unwind().await {
                Ok((end, stats)) => end.log(&stats),
                Err(panic) => {
                    tracing::error!("Connection handler panicked: {}", panic_message(&*panic))
                }
            }
        }
        .instrument(span),
    );
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
