//! Line stream transport: a TCP socket seen as a queue of text units.
//!
//! Every call returns straight away. Dialing runs on the tokio runtime and
//! is picked up by later polls; reads take whatever the socket holds right
//! now; writes that the socket cannot take yet wait in an outbox, in order.
//! Failures park the connection in [`ConnectionState::Errored`] until the
//! owner calls [`LineStream::disconnect`].

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::core::buffer::ReceiveBuffer;
use crate::core::config::LinkConfig;
use crate::core::error::{NetError, Result};

const READ_CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

enum Link {
    Idle,
    Dialing {
        target: String,
        task: JoinHandle<io::Result<TcpStream>>,
    },
    Open(TcpStream),
    Failed(NetError),
}

pub struct LineStream {
    link: Link,
    buffer: ReceiveBuffer,
    outbox: Vec<u8>,
    config: LinkConfig,
}

impl LineStream {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            link: Link::Idle,
            buffer: ReceiveBuffer::new(),
            outbox: Vec::new(),
            config,
        }
    }

    /// Wraps a socket handed out by a listener.
    pub fn from_accepted(stream: TcpStream, config: LinkConfig) -> Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            link: Link::Open(stream),
            buffer: ReceiveBuffer::new(),
            outbox: Vec::new(),
            config,
        })
    }

    /// Starts dialing `target` (`host:port`).
    ///
    /// No-op while an attempt is in flight, once connected, or after a
    /// failure that has not been cleared with [`disconnect`](Self::disconnect).
    pub fn connect(&mut self, target: &str) {
        match self.link {
            Link::Idle => {}
            Link::Dialing { .. } => {
                self.poll();
                return;
            }
            Link::Open(_) => return,
            Link::Failed(_) => {
                trace!(peer = %target, "connect ignored on errored connection");
                return;
            }
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                self.link = Link::Failed(NetError::connect(target, io::Error::other(e)));
                return;
            }
        };

        let addr = target.to_string();
        let timeout = self.config.connect_timeout;
        let task = runtime.spawn(async move {
            let stream = tokio::time::timeout(timeout, tokio::net::TcpStream::connect(addr))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
            stream.set_nodelay(true)?;
            stream.into_std()
        });

        debug!(peer = %target, ?timeout, "dialing");
        self.link = Link::Dialing {
            target: target.to_string(),
            task,
        };
    }

    /// Picks up the outcome of an in-flight dial, then reports the state.
    pub fn poll(&mut self) -> ConnectionState {
        let Link::Dialing { target, task } = &mut self.link else {
            return self.state();
        };
        if !task.is_finished() {
            return ConnectionState::Connecting;
        }
        let Some(joined) = task.now_or_never() else {
            return ConnectionState::Connecting;
        };
        let target = std::mem::take(target);

        self.link = match joined {
            Ok(Ok(stream)) => {
                info!(peer = %target, "connected");
                Link::Open(stream)
            }
            Ok(Err(source)) => {
                let error = NetError::connect(target, source);
                warn!(%error, "connect failed");
                Link::Failed(error)
            }
            Err(join) => Link::Failed(NetError::connect(target, io::Error::other(join))),
        };
        self.state()
    }

    pub fn state(&self) -> ConnectionState {
        match self.link {
            Link::Idle => ConnectionState::Disconnected,
            Link::Dialing { .. } => ConnectionState::Connecting,
            Link::Open(_) => ConnectionState::Connected,
            Link::Failed(_) => ConnectionState::Errored,
        }
    }

    /// True once the TCP handshake has completed.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn last_error(&self) -> Option<&NetError> {
        match &self.link {
            Link::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drops the connection together with any buffered or queued bytes.
    pub fn disconnect(&mut self) {
        match std::mem::replace(&mut self.link, Link::Idle) {
            Link::Dialing { task, .. } => task.abort(),
            Link::Open(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
            }
            Link::Idle | Link::Failed(_) => {}
        }
        let discarded = self.buffer.clear();
        if !discarded.is_empty() {
            debug!(bytes = discarded.len(), "discarded partial unit");
        }
        self.outbox.clear();
    }

    /// Next unit ending with `delimiter`, delimiter included.
    pub fn read_unit(&mut self, delimiter: u8) -> Result<Option<String>> {
        self.receive()?;
        self.buffer.take_until(delimiter)
    }

    pub fn read_line(&mut self) -> Result<Option<String>> {
        self.read_unit(b'\n')
    }

    /// Next `count` characters, however many bytes they take.
    pub fn read_fixed(&mut self, count: usize) -> Result<Option<String>> {
        self.receive()?;
        self.buffer.take_chars(count)
    }

    /// Everything buffered, but only once the socket has run dry.
    pub fn drain_all(&mut self) -> Result<Option<String>> {
        if !self.receive()? {
            return Ok(None);
        }
        self.buffer.take_all()
    }

    /// Evicts whatever partial unit is buffered.
    pub fn clear_buffer(&mut self) -> String {
        self.buffer.clear()
    }

    /// Queues `text` and writes as much as the socket accepts.
    pub fn send_text(&mut self, text: &str) -> Result<()> {
        match &self.link {
            Link::Open(_) => {}
            Link::Failed(error) => return Err(error.clone()),
            Link::Idle | Link::Dialing { .. } => return Err(NetError::not_connected()),
        }

        let pending = self.outbox.len() + text.len();
        let limit = self.config.max_pending_send;
        if pending > limit {
            return Err(self.fail(NetError::Backpressure { pending, limit }));
        }
        self.outbox.extend_from_slice(text.as_bytes());

        let flushed = match &mut self.link {
            Link::Open(stream) => flush_outbox(stream, &mut self.outbox),
            _ => Ok(()),
        };
        flushed.map_err(|e| self.fail(e))
    }

    /// Next buffered unit ending with `delimiter`. Does not touch the socket.
    pub fn take_unit(&mut self, delimiter: u8) -> Result<Option<String>> {
        self.buffer.take_until(delimiter)
    }

    pub fn take_line(&mut self) -> Result<Option<String>> {
        self.take_unit(b'\n')
    }

    /// Flushes the outbox and pulls available bytes into the buffer, once.
    /// `Ok(true)` means the socket had nothing more to give.
    pub fn receive(&mut self) -> Result<bool> {
        self.poll();
        let pumped = match &mut self.link {
            Link::Open(stream) => pump(stream, &mut self.buffer, &mut self.outbox, &self.config),
            Link::Failed(error) => return Err(error.clone()),
            Link::Idle | Link::Dialing { .. } => return Ok(true),
        };
        pumped.map_err(|e| self.fail(e))
    }

    fn fail(&mut self, error: NetError) -> NetError {
        warn!(%error, "connection failed");
        if let Link::Open(stream) = &self.link {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.link = Link::Failed(error.clone());
        error
    }
}

impl Drop for LineStream {
    fn drop(&mut self) {
        if let Link::Dialing { task, .. } = &self.link {
            task.abort();
        }
    }
}

fn pump(
    stream: &mut TcpStream,
    buffer: &mut ReceiveBuffer,
    outbox: &mut Vec<u8>,
    config: &LinkConfig,
) -> Result<bool> {
    flush_outbox(stream, outbox)?;

    let mut chunk = [0u8; READ_CHUNK];
    let mut total = 0;
    while total < config.max_read_per_poll {
        match stream.read(&mut chunk) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed the connection",
                )
                .into())
            }
            Ok(n) => {
                buffer.append(&chunk[..n]);
                total += n;
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if total > 0 {
                    trace!(bytes = total, "received");
                }
                return Ok(true);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    trace!(bytes = total, "read budget exhausted");
    Ok(false)
}

fn flush_outbox(stream: &mut TcpStream, outbox: &mut Vec<u8>) -> Result<()> {
    let mut written = 0;
    let outcome = loop {
        if written == outbox.len() {
            break Ok(());
        }
        match stream.write(&outbox[written..]) {
            Ok(0) => break Err(io::Error::from(io::ErrorKind::WriteZero).into()),
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => break Err(e.into()),
        }
    };
    outbox.drain(..written);
    outcome
}
