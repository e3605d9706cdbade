use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection timed out")]
    TimedOut,
    #[error("connection cancelled")]
    Cancelled,
    #[error("{source}")]
    Io {
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    pub(crate) fn io(source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::TimedOut,
            _ => Self::Io { source },
        }
    }
}

/// The byte stream a dialogue speaks across.
pub trait Transport {
    /// Writes `line` followed by CRLF.
    fn write_line(&mut self, line: &str) -> Result<(), TransportError>;
    /// Reads whatever is available. `Ok(0)` means the peer closed.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
    /// Orderly close once the dialogue is over.
    fn close(&mut self);
    /// Tears the connection down without waiting for the peer.
    fn abort(&mut self);
}

/// Point in time after which every pending operation fails with
/// [`TransportError::TimedOut`]. `None` never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn after(timeout: Option<Duration>) -> Self {
        Self(timeout.map(|timeout| Instant::now() + timeout))
    }

    pub fn never() -> Self {
        Self(None)
    }

    pub fn remaining(&self) -> Result<Option<Duration>, TransportError> {
        match self.0 {
            None => Ok(None),
            Some(at) => {
                let left = at.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    Err(TransportError::TimedOut)
                } else {
                    Ok(Some(left))
                }
            }
        }
    }
}

/// Plain TCP transport bounded by a single [`Deadline`].
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
    deadline: Deadline,
    cancelled: Arc<AtomicBool>,
}

impl TcpTransport {
    /// Connects to the first reachable address of `host`. Name resolution is
    /// the caller's job so that it can share the same deadline.
    pub fn connect(
        host: &str,
        addrs: &[SocketAddr],
        deadline: Deadline,
    ) -> Result<Self, TransportError> {
        let mut last_err = None;
        for &addr in addrs {
            let attempt = match deadline.remaining()? {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    tracing::debug!(host, peer = %addr, "connected");
                    return Ok(Self {
                        stream,
                        peer: addr,
                        deadline,
                        cancelled: Arc::new(AtomicBool::new(false)),
                    });
                }
                Err(err) => {
                    tracing::debug!(host, peer = %addr, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }
        Err(TransportError::io(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no socket address available for {host}"),
            )
        })))
    }

    /// Handle that aborts this connection from another thread.
    pub fn canceller(&self) -> Result<Canceller, TransportError> {
        Ok(Canceller {
            stream: self.stream.try_clone().map_err(TransportError::io)?,
            cancelled: Arc::clone(&self.cancelled),
        })
    }

    fn check_cancelled(&self) -> Result<(), TransportError> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(TransportError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Transport for TcpTransport {
    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.check_cancelled()?;
        let timeout = self.deadline.remaining()?;
        self.stream
            .set_write_timeout(timeout)
            .map_err(TransportError::io)?;
        let mut data = line.as_bytes().to_vec();
        data.extend_from_slice(b"\r\n");
        let written = self
            .stream
            .write_all(&data)
            .and_then(|()| self.stream.flush());
        self.check_cancelled()?;
        written.map_err(TransportError::io)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.check_cancelled()?;
        let timeout = self.deadline.remaining()?;
        self.stream
            .set_read_timeout(timeout)
            .map_err(TransportError::io)?;
        let read = self.stream.read(buf);
        self.check_cancelled()?;
        read.map_err(TransportError::io)
    }

    fn close(&mut self) {
        if let Err(err) = self.stream.shutdown(Shutdown::Write) {
            tracing::debug!(peer = %self.peer, error = %err, "shutdown after dialogue failed");
        }
    }

    fn abort(&mut self) {
        if let Err(err) = self.stream.shutdown(Shutdown::Both) {
            tracing::debug!(peer = %self.peer, error = %err, "abort failed");
        }
    }
}

/// Aborts a [`TcpTransport`] from outside the dialogue. The blocked
/// operation fails with [`TransportError::Cancelled`].
#[derive(Debug)]
pub struct Canceller {
    stream: TcpStream,
    cancelled: Arc<AtomicBool>,
}

impl Canceller {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Err(err) = self.stream.shutdown(Shutdown::Both) {
            tracing::debug!(error = %err, "shutdown on cancel failed");
        }
    }
}
