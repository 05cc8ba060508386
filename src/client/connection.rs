// src/client/connection.rs

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use crate::common::error::{ClientError, ClientResult, TransportFault};

/// Upper bound for a single response. Anything longer is truncated.
pub const RECV_BUFFER_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Outcome of one receive call.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Data(Vec<u8>),
    /// The peer closed its side without an error.
    EndOfStream,
}

/// Owns the single outbound TCP connection.
pub struct ConnectionManager {
    client_socket: Mutex<Option<TcpStream>>,
    is_connected: AtomicBool,
    io_timeout: Option<Duration>,
}

impl ConnectionManager {
    pub fn new(io_timeout: Option<Duration>) -> Self {
        ConnectionManager {
            client_socket: Mutex::new(None),
            is_connected: AtomicBool::new(false),
            io_timeout,
        }
    }

    pub fn connect(&self, host: &str, port: u16) -> ClientResult<()> {
        let addr = format!("{}:{}", host, port);
        info!("Client is connecting to {}...", addr);

        let mut socket = self.client_socket.lock();
        if socket.is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        let connect_error = |source: io::Error| ClientError::Connect {
            addr: addr.clone(),
            source,
        };

        let stream = TcpStream::connect((host, port)).map_err(connect_error)?;
        stream.set_nodelay(true).map_err(connect_error)?;
        stream.set_read_timeout(self.io_timeout).map_err(connect_error)?;
        stream.set_write_timeout(self.io_timeout).map_err(connect_error)?;

        *socket = Some(stream);
        self.is_connected.store(true, Ordering::Release);
        info!("Connected to server {}", addr);
        Ok(())
    }

    /// Releases the socket if there is one. Never fails; errors from the
    /// underlying shutdown are logged and the handle is dropped anyway.
    pub fn close(&self) {
        let mut socket = self.client_socket.lock();
        if let Some(stream) = socket.take() {
            match stream.shutdown(Shutdown::Both) {
                Ok(()) => info!("Socket closed."),
                Err(e) => error!("Error closing socket: {}", e),
            }
        }
        self.is_connected.store(false, Ordering::Release);
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_connected.load(Ordering::Acquire) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Writes the whole line or fails.
    pub fn send(&self, line: &str) -> ClientResult<()> {
        let mut socket = self.client_socket.lock();
        let stream = socket.as_mut().ok_or(ClientError::NotConnected)?;

        debug!("Sending {} bytes", line.len());
        stream
            .write_all(line.as_bytes())
            .map_err(TransportFault::from)?;
        stream.flush().map_err(TransportFault::from)?;
        Ok(())
    }

    /// Blocks for a single read of at most `RECV_BUFFER_SIZE` bytes.
    pub fn receive(&self) -> ClientResult<Reply> {
        let mut socket = self.client_socket.lock();
        let stream = socket.as_mut().ok_or(ClientError::NotConnected)?;

        let mut buffer = [0u8; RECV_BUFFER_SIZE];
        let n = stream.read(&mut buffer).map_err(TransportFault::from)?;
        debug!("Received {} bytes", n);

        if n == 0 {
            return Ok(Reply::EndOfStream);
        }
        Ok(Reply::Data(buffer[..n].to_vec()))
    }

    /// A handle that can tear the connection down from another thread while
    /// this one is blocked in `receive`.
    pub fn interrupt_handle(&self) -> ClientResult<InterruptHandle> {
        let socket = self.client_socket.lock();
        let stream = socket.as_ref().ok_or(ClientError::NotConnected)?;
        let stream = stream.try_clone().map_err(TransportFault::from)?;
        Ok(InterruptHandle { stream })
    }
}

pub struct InterruptHandle {
    stream: TcpStream,
}

impl InterruptHandle {
    /// Shuts both directions of the connection. A blocked read on the owning
    /// side returns immediately and the session ends.
    pub fn interrupt(&self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            warn!("Failed to interrupt connection: {}", e);
        }
    }
}
