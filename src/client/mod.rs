// src/client/mod.rs

pub mod connection;
pub mod session;

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::{info, warn};
use crate::client::connection::{ConnectionManager, ConnectionState, InterruptHandle};
use crate::client::session::{SessionEnd, SessionLoop};
use crate::common::config::ClientConfig;
use crate::common::error::{ClientError, ClientResult};
use crate::common::logging::DiagnosticSink;

/// Interactive client for the arithmetic server.
///
/// The lifecycle is one-shot: `start` connects, `run` drives the session and
/// always finishes with `shutdown`. Dropping the client shuts it down too, so
/// the socket and the log sink are released on every exit path.
pub struct TcpClient {
    config: ClientConfig,
    connection: Arc<ConnectionManager>,
    session: SessionLoop,
    sink: DiagnosticSink,
    is_shut_down: bool,
}

impl TcpClient {
    /// Builds a client that logs to standard output.
    pub fn new(config: ClientConfig) -> Self {
        let sink = DiagnosticSink::stdout(config.log_level);
        Self::with_sink(config, sink)
    }

    pub fn with_sink(config: ClientConfig, sink: DiagnosticSink) -> Self {
        sink.scope(|| info!("Initializing client..."));
        let connection = Arc::new(ConnectionManager::new(config.io_timeout));
        let session = SessionLoop::new(Arc::clone(&connection));

        TcpClient {
            config,
            connection,
            session,
            sink,
            is_shut_down: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Connects to the configured server. This is the only failure that
    /// reaches the caller.
    pub fn start(&mut self) -> ClientResult<()> {
        if self.is_shut_down {
            return Err(ClientError::ShutDown);
        }

        self.sink
            .scope(|| self.connection.connect(&self.config.host, self.config.port))?;
        println!("Connected to server {}", self.config.address());
        Ok(())
    }

    /// Runs the session against the process console, then shuts down.
    pub fn run(&mut self) -> ClientResult<SessionEnd> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        self.run_with(&mut input, &mut output)
    }

    pub fn run_with<R, W>(&mut self, input: &mut R, output: &mut W) -> ClientResult<SessionEnd>
    where
        R: BufRead,
        W: Write,
    {
        if !self.connection.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let end = self.sink.scope(|| {
            info!("Client is running...");
            self.session.run(input, output)
        });
        self.shutdown();
        Ok(end)
    }

    pub fn interrupt_handle(&self) -> ClientResult<ClientInterrupt> {
        Ok(ClientInterrupt {
            handle: self.connection.interrupt_handle()?,
            sink: self.sink.clone(),
        })
    }

    /// Closes the connection and detaches the log sink. Safe to call any
    /// number of times, connected or not.
    pub fn shutdown(&mut self) {
        if self.is_shut_down {
            return;
        }

        self.sink.scope(|| {
            info!("Client is shutting down...");
            self.connection.close();
            info!("Client shutdown successfully.");
        });

        self.sink.detach();
        self.is_shut_down = true;
    }
}

impl Drop for TcpClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Cuts a client's session short from another thread, logging to the
/// client's own stream.
pub struct ClientInterrupt {
    handle: InterruptHandle,
    sink: DiagnosticSink,
}

impl ClientInterrupt {
    pub fn interrupt(&self) {
        self.sink.scope(|| {
            warn!("Session interrupted, closing connection");
            self.handle.interrupt();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::TransportFault;
    use crate::common::logging::CapturedLogs;
    use std::io::{Cursor, Read};
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tracing::Level;

    fn peer<F>(serve: F) -> (u16, JoinHandle<()>)
    where
        F: FnOnce(TcpStream) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            serve(stream);
        });
        (port, handle)
    }

    /// Reads until the client goes away, so joining the peer proves the
    /// client released its socket.
    fn drain(stream: &mut TcpStream) {
        let mut buf = [0u8; 1024];
        while let Ok(n) = stream.read(&mut buf) {
            if n == 0 {
                break;
            }
        }
    }

    fn client(port: u16, logs: &CapturedLogs) -> TcpClient {
        let config = ClientConfig::new("127.0.0.1", port);
        let sink = DiagnosticSink::with_writer(logs.clone(), Level::INFO);
        TcpClient::with_sink(config, sink)
    }

    #[test]
    fn test_shutdown_without_connect() {
        let logs = CapturedLogs::default();
        let mut client = client(65432, &logs);

        client.shutdown();
        client.shutdown();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(logs.count("Client shutdown successfully."), 1);
    }

    #[test]
    fn test_connect_failure_reaches_caller() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let logs = CapturedLogs::default();
        let mut client = client(port, &logs);
        assert!(matches!(client.start(), Err(ClientError::Connect { .. })));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(logs.contents().contains(&format!("Client is connecting to 127.0.0.1:{}...", port)));
    }

    #[test]
    fn test_run_before_start() {
        let logs = CapturedLogs::default();
        let mut client = client(65432, &logs);
        let result = client.run_with(&mut Cursor::new("ADD 5 10\n"), &mut Vec::new());
        assert!(matches!(result, Err(ClientError::NotConnected)));
    }

    #[test]
    fn test_server_reply_is_displayed() {
        let (port, server) = peer(|mut stream| {
            let mut buf = [0u8; 64];
            let n = stream.read(&mut buf).unwrap();
            assert_eq!(&buf[..n], b"ADD 5 10");
            stream.write_all(b"15").unwrap();
            drain(&mut stream);
        });

        let logs = CapturedLogs::default();
        let mut client = client(port, &logs);
        client.start().unwrap();
        assert_eq!(client.state(), ConnectionState::Connected);

        let mut output = Vec::new();
        let end = client.run_with(&mut Cursor::new("ADD 5 10\nquit\n"), &mut output).unwrap();
        server.join().unwrap();

        assert!(matches!(end, SessionEnd::Quit));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Response from server: 15"));
        let logs = logs.contents();
        assert!(logs.contains("Response from server: 15"));
        assert!(logs.contains("Socket closed."));
        assert!(logs.contains("Client shutdown successfully."));
    }

    #[test]
    fn test_cleanup_after_end_of_input() {
        let (port, server) = peer(|mut stream| drain(&mut stream));

        let logs = CapturedLogs::default();
        let mut client = client(port, &logs);
        client.start().unwrap();
        let end = client.run_with(&mut Cursor::new(""), &mut Vec::new()).unwrap();
        server.join().unwrap();

        assert!(matches!(end, SessionEnd::EndOfInput));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_cleanup_after_peer_close() {
        let (port, server) = peer(|mut stream| {
            let mut buf = [0u8; 64];
            let _ = stream.read(&mut buf).unwrap();
        });

        let logs = CapturedLogs::default();
        let mut client = client(port, &logs);
        client.start().unwrap();
        let end = client
            .run_with(&mut Cursor::new("ADD 1 1\nADD 2 2\n"), &mut Vec::new())
            .unwrap();
        server.join().unwrap();

        assert!(matches!(end, SessionEnd::PeerClosed));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(logs.count("Server closed the connection"), 1);
    }

    #[test]
    fn test_cleanup_after_peer_reset() {
        let (port, server) = peer(|mut stream| {
            let mut buf = [0u8; 64];
            let n = stream.read(&mut buf).unwrap();
            stream.write_all(&buf[..n]).unwrap();
            stream.peek(&mut buf).unwrap();
        });

        let logs = CapturedLogs::default();
        let mut client = client(port, &logs);
        client.start().unwrap();
        let end = client
            .run_with(&mut Cursor::new("ADD 5 10\nSUB 3 1\nquit\n"), &mut Vec::new())
            .unwrap();
        server.join().unwrap();

        assert!(matches!(
            end,
            SessionEnd::Fault(ClientError::Transport(TransportFault::PeerReset(_)))
        ));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(logs.count("Peer reset the connection"), 1);
        assert_eq!(logs.count("Client shutdown successfully."), 1);
    }

    #[test]
    fn test_cleanup_after_timeout() {
        let (port, server) = peer(|mut stream| drain(&mut stream));

        let logs = CapturedLogs::default();
        let config = ClientConfig::new("127.0.0.1", port).with_io_timeout(Duration::from_millis(100));
        let sink = DiagnosticSink::with_writer(logs.clone(), Level::INFO);
        let mut client = TcpClient::with_sink(config, sink);
        client.start().unwrap();
        let end = client.run_with(&mut Cursor::new("DIV 1 0\n"), &mut Vec::new()).unwrap();
        server.join().unwrap();

        assert!(matches!(
            end,
            SessionEnd::Fault(ClientError::Transport(TransportFault::Other(_)))
        ));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(logs.count("Socket error"), 1);
    }

    #[test]
    fn test_drop_releases_connection() {
        let (port, server) = peer(|mut stream| drain(&mut stream));

        let logs = CapturedLogs::default();
        {
            let mut client = client(port, &logs);
            client.start().unwrap();
        }
        server.join().unwrap();
        assert_eq!(logs.count("Client is shutting down..."), 1);
    }

    #[test]
    fn test_no_restart_after_shutdown() {
        let (port, server) = peer(|mut stream| drain(&mut stream));

        let logs = CapturedLogs::default();
        let mut client = client(port, &logs);
        client.start().unwrap();
        client.shutdown();
        server.join().unwrap();

        assert!(matches!(client.start(), Err(ClientError::ShutDown)));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_logs_stop_after_shutdown() {
        let logs = CapturedLogs::default();
        let mut client = client(65432, &logs);
        client.shutdown();

        info!("written after shutdown");
        assert_eq!(logs.count("written after shutdown"), 0);
        assert_eq!(logs.count("Initializing client..."), 1);
    }

    #[test]
    fn test_interleaved_clients_keep_their_own_logs() {
        let first_logs = CapturedLogs::default();
        let second_logs = CapturedLogs::default();
        let mut first = client(65432, &first_logs);
        let mut second = client(65433, &second_logs);

        first.shutdown();
        second.sink.scope(|| info!("second still alive"));
        second.shutdown();

        assert_eq!(first_logs.count("Initializing client..."), 1);
        assert_eq!(first_logs.count("Client shutdown successfully."), 1);
        assert_eq!(first_logs.count("second still alive"), 0);
        assert_eq!(second_logs.count("Initializing client..."), 1);
        assert_eq!(second_logs.count("second still alive"), 1);
        assert_eq!(second_logs.count("Client shutdown successfully."), 1);
    }

    #[test]
    fn test_interrupt_ends_session_with_cleanup() {
        let (port, server) = peer(|mut stream| drain(&mut stream));

        let logs = CapturedLogs::default();
        let mut client = client(port, &logs);
        client.start().unwrap();
        let interrupt = client.interrupt_handle().unwrap();
        interrupt.interrupt();

        let end = client
            .run_with(&mut Cursor::new("ADD 1 2\nquit\n"), &mut Vec::new())
            .unwrap();
        server.join().unwrap();

        assert!(end.is_fault() || matches!(end, SessionEnd::PeerClosed));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        let logs = logs.contents();
        assert_eq!(logs.matches("Session interrupted, closing connection").count(), 1);
        assert!(logs.contains("WARN"));
        assert!(logs.contains("Client is running..."));
        assert!(logs.contains("Client shutdown successfully."));
    }
}
