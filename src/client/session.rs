// src/client/session.rs

use std::io::{self, BufRead, Write};
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{error, info};
use crate::client::connection::{ConnectionManager, Reply};
use crate::common::error::{ClientError, ClientResult};

pub const PROMPT: &str =
    ">> Enter operation (ADD/SUB/DIV) and operands (e.g., ADD 5 10) or 'quit' to exit: ";
pub const QUIT_COMMAND: &str = "quit";

/// Why the interactive loop stopped.
#[derive(Debug)]
pub enum SessionEnd {
    /// The user typed the quit sentinel.
    Quit,
    /// Standard input reached end of file.
    EndOfInput,
    /// The server closed its side cleanly.
    PeerClosed,
    Fault(ClientError),
    /// Reading the prompt input or writing the console failed.
    Console(io::Error),
}

impl SessionEnd {
    pub fn is_fault(&self) -> bool {
        matches!(self, SessionEnd::Fault(_) | SessionEnd::Console(_))
    }
}

pub fn is_quit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(QUIT_COMMAND)
}

/// Drives prompt → send → receive → display until something ends it.
pub struct SessionLoop {
    connection: Arc<ConnectionManager>,
}

impl SessionLoop {
    pub fn new(connection: Arc<ConnectionManager>) -> Self {
        SessionLoop { connection }
    }

    /// Runs until quit, end of input, or a transport fault. Faults are logged
    /// here and handed back; none of them escape as errors.
    pub fn run<R, W>(&self, input: &mut R, output: &mut W) -> SessionEnd
    where
        R: BufRead,
        W: Write,
    {
        let end = loop {
            if let ControlFlow::Break(end) = self.cycle(input, output) {
                break end;
            }
        };

        report(&end);
        end
    }

    fn cycle<R, W>(&self, input: &mut R, output: &mut W) -> ControlFlow<SessionEnd>
    where
        R: BufRead,
        W: Write,
    {
        if let Err(e) = write!(output, "{}", PROMPT).and_then(|_| output.flush()) {
            return ControlFlow::Break(SessionEnd::Console(e));
        }

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) => return ControlFlow::Break(SessionEnd::EndOfInput),
            Ok(_) => {}
            Err(e) => return ControlFlow::Break(SessionEnd::Console(e)),
        }

        let request = line.trim_end_matches(['\r', '\n']);
        if is_quit_command(request) {
            return ControlFlow::Break(SessionEnd::Quit);
        }
        if request.trim().is_empty() {
            return ControlFlow::Continue(());
        }

        match self.exchange(request) {
            Ok(Reply::Data(bytes)) => {
                let message = format!("Response from server: {}", String::from_utf8_lossy(&bytes));
                if let Err(e) = writeln!(output, "{}", message) {
                    return ControlFlow::Break(SessionEnd::Console(e));
                }
                info!("{}", message);
                ControlFlow::Continue(())
            }
            Ok(Reply::EndOfStream) => ControlFlow::Break(SessionEnd::PeerClosed),
            Err(e) => ControlFlow::Break(SessionEnd::Fault(e)),
        }
    }

    fn exchange(&self, request: &str) -> ClientResult<Reply> {
        self.connection.send(request)?;
        self.connection.receive()
    }
}

fn report(end: &SessionEnd) {
    match end {
        SessionEnd::Quit => info!("Quit requested, ending session"),
        SessionEnd::EndOfInput => info!("End of input, ending session"),
        SessionEnd::PeerClosed => info!("Server closed the connection"),
        SessionEnd::Fault(ClientError::Transport(fault)) => error!("{}", fault),
        SessionEnd::Fault(e) => error!("Session error: {}", e),
        SessionEnd::Console(e) => error!("Console error: {}", e),
    }
}
