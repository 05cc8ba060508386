// src/common/logging.rs

use std::io;
use tracing::Dispatch;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// Per-client log stream.
///
/// The sink owns its own `tracing` dispatcher and is only made current while
/// one of its client's operations runs (see [`DiagnosticSink::scope`]).
/// Nothing is registered globally or per thread, so several clients alive at
/// once each log to their own stream regardless of the order they are built
/// or dropped in.
#[derive(Clone)]
pub struct DiagnosticSink {
    dispatch: Option<Dispatch>,
}

impl DiagnosticSink {
    /// Log lines go to standard output, interleaved with the session.
    pub fn stdout(level: Level) -> Self {
        Self::with_writer(io::stdout, level)
    }

    pub fn with_writer<W>(writer: W, level: Level) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(writer)
            .with_max_level(level)
            .with_ansi(false)
            .with_target(false)
            .finish();

        DiagnosticSink {
            dispatch: Some(Dispatch::new(subscriber)),
        }
    }

    /// Runs `f` with this sink as the current log target. Once detached,
    /// `f` runs against whatever the caller already had installed.
    pub fn scope<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }

    pub fn detach(&mut self) {
        self.dispatch = None;
    }
}

#[cfg(test)]
pub(crate) use capture::CapturedLogs;
