// src/bin/client.rs

use std::process::{self, ExitCode};
use std::time::Duration;
use clap::Parser;
use tokio::task::JoinError;
use tracing::Level;
use arith_client::client::session::SessionEnd;
use arith_client::client::TcpClient;
use arith_client::common::config::{ClientConfig, DEFAULT_HOST, DEFAULT_PORT};
use arith_client::ClientResult;

/// Exit status used when the session is cut short by Ctrl-C.
const INTERRUPTED: i32 = 130;

/// How long an interrupted session gets to finish its own shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Parser)]
#[command(name = "arith-client", about = "Send arithmetic operations to a remote server")]
struct Cli {
    /// Server address
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Socket read/write timeout in seconds; blocks indefinitely when omitted
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,

    /// Minimum severity written to the log stream
    #[arg(long, default_value = "info")]
    log_level: Level,
}

impl Cli {
    fn into_config(self) -> ClientConfig {
        let config = ClientConfig::new(self.host, self.port).with_log_level(self.log_level);
        match self.timeout_secs {
            Some(secs) => config.with_io_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }
}

fn exit_code(joined: Result<ClientResult<SessionEnd>, JoinError>) -> ExitCode {
    match joined {
        Ok(Ok(end)) if end.is_fault() => ExitCode::FAILURE,
        Ok(Ok(_)) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Client task failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut client = TcpClient::new(Cli::parse().into_config());
    if let Err(e) = client.start() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    let interrupt = client.interrupt_handle();

    // The session blocks on the console and the socket, so it gets its own
    // thread.
    let mut session = tokio::task::spawn_blocking(move || client.run());

    tokio::select! {
        joined = &mut session => exit_code(joined),
        _ = tokio::signal::ctrl_c() => {
            if let Ok(interrupt) = &interrupt {
                interrupt.interrupt();
            }
            // A session blocked on the socket wakes up and shuts the client
            // down itself; one parked on stdin never returns.
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, &mut session).await;
            process::exit(INTERRUPTED);
        }
    }
}
