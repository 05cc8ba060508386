// src/common/error.rs

use std::io;
use thiserror::Error;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("not connected to server")]
    NotConnected,

    #[error("already connected to server")]
    AlreadyConnected,

    #[error("client has been shut down")]
    ShutDown,

    #[error(transparent)]
    Transport(#[from] TransportFault),
}

/// A fault reported by the network stack while sending or receiving.
#[derive(Debug, Error)]
pub enum TransportFault {
    #[error("Peer reset the connection: {0}")]
    PeerReset(#[source] io::Error),

    #[error("Peer aborted the connection: {0}")]
    PeerAborted(#[source] io::Error),

    #[error("Socket error: {0}")]
    Other(#[source] io::Error),
}

impl From<io::Error> for TransportFault {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionReset => TransportFault::PeerReset(err),
            io::ErrorKind::ConnectionAborted => TransportFault::PeerAborted(err),
            _ => TransportFault::Other(err),
        }
    }
}
