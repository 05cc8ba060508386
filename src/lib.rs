// src/lib.rs

pub mod common;
pub mod client;

pub use crate::client::TcpClient;
pub use crate::common::config::ClientConfig;
pub use crate::common::error::{ClientError, ClientResult, TransportFault};
