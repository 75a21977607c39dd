//! Node Probing
//!
//! Boundary between the refresh engine and the wire protocol:
//! - `NodeProber` opens a connection to one node
//! - `NodeConnection` performs the liveness round-trip and releases itself
//! - `TcpProber` is the stock implementation over plain TCP

pub mod test_utils;

use futures::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::error::ProbeError;
use crate::types::ConnectionTarget;

/// Opens connections to candidate nodes without blocking the caller.
pub trait NodeProber: Send + Sync + 'static {
    type Connection: NodeConnection;

    fn connect(&self, target: &ConnectionTarget) -> BoxFuture<'static, Result<Self::Connection, ProbeError>>;
}

/// An open connection to a single node.
///
/// Implementations must release their resources when dropped, since the
/// refresh engine drops connections of probes abandoned at the deadline
/// instead of closing them.
pub trait NodeConnection: Send + 'static {
    /// One lightweight round-trip confirming the node answers.
    fn ping(&mut self) -> BoxFuture<'_, Result<(), ProbeError>>;

    fn close(self) -> BoxFuture<'static, ()>;
}

/// What counts as a sign of life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    /// A completed TCP handshake
    Connect,
    /// A `PING` answered with a status reply
    #[default]
    Ping,
}

/// Probes nodes over plain TCP.
#[derive(Debug, Clone, Default)]
pub struct TcpProber {
    mode: ProbeMode,
}

impl TcpProber {
    pub fn new(mode: ProbeMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ProbeMode {
        self.mode
    }
}

impl NodeProber for TcpProber {
    type Connection = TcpConnection;

    fn connect(&self, target: &ConnectionTarget) -> BoxFuture<'static, Result<TcpConnection, ProbeError>> {
        if target.tls() {
            return future::ready(Err(ProbeError::Connect(format!(
                "{} requires TLS, which the TCP prober does not speak",
                target
            ))))
            .boxed();
        }

        let addr = target.socket_addr();
        let mode = self.mode;
        async move {
            let stream = TcpStream::connect(&addr)
                .await
                .map_err(|e| ProbeError::Connect(format!("{}: {}", addr, e)))?;
            stream.set_nodelay(true)?;
            debug!("Connected to {}", addr);
            Ok::<_, ProbeError>(TcpConnection {
                stream: BufReader::new(stream),
                mode,
            })
        }
        .boxed()
    }
}

/// TCP connection opened by [`TcpProber`]; the socket closes on drop.
#[derive(Debug)]
pub struct TcpConnection {
    stream: BufReader<TcpStream>,
    mode: ProbeMode,
}

impl NodeConnection for TcpConnection {
    fn ping(&mut self) -> BoxFuture<'_, Result<(), ProbeError>> {
        async move {
            if self.mode == ProbeMode::Connect {
                return Ok(());
            }

            self.stream.get_mut().write_all(b"PING\r\n").await?;

            let mut reply = String::new();
            let read = self.stream.read_line(&mut reply).await?;
            if read == 0 {
                return Err(ProbeError::Closed);
            }
            trace!("PING reply: {:?}", reply.trim_end());

            match reply.as_bytes().first() {
                Some(b'+') => Ok(()),
                Some(b'-') => Err(ProbeError::Protocol(reply[1..].trim_end().to_string())),
                _ => Err(ProbeError::Protocol(format!(
                    "unexpected PING reply {:?}",
                    reply.trim_end()
                ))),
            }
        }
        .boxed()
    }

    fn close(self) -> BoxFuture<'static, ()> {
        let mut stream = self.stream.into_inner();
        async move {
            if let Err(e) = stream.shutdown().await {
                trace!("Ignoring shutdown error: {}", e);
            }
        }
        .boxed()
    }
}
