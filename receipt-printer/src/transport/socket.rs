//! Raw TCP printing to a local print daemon
//!
//! Most thermal printer bridges listen for raw data on port 9100 (and a few
//! neighbours). Each port is tried once, with a short connect timeout.

use super::{Outcome, PrintJob, Transport};
use crate::error::{PrintError, PrintResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

/// Loopback socket transport
#[derive(Debug, Clone)]
pub struct SocketTransport {
    host: String,
    ports: Vec<u16>,
    timeout: Duration,
}

impl SocketTransport {
    /// Create a transport for `host`, trying `ports` then `fallback_port`
    ///
    /// Duplicates are dropped so no port is tried twice per attempt.
    pub fn new(host: &str, ports: &[u16], fallback_port: u16) -> Self {
        let mut unique: Vec<u16> = Vec::with_capacity(ports.len() + 1);
        for port in ports.iter().copied().chain(std::iter::once(fallback_port)) {
            if !unique.contains(&port) {
                unique.push(port);
            }
        }

        Self {
            host: host.to_string(),
            ports: unique,
            timeout: Duration::from_secs(1),
        }
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ports in the order they are tried
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    #[instrument(skip(self, data), fields(host = %self.host, data_len = data.len()))]
    async fn send_to(&self, port: u16, data: &[u8]) -> PrintResult<()> {
        let target = format!("{}:{}", self.host, port);

        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(&target))
            .await
            .map_err(|_| PrintError::Timeout(format!("Connection timeout: {}", target)))?
            .map_err(|e| PrintError::Connection(format!("{}: {}", target, e)))?;

        debug!("Connected, sending {} bytes", data.len());

        stream.write_all(data).await.map_err(|e| {
            PrintError::Io(std::io::Error::new(
                e.kind(),
                format!("Write failed: {}", e),
            ))
        })?;
        stream.flush().await?;
        stream.shutdown().await?;

        Ok(())
    }
}

#[async_trait]
impl Transport for SocketTransport {
    fn name(&self) -> &'static str {
        "socket"
    }

    async fn attempt(&self, job: &PrintJob<'_>) -> Outcome {
        for &port in &self.ports {
            match self.send_to(port, job.encoded).await {
                Ok(()) => {
                    info!(port, "Print job sent to daemon");
                    return Outcome::Success;
                }
                Err(e) => warn!(port, error = %e, "Daemon port failed"),
            }
        }

        Outcome::failure(format!("no daemon accepted on {} ports", self.ports.len()))
    }
}
