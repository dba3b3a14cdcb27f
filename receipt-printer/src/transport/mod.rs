//! Transport layer: ordered fallback delivery of print jobs
//!
//! ```text
//!            ┌────────────────────┐
//!            │  Transport Trait   │  ◄── attempt(job) -> Outcome
//!            └─────────┬──────────┘
//!                      │
//!   ┌──────────┬───────┼────────┬──────────┐
//!   ▼          ▼       ▼        ▼          ▼
//! service  elevated  socket  spooler    shell
//! (a)      (b)       (c)     (d)        (e)
//! ```
//!
//! [`TransportChain`] tries each backend in order and stops at the first
//! success. Individual failures are logged and never escape the chain.

mod command;
mod elevated;
mod service;
mod shell;
mod socket;
mod spooler;

pub use command::{CommandOutput, CommandRunner, RootProbe, TokioCommandRunner, find_in_path};
pub use elevated::ElevatedWriteTransport;
pub use service::{PrinterService, ServiceRegistry, ServiceTransport};
pub use shell::ShellTransport;
pub use socket::SocketTransport;
pub use spooler::SpoolerTransport;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// A job handed to the transport chain
///
/// `encoded` is the ESC/POS stream; `text` is the plain-text rendering of the
/// same content for backends that cannot take raw control codes.
#[derive(Debug, Clone, Copy)]
pub struct PrintJob<'a> {
    pub encoded: &'a [u8],
    pub text: &'a str,
}

impl<'a> PrintJob<'a> {
    pub fn new(encoded: &'a [u8], text: &'a str) -> Self {
        Self { encoded, text }
    }
}

/// Result of a single backend attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

impl Outcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Outcome::Failure(reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// One recorded backend attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportAttempt {
    pub backend: &'static str,
    pub outcome: Outcome,
}

/// Ordered record of one delivery call
#[derive(Debug, Clone, Default)]
pub struct Delivery {
    pub attempts: Vec<TransportAttempt>,
}

impl Delivery {
    pub fn succeeded(&self) -> bool {
        self.attempts.last().is_some_and(|a| a.outcome.is_success())
    }

    /// Name of the backend that delivered the job
    pub fn delivered_by(&self) -> Option<&'static str> {
        self.attempts
            .iter()
            .find(|a| a.outcome.is_success())
            .map(|a| a.backend)
    }

    /// `backend: reason` pairs joined for logging and status reporting
    pub fn failure_summary(&self) -> String {
        if self.attempts.is_empty() {
            return "no transport available".to_string();
        }
        self.attempts
            .iter()
            .filter_map(|a| match &a.outcome {
                Outcome::Failure(reason) => Some(format!("{}: {}", a.backend, reason)),
                Outcome::Success => None,
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Delivery strategy for encoded print data
///
/// Implementations must not panic and must swallow their own errors,
/// reporting them as [`Outcome::Failure`]. Each candidate a backend knows
/// about (port, path, service name) is tried at most once per attempt.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Stable identifier used in logs and reports
    fn name(&self) -> &'static str;

    /// Capability query: whether this backend can work on the current host
    async fn is_available(&self) -> bool {
        true
    }

    /// Try to deliver the job once
    async fn attempt(&self, job: &PrintJob<'_>) -> Outcome;
}

/// Settings for the standard backend set
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Host of the local print daemon
    pub loopback_host: String,
    /// Candidate daemon ports, tried in order
    pub ports: Vec<u16>,
    /// Port retried last if not already listed
    pub fallback_port: u16,
    pub connect_timeout: Duration,
    /// Candidate printer device files
    pub device_paths: Vec<String>,
    /// Candidate platform service names
    pub services: Vec<String>,
    /// Spooler submission command (`lp` or `lpr`)
    pub spooler_command: String,
    pub job_title: String,
    /// Where staging files are created
    pub staging_dir: PathBuf,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            loopback_host: "localhost".to_string(),
            ports: vec![9100, 9101, 9102, 9103, 9104],
            fallback_port: 9100,
            connect_timeout: Duration::from_secs(1),
            device_paths: ["/dev/usb/lp0", "/dev/lp0", "/dev/printer", "/dev/ttyS1"]
                .into_iter()
                .map(String::from)
                .collect(),
            services: [
                "woyou.aidlservice.jiuiv5.IWoyouService",
                "com.sunmi.peripheral.printer.InnerPrinterService",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            spooler_command: "lp".to_string(),
            job_title: "Receipt".to_string(),
            staging_dir: std::env::temp_dir(),
        }
    }
}

/// Ordered list of transport backends
#[derive(Debug, Clone, Default)]
pub struct TransportChain {
    backends: Vec<Arc<dyn Transport>>,
}

impl TransportChain {
    /// Build a chain from backends as given, without capability checks
    pub fn new(backends: Vec<Arc<dyn Transport>>) -> Self {
        Self { backends }
    }

    /// Build a chain from the candidates that report themselves available
    ///
    /// Order among the kept backends is preserved.
    pub async fn probe(candidates: Vec<Arc<dyn Transport>>) -> Self {
        let mut backends = Vec::with_capacity(candidates.len());
        for backend in candidates {
            if backend.is_available().await {
                debug!(backend = backend.name(), "Transport available");
                backends.push(backend);
            } else {
                info!(backend = backend.name(), "Transport unavailable, skipped");
            }
        }
        Self { backends }
    }

    /// The standard backend set, in fallback order
    pub fn standard_backends(
        config: &ChainConfig,
        registry: ServiceRegistry,
        runner: Arc<dyn CommandRunner>,
    ) -> Vec<Arc<dyn Transport>> {
        let root = Arc::new(RootProbe::new(runner.clone()));

        vec![
            Arc::new(ServiceTransport::new(config.services.clone(), registry)),
            Arc::new(ElevatedWriteTransport::new(
                config.device_paths.clone(),
                config.staging_dir.clone(),
                runner.clone(),
                root.clone(),
            )),
            Arc::new(
                SocketTransport::new(
                    &config.loopback_host,
                    &config.ports,
                    config.fallback_port,
                )
                .with_timeout(config.connect_timeout),
            ),
            Arc::new(SpoolerTransport::new(
                &config.spooler_command,
                &config.job_title,
                runner.clone(),
            )),
            Arc::new(ShellTransport::new(
                config.device_paths.clone(),
                config.staging_dir.clone(),
                runner,
                root,
            )),
        ]
    }

    /// Backend names in chain order
    pub fn names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Deliver a job; `true` iff some backend succeeded
    pub async fn deliver(&self, job: &PrintJob<'_>) -> bool {
        self.deliver_with_report(job).await.succeeded()
    }

    /// Deliver a job and return every attempt made
    #[instrument(skip(self, job), fields(bytes = job.encoded.len(), backends = self.backends.len()))]
    pub async fn deliver_with_report(&self, job: &PrintJob<'_>) -> Delivery {
        let mut delivery = Delivery::default();

        for backend in &self.backends {
            let outcome = backend.attempt(job).await;
            let success = outcome.is_success();

            match &outcome {
                Outcome::Success => info!(backend = backend.name(), "Print job delivered"),
                Outcome::Failure(reason) => {
                    warn!(backend = backend.name(), reason = %reason, "Transport failed, trying next")
                }
            }

            delivery.attempts.push(TransportAttempt {
                backend: backend.name(),
                outcome,
            });

            if success {
                return delivery;
            }
        }

        warn!(summary = %delivery.failure_summary(), "All transports exhausted");
        delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Recording {
        name: &'static str,
        succeed: bool,
        available: bool,
        calls: AtomicUsize,
    }

    impl Recording {
        fn new(name: &'static str, succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                succeed,
                available: true,
                calls: AtomicUsize::new(0),
            })
        }

        fn unavailable(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                succeed: true,
                available: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn attempt(&self, _job: &PrintJob<'_>) -> Outcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Outcome::Success
            } else {
                Outcome::failure("refused")
            }
        }
    }

    fn job() -> PrintJob<'static> {
        PrintJob::new(b"\x1B\x40HELLO\n", "HELLO\n")
    }

    #[tokio::test]
    async fn test_chain_stops_at_first_success() {
        let a = Recording::new("service", false);
        let b = Recording::new("elevated", false);
        let c = Recording::new("socket", true);
        let d = Recording::new("spooler", true);
        let e = Recording::new("shell", true);

        let chain = TransportChain::new(vec![
            a.clone(),
            b.clone(),
            c.clone(),
            d.clone(),
            e.clone(),
        ]);
        let delivery = chain.deliver_with_report(&job()).await;

        assert!(delivery.succeeded());
        assert_eq!(delivery.delivered_by(), Some("socket"));
        assert_eq!(
            delivery.attempts.iter().map(|a| a.backend).collect::<Vec<_>>(),
            vec!["service", "elevated", "socket"]
        );
        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 1));
        assert_eq!((d.calls(), e.calls()), (0, 0));
    }

    #[tokio::test]
    async fn test_chain_exhaustion_returns_false() {
        let a = Recording::new("service", false);
        let b = Recording::new("shell", false);
        let chain = TransportChain::new(vec![a.clone(), b.clone()]);

        let delivery = chain.deliver_with_report(&job()).await;
        assert!(!delivery.succeeded());
        assert_eq!(delivery.attempts.len(), 2);
        assert_eq!(delivery.failure_summary(), "service: refused; shell: refused");
        assert!(!chain.deliver(&job()).await);
        assert_eq!(a.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_chain_fails() {
        let chain = TransportChain::default();
        let delivery = chain.deliver_with_report(&job()).await;
        assert!(!delivery.succeeded());
        assert_eq!(delivery.failure_summary(), "no transport available");
    }

    #[tokio::test]
    async fn test_probe_keeps_available_in_order() {
        let chain = TransportChain::probe(vec![
            Recording::new("service", false),
            Recording::unavailable("elevated"),
            Recording::new("socket", true),
        ])
        .await;
        assert_eq!(chain.names(), vec!["service", "socket"]);
    }

    #[test]
    fn test_standard_backend_order() {
        let backends = TransportChain::standard_backends(
            &ChainConfig::default(),
            ServiceRegistry::default(),
            Arc::new(TokioCommandRunner),
        );
        let names: Vec<_> = backends.iter().map(|b| b.name()).collect();
        assert_eq!(names, vec!["service", "elevated", "socket", "spooler", "shell"]);
    }
}
