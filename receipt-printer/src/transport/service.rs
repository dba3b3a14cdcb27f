//! Platform print services registered by name

use super::{Outcome, PrintJob, Transport};
use crate::error::PrintResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A platform print service reachable in-process
///
/// Platform adapters implement this and register it under the service name
/// they answer to.
#[async_trait]
pub trait PrinterService: Send + Sync {
    /// Send raw ESC/POS data; `Ok(true)` when the service accepted it
    async fn print(&self, data: &[u8]) -> PrintResult<bool>;
}

/// Name → service table consulted by [`ServiceTransport`]
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<dyn PrinterService>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the service answering to `name`
    pub fn register(&mut self, name: impl Into<String>, service: Arc<dyn PrinterService>) {
        self.services.insert(name.into(), service);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PrinterService>> {
        self.services.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.services.keys()).finish()
    }
}

/// Delivers through the first registered candidate service that accepts
#[derive(Debug)]
pub struct ServiceTransport {
    candidates: Vec<String>,
    registry: ServiceRegistry,
}

impl ServiceTransport {
    pub fn new(candidates: Vec<String>, registry: ServiceRegistry) -> Self {
        Self {
            candidates,
            registry,
        }
    }
}

#[async_trait]
impl Transport for ServiceTransport {
    fn name(&self) -> &'static str {
        "service"
    }

    async fn is_available(&self) -> bool {
        self.candidates.iter().any(|n| self.registry.contains(n))
    }

    #[instrument(skip(self, job), fields(bytes = job.encoded.len()))]
    async fn attempt(&self, job: &PrintJob<'_>) -> Outcome {
        for name in &self.candidates {
            let Some(service) = self.registry.get(name) else {
                debug!(service = %name, "Service not registered");
                continue;
            };

            match service.print(job.encoded).await {
                Ok(true) => {
                    debug!(service = %name, "Service accepted job");
                    return Outcome::Success;
                }
                Ok(false) => warn!(service = %name, "Service declined job"),
                Err(e) => warn!(service = %name, error = %e, "Service call failed"),
            }
        }

        Outcome::failure("no candidate service accepted the job")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PrintError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        answer: Option<bool>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(answer: Option<bool>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PrinterService for Fixed {
        async fn print(&self, _data: &[u8]) -> PrintResult<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
                .ok_or_else(|| PrintError::Service("binder died".to_string()))
        }
    }

    fn job() -> PrintJob<'static> {
        PrintJob::new(b"data", "data")
    }

    #[tokio::test]
    async fn test_unregistered_candidates_unavailable() {
        let t = ServiceTransport::new(vec!["a".into(), "b".into()], ServiceRegistry::new());
        assert!(!t.is_available().await);
        assert!(!t.attempt(&job()).await.is_success());
    }

    #[tokio::test]
    async fn test_first_accepting_service_wins() {
        let failing = Fixed::new(None);
        let declining = Fixed::new(Some(false));
        let accepting = Fixed::new(Some(true));
        let unused = Fixed::new(Some(true));

        let mut registry = ServiceRegistry::new();
        registry.register("failing", failing.clone());
        registry.register("declining", declining.clone());
        registry.register("accepting", accepting.clone());
        registry.register("unused", unused.clone());

        let t = ServiceTransport::new(
            ["missing", "failing", "declining", "accepting", "unused"]
                .into_iter()
                .map(String::from)
                .collect(),
            registry,
        );

        assert!(t.is_available().await);
        assert_eq!(t.attempt(&job()).await, Outcome::Success);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(declining.calls.load(Ordering::SeqCst), 1);
        assert_eq!(accepting.calls.load(Ordering::SeqCst), 1);
        assert_eq!(unused.calls.load(Ordering::SeqCst), 0);
    }
}
