//! Privileged write of the job into printer device files

use super::command::{sh_quote, stage};
use super::{CommandRunner, Outcome, PrintJob, RootProbe, Transport};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Stages the job to a file and redirects it into a device via `su -c`
///
/// Runs only on rooted hosts: the root probe is consulted before any
/// privileged command is spawned.
#[derive(Debug)]
pub struct ElevatedWriteTransport {
    device_paths: Vec<String>,
    staging_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
    root: Arc<RootProbe>,
}

impl ElevatedWriteTransport {
    pub fn new(
        device_paths: Vec<String>,
        staging_dir: PathBuf,
        runner: Arc<dyn CommandRunner>,
        root: Arc<RootProbe>,
    ) -> Self {
        Self {
            device_paths,
            staging_dir,
            runner,
            root,
        }
    }
}

#[async_trait]
impl Transport for ElevatedWriteTransport {
    fn name(&self) -> &'static str {
        "elevated"
    }

    async fn is_available(&self) -> bool {
        self.root.is_rooted().await
    }

    #[instrument(skip(self, job), fields(bytes = job.encoded.len()))]
    async fn attempt(&self, job: &PrintJob<'_>) -> Outcome {
        if !self.root.is_rooted().await {
            return Outcome::failure("not rooted");
        }

        let staged = match stage(&self.staging_dir, job.encoded) {
            Ok(f) => f,
            Err(e) => return Outcome::failure(format!("staging failed: {}", e)),
        };
        let source = sh_quote(&staged.path().to_string_lossy());

        for device in &self.device_paths {
            let script = format!("cat {} > {}", source, sh_quote(device));
            let args = ["-c".to_string(), script];

            match self.runner.run("su", &args, None).await {
                Ok(out) if out.success() => {
                    debug!(device = %device, "Privileged write succeeded");
                    return Outcome::Success;
                }
                Ok(out) => {
                    debug!(device = %device, status = ?out.status, stderr = %out.stderr.trim(), "Privileged write failed")
                }
                Err(e) => warn!(device = %device, error = %e, "su failed to start"),
            }
        }

        Outcome::failure("no device accepted the privileged write")
    }
}
