//! Submission to the OS print spooler (CUPS `lp` / `lpr`)

use super::{CommandRunner, Outcome, PrintJob, Transport, find_in_path};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Pipes the plain-text rendering of the job into the spooler
///
/// The spooler gets text, not ESC/POS: centering and bold are already
/// emulated in the rendering. Success means the spooler accepted the job;
/// completion of the queued job is not awaited.
#[derive(Debug)]
pub struct SpoolerTransport {
    command: String,
    title: String,
    runner: Arc<dyn CommandRunner>,
}

impl SpoolerTransport {
    pub fn new(command: &str, title: &str, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            command: command.to_string(),
            title: title.to_string(),
            runner,
        }
    }

    /// Title flag differs between `lp` and BSD `lpr`
    fn args(&self) -> Vec<String> {
        let is_lpr = Path::new(&self.command)
            .file_name()
            .is_some_and(|n| n == "lpr");
        let flag = if is_lpr { "-T" } else { "-t" };
        vec![flag.to_string(), self.title.clone()]
    }
}

#[async_trait]
impl Transport for SpoolerTransport {
    fn name(&self) -> &'static str {
        "spooler"
    }

    async fn is_available(&self) -> bool {
        find_in_path(&self.command).is_some()
    }

    #[instrument(skip(self, job), fields(command = %self.command, chars = job.text.len()))]
    async fn attempt(&self, job: &PrintJob<'_>) -> Outcome {
        match self
            .runner
            .run(&self.command, &self.args(), Some(job.text.as_bytes()))
            .await
        {
            Ok(out) if out.success() => {
                info!(reply = %out.stdout.trim(), "Spooler accepted job");
                Outcome::Success
            }
            Ok(out) => {
                warn!(status = ?out.status, stderr = %out.stderr.trim(), "Spooler rejected job");
                Outcome::failure(format!("spooler exited with {:?}", out.status))
            }
            Err(e) => Outcome::failure(format!("spooler not runnable: {}", e)),
        }
    }
}
