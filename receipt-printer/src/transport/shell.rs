//! Raw shell redirection into device files

use super::command::{sh_quote, stage};
use super::{CommandRunner, Outcome, PrintJob, RootProbe, Transport, find_in_path};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Redirection templates, `{src}` / `{dev}` substituted with quoted paths
const TEMPLATES: [&str; 2] = ["cat {src} > {dev}", "dd if={src} of={dev}"];

/// Last-resort backend: copies a staging file onto each candidate device
///
/// Every (template, device) pair is tried once with `su -c` when the host is
/// rooted, then once with `sh -c`. The staging file is removed on every exit
/// path.
#[derive(Debug)]
pub struct ShellTransport {
    device_paths: Vec<String>,
    staging_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
    root: Arc<RootProbe>,
}

impl ShellTransport {
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

    fn scripts(&self, source: &str) -> Vec<String> {
        self.device_paths
            .iter()
            .flat_map(|device| {
                let dev = sh_quote(device);
                TEMPLATES
                    .iter()
                    .map(move |t| t.replace("{src}", source).replace("{dev}", &dev))
            })
            .collect()
    }
}

#[async_trait]
impl Transport for ShellTransport {
    fn name(&self) -> &'static str {
        "shell"
    }

    async fn is_available(&self) -> bool {
        find_in_path("sh").is_some()
    }

    #[instrument(skip(self, job), fields(bytes = job.encoded.len()))]
    async fn attempt(&self, job: &PrintJob<'_>) -> Outcome {
        let staged = match stage(&self.staging_dir, job.encoded) {
            Ok(f) => f,
            Err(e) => return Outcome::failure(format!("staging failed: {}", e)),
        };
        let scripts = self.scripts(&sh_quote(&staged.path().to_string_lossy()));

        let mut shells = Vec::with_capacity(2);
        if self.root.is_rooted().await {
            shells.push("su");
        }
        shells.push("sh");

        for shell in shells {
            for script in &scripts {
                let args = ["-c".to_string(), script.clone()];
                match self.runner.run(shell, &args, None).await {
                    Ok(out) if out.success() => {
                        info!(shell, script = %script, "Shell redirection succeeded");
                        return Outcome::Success;
                    }
                    Ok(out) => debug!(shell, script = %script, status = ?out.status, "Redirection failed"),
                    Err(e) => debug!(shell, error = %e, "Shell failed to start"),
                }
            }
        }

        Outcome::failure("every redirection command failed")
    }
}
