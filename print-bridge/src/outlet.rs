//! Where a finished receipt goes besides the printer
//!
//! `view` shows the persisted receipt file, `share` hands its content to
//! the host. Both are best effort: failures are logged by the session and
//! never change the outcome of a cut.

use crate::error::{BridgeError, BridgeResult};
use async_trait::async_trait;
use receipt_printer::CommandRunner;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[async_trait]
pub trait ReceiptOutlet: Send + Sync + std::fmt::Debug {
    async fn view(&self, path: &Path) -> BridgeResult<()>;

    async fn share(&self, content: &str) -> BridgeResult<()>;
}

/// Logs instead of presenting anything
#[derive(Debug, Default)]
pub struct LoggingOutlet;

#[async_trait]
impl ReceiptOutlet for LoggingOutlet {
    async fn view(&self, path: &Path) -> BridgeResult<()> {
        info!(path = %path.display(), "Receipt saved");
        Ok(())
    }

    async fn share(&self, content: &str) -> BridgeResult<()> {
        info!(chars = content.chars().count(), "Receipt ready to share");
        Ok(())
    }
}

/// Opens the receipt with a desktop opener (`xdg-open`, `open`, ...) and
/// shares by writing a timestamped copy next to it
#[derive(Debug)]
pub struct OpenerOutlet {
    command: String,
    share_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl OpenerOutlet {
    pub fn new(command: &str, share_dir: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            command: command.to_string(),
            share_dir: share_dir.into(),
            runner,
        }
    }
}

#[async_trait]
impl ReceiptOutlet for OpenerOutlet {
    async fn view(&self, path: &Path) -> BridgeResult<()> {
        let args = [path.to_string_lossy().into_owned()];
        let out = self.runner.run(&self.command, &args, None).await?;
        if !out.success() {
            return Err(BridgeError::Io(std::io::Error::other(format!(
                "{} exited with {:?}: {}",
                self.command,
                out.status,
                out.stderr.trim()
            ))));
        }
        Ok(())
    }

    async fn share(&self, content: &str) -> BridgeResult<()> {
        let name = format!("receipt_{}.txt", chrono::Local::now().format("%Y%m%d_%H%M%S_%3f"));
        let path = self.share_dir.join(name);
        tokio::fs::write(&path, content).await?;
        info!(path = %path.display(), "Receipt shared");
        Ok(())
    }
}
