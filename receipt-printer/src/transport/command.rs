//! Process execution for the shell-based backends

use async_trait::async_trait;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs external programs
#[async_trait]
pub trait CommandRunner: Send + Sync + std::fmt::Debug {
    /// Run `program` with `args`, optionally feeding `stdin`, and wait for exit
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&[u8]>,
    ) -> io::Result<CommandOutput>;
}

/// [`CommandRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&[u8]>,
    ) -> io::Result<CommandOutput> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input).await?;
            pipe.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Cached answer to "can this process run commands as root via `su`"
///
/// Probed once with `su -c id`; privileged backends consult it before every
/// privileged execution.
#[derive(Debug)]
pub struct RootProbe {
    runner: Arc<dyn CommandRunner>,
    rooted: OnceCell<bool>,
}

impl RootProbe {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            rooted: OnceCell::new(),
        }
    }

    /// Probe result fixed up front, no process spawned
    pub fn fixed(runner: Arc<dyn CommandRunner>, rooted: bool) -> Self {
        Self {
            runner,
            rooted: OnceCell::new_with(Some(rooted)),
        }
    }

    pub async fn is_rooted(&self) -> bool {
        *self
            .rooted
            .get_or_init(|| async {
                let args = ["-c".to_string(), "id".to_string()];
                let rooted = match self.runner.run("su", &args, None).await {
                    Ok(out) => out.success() && out.stdout.contains("uid=0"),
                    Err(e) => {
                        debug!(error = %e, "su not runnable");
                        false
                    }
                };
                info!(rooted, "Root probe finished");
                rooted
            })
            .await
    }
}

/// Locate an executable on `PATH` (or check an explicit path)
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}

/// Write `bytes` into a fresh staging file inside `dir`
///
/// The file is removed when the returned handle is dropped.
pub(crate) fn stage(dir: &Path, bytes: &[u8]) -> io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("receipt-")
        .suffix(".bin")
        .tempfile_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

/// Quote a string for `sh -c`
pub(crate) fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedRunner;
    use super::*;

    #[test]
    fn test_sh_quote() {
        assert_eq!(sh_quote("/dev/usb/lp0"), "'/dev/usb/lp0'");
        assert_eq!(sh_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_stage_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let staged = stage(dir.path(), b"abc").unwrap();
        let path = staged.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn test_find_in_path_explicit_missing() {
        assert!(find_in_path("/definitely/not/here/lp").is_none());
    }

    #[tokio::test]
    async fn test_root_probe_requires_uid_zero() {
        let runner = Arc::new(ScriptedRunner::always(Some(0)).with_stdout("uid=0(root) gid=0(root)"));
        let probe = RootProbe::new(runner.clone());
        assert!(probe.is_rooted().await);
        assert!(probe.is_rooted().await);
        // cached after the first probe
        assert_eq!(runner.calls().len(), 1);

        let runner = Arc::new(ScriptedRunner::always(Some(0)).with_stdout("uid=2000(shell)"));
        assert!(!RootProbe::new(runner).is_rooted().await);

        let runner = Arc::new(ScriptedRunner::always(None));
        assert!(!RootProbe::new(runner).is_rooted().await);
    }

    #[tokio::test]
    async fn test_tokio_runner_feeds_stdin() {
        if find_in_path("cat").is_none() {
            return;
        }
        let out = TokioCommandRunner
            .run("cat", &[], Some(b"receipt"))
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "receipt");
    }
}
