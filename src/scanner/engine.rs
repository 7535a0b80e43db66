use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{EngineScanResult, ParsedFlow, RuleEngine};

/// Runs the Lightning Flow Scanner as a child process.
///
/// The parsed flows are written to the process's stdin as a JSON array and
/// the scan results are read back from stdout.
pub struct CommandEngine {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandEngine {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }
}

#[async_trait]
impl RuleEngine for CommandEngine {
    fn name(&self) -> &'static str {
        "Flow Scanner Core"
    }

    fn is_available(&self) -> bool {
        self.program().map(is_on_path).unwrap_or(false)
    }

    async fn scan(&self, flows: &[ParsedFlow]) -> Result<Vec<EngineScanResult>> {
        let program = match self.program() {
            Some(p) => p,
            None => bail!("no rule engine command configured"),
        };
        let input = serde_json::to_vec(flows)?;

        debug!(program, args = ?&self.command[1..], "Starting rule engine");
        let mut child = Command::new(program)
            .args(&self.command[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to execute {}. Is it installed?", program))?;

        // stdin is fed while stdout and stderr drain.
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&input).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };

        let (fed, output) = tokio::time::timeout(self.timeout, async {
            tokio::join!(feed, child.wait_with_output())
        })
        .await
        .with_context(|| format!("{} timed out after {:?}", program, self.timeout))?;

        let output = output?;
        if let Err(e) = fed {
            // Engine stopped reading early.
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(e).context("Failed to write rule engine input");
            }
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} exited with {}: {}", program, output.status, stderr.trim());
        }

        serde_json::from_slice(&output.stdout).context("Failed to parse rule engine output")
    }
}

/// True if `program` is a path to an existing file or can be found on `PATH`.
fn is_on_path(program: &str) -> bool {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.is_file();
    }

    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };

    std::env::split_paths(&paths).any(|dir| {
        let candidate = dir.join(program);
        candidate.is_file()
            || (cfg!(target_os = "windows")
                && ["exe", "cmd", "bat"]
                    .iter()
                    .any(|ext| candidate.with_extension(ext).is_file()))
    })
}
