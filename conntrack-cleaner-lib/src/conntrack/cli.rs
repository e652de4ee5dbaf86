use std::future::Future;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::trace;

use super::key::ConnKey;
use crate::config::ConntrackConfig;

/// Marker conntrack prints on entries whose peer never answered.
pub const UNREPLIED_MARKER: &str = "UNREPLIED";

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("{program} exited with {status}: {stderr}")]
    Failed { program: String, status: ExitStatus, stderr: String },
}

/// Source of raw connection-tracking table dumps.
pub trait TableSampler: Send + Sync {
    /// Return the current unanswered entries, one per line.
    fn sample(&self) -> impl Future<Output = Result<String, CommandError>> + Send;
}

/// Removes one entry from the kernel connection-tracking table.
pub trait DeletionExecutor: Send + Sync {
    fn delete(&self, key: &ConnKey) -> impl Future<Output = Result<(), CommandError>> + Send;
}

/// Talks to the kernel table through the `conntrack` tool.
#[derive(Debug, Clone)]
pub struct ConntrackCli {
    binary: PathBuf,
    timeout: Duration,
}

impl ConntrackCli {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self { binary: binary.into(), timeout }
    }

    pub fn from_config(config: &ConntrackConfig) -> Self {
        Self::new(config.binary.clone(), Duration::from_millis(config.command_timeout_ms))
    }

    fn program(&self) -> String {
        self.binary.display().to_string()
    }

    async fn run(&self, args: &[String]) -> Result<Vec<u8>, CommandError> {
        trace!(program = %self.program(), ?args, "running conntrack");

        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = timeout(self.timeout, child)
            .await
            .map_err(|_| CommandError::Timeout { program: self.program(), timeout: self.timeout })?
            .map_err(|source| CommandError::Spawn { program: self.program(), source })?;

        if !output.status.success() {
            return Err(CommandError::Failed {
                program: self.program(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

impl TableSampler for ConntrackCli {
    async fn sample(&self) -> Result<String, CommandError> {
        let stdout = self.run(&["-L".to_string()]).await?;
        Ok(filter_unreplied(&String::from_utf8_lossy(&stdout)))
    }
}

impl DeletionExecutor for ConntrackCli {
    async fn delete(&self, key: &ConnKey) -> Result<(), CommandError> {
        self.run(&delete_args(key)).await.map(|_| ())
    }
}

/// Keep only the lines of a table dump that are still waiting for a reply.
pub fn filter_unreplied(table: &str) -> String {
    table
        .lines()
        .filter(|line| line.contains(UNREPLIED_MARKER))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Arguments for `conntrack -D` matching exactly one original-direction tuple.
pub fn delete_args(key: &ConnKey) -> Vec<String> {
    let mut args = vec!["-D".to_string()];
    if matches!(key.src, IpAddr::V6(_)) {
        args.extend(["-f".to_string(), "ipv6".to_string()]);
    }
    args.extend([
        "-p".to_string(),
        key.protocol.to_string(),
        "-s".to_string(),
        key.src.to_string(),
        "-d".to_string(),
        key.dst.to_string(),
        "--sport".to_string(),
        key.sport.to_string(),
        "--dport".to_string(),
        key.dport.to_string(),
    ]);
    args
}
