//! Conversion engines: bytes in, PDF bytes out.
//!
//! The relay only knows the [`ConversionEngine`] trait. [`SofficeEngine`]
//! drives a headless LibreOffice; tests plug in an in-process stub.

use crate::config::RelayConfig;
use crate::error::EngineError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Output format requested from an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Pdf,
}

impl TargetFormat {
    /// Extension without the dot, also the `--convert-to` argument.
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Pdf => "pdf",
        }
    }
}

/// A stateless document converter.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    async fn convert(&self, input: &[u8], target: TargetFormat) -> Result<Vec<u8>, EngineError>;
}

/// Converts with `soffice --headless --convert-to <fmt>`.
///
/// Every call gets its own scratch directory and LibreOffice user profile,
/// so concurrent requests never share a profile lock.
#[derive(Debug, Clone)]
pub struct SofficeEngine {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl SofficeEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        let engine = Self::new(&config.soffice_path);
        match config.conversion_timeout_secs {
            Some(secs) => engine.with_timeout(Duration::from_secs(secs)),
            None => engine,
        }
    }

    fn command(&self, scratch: &Path, source: &Path, target: TargetFormat) -> Command {
        let profile = scratch.join("profile");
        let mut cmd = Command::new(&self.program);
        cmd.arg(format!("-env:UserInstallation=file://{}", profile.display()))
            .arg("--headless")
            .arg("--convert-to")
            .arg(target.extension())
            .arg("--outdir")
            .arg(scratch)
            .arg(source)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ConversionEngine for SofficeEngine {
    async fn convert(&self, input: &[u8], target: TargetFormat) -> Result<Vec<u8>, EngineError> {
        let scratch = tempfile::tempdir()?;
        let source = scratch.path().join("source");
        tokio::fs::write(&source, input).await?;

        let program = self.program.display().to_string();
        debug!("Running {} on {} bytes", program, input.len());

        let mut cmd = self.command(scratch.path(), &source, target);
        let run = cmd.output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| EngineError::Timeout {
                    secs: limit.as_secs(),
                })?,
            None => run.await,
        }
        .map_err(|source| EngineError::Launch {
            program,
            source,
        })?;

        if !output.status.success() {
            return Err(EngineError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let produced = scratch
            .path()
            .join(format!("source.{}", target.extension()));
        match tokio::fs::read(&produced).await {
            Ok(bytes) if !bytes.is_empty() => {
                info!("Converted {} bytes → {} bytes", input.len(), bytes.len());
                Ok(bytes)
            }
            Ok(_) => Err(EngineError::NoOutput),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(EngineError::NoOutput),
            Err(e) => Err(e.into()),
        }
    }
}
