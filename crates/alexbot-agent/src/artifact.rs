//! Files produced by tool calls.

use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;

use alexbot_core::config::BehaviorConfig;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const FALLBACK_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Image,
    Audio,
    Document,
}

/// A file written to the output directory, ready to be attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

impl Artifact {
    /// Bare file name, as shown to the model and to chat users.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Writes artifacts as `{output_dir}/{timestamp}.{ext}`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
    timestamp_format: String,
}

impl ArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>, timestamp_format: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            timestamp_format: timestamp_format.into(),
        }
    }

    pub fn from_config(config: &BehaviorConfig) -> Self {
        Self::new(&config.output_dir, &config.timestamp_format)
    }

    /// Write `bytes` to a fresh file, creating the output directory on demand.
    ///
    /// The file is opened with `create_new`, so two turns finishing in the
    /// same second still get distinct names.
    pub async fn write(
        &self,
        kind: ArtifactKind,
        extension: &str,
        bytes: &[u8],
    ) -> io::Result<Artifact> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let stem = self.timestamp();
        let mut suffix = 0u32;
        let (path, mut file) = loop {
            let path = self.candidate(&stem, suffix, extension);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(e),
            }
        };

        file.write_all(bytes).await?;
        file.flush().await?;

        debug!(path = %path.display(), bytes = bytes.len(), ?kind, "artifact written");
        Ok(Artifact { path, kind })
    }

    fn candidate(&self, stem: &str, suffix: u32, extension: &str) -> PathBuf {
        let name = if suffix == 0 {
            format!("{stem}.{extension}")
        } else {
            format!("{stem}-{suffix}.{extension}")
        };
        self.output_dir.join(name)
    }

    fn timestamp(&self) -> String {
        let now = chrono::Local::now();
        let mut out = String::new();
        if write!(out, "{}", now.format(&self.timestamp_format)).is_err() {
            warn!(format = %self.timestamp_format, "invalid timestamp format, using default");
            out = now.format(FALLBACK_TIMESTAMP_FORMAT).to_string();
        }
        out.replace(['/', '\\'], "-")
    }
}
