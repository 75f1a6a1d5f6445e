//! Ownership of the temporary files produced during a run.
//!
//! Every path is registered before anything can fail while it exists, and
//! `cleanup` removes whatever is still on disk. Cleanup also runs on drop so
//! an unwinding panic does not leak dumps of the database.

use crate::backup::pipeline::Stage;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::{convert_error_vec, Result};
use derive_more::Display;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Smallest file size a stage output can plausibly have. Anything smaller means
/// a tool exited 0 without producing usable output.
pub const MIN_ARTIFACT_SIZE: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ArtifactProblem {
    #[display("not created")]
    NotCreated,
    #[display("too small ({size} bytes)")]
    TooSmall { size: u64 },
}

#[derive(Debug, Default)]
pub struct ArtifactTracker {
    paths: Vec<PathBuf>,
}

impl ArtifactTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: Into<PathBuf>>(&mut self, path: P) {
        let path = path.into();
        debug!("  tracking temporary file: {:?}", path);
        self.paths.push(path);
    }

    /// Deletes every registered file that still exists. Missing files are
    /// fine; other failures are collected and returned together after every
    /// path has been tried.
    pub fn cleanup(&mut self) -> Result<()> {
        let errors = self
            .paths
            .iter()
            .filter_map(|path| match std::fs::remove_file(path) {
                Ok(()) => {
                    debug!("  removed temporary file: {:?}", path);
                    None
                }
                Err(e) if e.kind() == ErrorKind::NotFound => None,
                Err(e) => Some(Error::from(e)),
            })
            .collect();

        convert_error_vec(errors)
    }
}

impl Drop for ArtifactTracker {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            warn!("Failed to remove temporary files: {e}");
        }
    }
}

/// Checks that a stage produced a file of plausible size and returns its size.
pub fn verify_artifact(stage: Stage, path: &Path) -> Result<u64> {
    let size = match std::fs::metadata(path) {
        Ok(md) if md.is_file() => md.len(),
        Ok(_) => return Err(Error::artifact_integrity(stage, path, ArtifactProblem::NotCreated)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::artifact_integrity(stage, path, ArtifactProblem::NotCreated))
        }
        Err(e) => return Err(e.into()),
    };

    if size < MIN_ARTIFACT_SIZE {
        return Err(Error::artifact_integrity(
            stage,
            path,
            ArtifactProblem::TooSmall { size },
        ));
    }

    Ok(size)
}

static UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

pub fn bytes_to_human(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value > 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
