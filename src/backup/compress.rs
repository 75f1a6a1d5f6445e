use crate::backup::command::{escape_arg, CommandInvocation};
use crate::backup::file_ext::FileExtProvider;
use crate::backup::run_config::DEFAULT_COMPRESSION_LEVEL;
use std::path::Path;
use tracing::warn;

static XZ_BIN: &str = "xz";

/// XZ compression through the `xz` binary.
///
/// The input file is kept; output goes to `<input>.xz`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XzCompressor {
    /// Compression level (0-9)
    ///
    /// - 0: Fastest, largest files
    /// - 6: Default balance
    /// - 9: Slowest, smallest files
    level: u32,
}

impl XzCompressor {
    /// Levels outside 0-9 fall back to the default level.
    pub fn new(requested_level: i32) -> Self {
        let level = match u32::try_from(requested_level) {
            Ok(level) if level <= 9 => level,
            _ => {
                warn!(
                    "Compression level {requested_level} is outside 0-9, using {DEFAULT_COMPRESSION_LEVEL}"
                );
                DEFAULT_COMPRESSION_LEVEL as u32
            }
        };
        Self { level }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn command(&self, input: &Path, output: &Path) -> CommandInvocation {
        CommandInvocation::new(XZ_BIN)
            .arg("--compress")
            .arg("--keep")
            .arg("--force")
            .arg("--stdout")
            .arg(format!("-{}", self.level))
            .arg(escape_arg(input.to_string_lossy()))
            .arg(format!("> {}", escape_arg(output.to_string_lossy())))
    }
}

impl FileExtProvider for XzCompressor {
    fn file_ext(&self) -> &'static str {
        "xz"
    }
}
