//! # hl-backup
//!
//! Exports a MySQL database to object storage as a single encrypted file.
//!
//! ## Features
//!
//! - **Consistent dumps**: `mysqldump` in single-transaction mode
//! - **Table filters**: allowlist and blocklist
//! - **Compression**: XZ, level 0-9
//! - **Encryption**: age, to a recipient public key
//! - **Upload**: any S3-compatible provider through `s5cmd`
//! - **Heartbeats**: start/finish/fail webhooks for uptime monitors
//!
//! No temporary file outlives a run, whether it succeeds or fails.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hl_backup::backup::command::ShellCommandRunner;
//! use hl_backup::backup::database::MysqlConnector;
//! use hl_backup::backup::dependency::ShellDependencyProbe;
//! use hl_backup::backup::heartbeat::HttpHeartbeat;
//! use hl_backup::backup::pipeline::Pipeline;
//! use hl_backup::backup::run_config::{RunConfig, RunConfigOverrides};
//! use std::path::Path;
//!
//! let config = RunConfig::load(Some(Path::new("config.yml")), RunConfigOverrides::default())?;
//! let runner = ShellCommandRunner;
//!
//! let url = Pipeline::builder()
//!     .config(&config)
//!     .runner(&runner)
//!     .probe(&ShellDependencyProbe::new(&runner))
//!     .connector(&MysqlConnector)
//!     .notifier(&HttpHeartbeat::default())
//!     .build()
//!     .run()?;
//! println!("{url}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
