//! Configuration for a single dump run.
//!
//! A [`RunConfig`] is assembled once per invocation from an optional YAML file
//! and the command line flags (flags win), normalised, validated and then
//! only ever read.

use crate::backup::redacted::RedactedString;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use crate::backup::validate::{validate_age_recipient, validate_not_blank, validate_writable_dir};
use bon::Builder;
use clap::Args;
use getset::Getters;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fs::File;
use std::path::{Path, PathBuf};
use validator::Validate;

pub static DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3306;
pub static DEFAULT_USERNAME: &str = "root";
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 6;
pub static DEFAULT_FILE_NAME: &str =
    "export-{{db-database}}-{{YYYY}}{{MM}}{{DD}}-{{hh}}{{mm}}{{ss}}.sql.xz.age";

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_username() -> String {
    DEFAULT_USERNAME.to_string()
}

fn default_file_name() -> String {
    DEFAULT_FILE_NAME.to_string()
}

#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(default, deny_unknown_fields)]
#[getset(get = "pub")]
pub struct RunConfig {
    #[validate(nested)]
    #[builder(default)]
    database: DatabaseConfig,
    #[builder(default)]
    tables: TableFilterConfig,
    /// 0-9; anything else falls back to the default level when compressing
    #[builder(default = DEFAULT_COMPRESSION_LEVEL)]
    compression_level: i32,
    /// age recipient (public key) the dump is encrypted to
    #[validate(custom(function = validate_age_recipient))]
    #[builder(default, into)]
    encryption_key: String,
    #[validate(nested)]
    #[builder(default)]
    heartbeat: HeartbeatConfig,
    #[validate(nested)]
    #[builder(default)]
    s3: S3Config,
    /// Where temporary artifacts are created, the system temp dir if unset
    #[validate(custom(function = validate_writable_dir))]
    #[builder(into)]
    work_dir: Option<PathBuf>,
    #[builder(default)]
    dry_run: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(default, deny_unknown_fields)]
#[getset(get = "pub")]
pub struct DatabaseConfig {
    #[validate(length(min = 1, message = "db-host must have a value"))]
    #[builder(default = default_host(), into)]
    host: String,
    #[builder(default = DEFAULT_PORT)]
    port: u16,
    #[builder(default = default_username(), into)]
    username: String,
    #[builder(default, into)]
    password: RedactedString,
    #[validate(length(min = 1, message = "db-database is required"))]
    #[builder(default, into)]
    database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Builder, Getters)]
#[serde(default, deny_unknown_fields)]
#[getset(get = "pub")]
pub struct TableFilterConfig {
    #[builder(default, into)]
    allowlist: Vec<String>,
    #[builder(default, into)]
    blocklist: Vec<String>,
}

impl TableFilterConfig {
    fn normalize(&mut self) {
        normalize_list(&mut self.allowlist);
        normalize_list(&mut self.blocklist);
    }
}

/// Trims entries, drops empty ones and duplicates, keeps first occurrence order.
fn normalize_list(list: &mut Vec<String>) {
    *list = list
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .unique()
        .map(str::to_string)
        .collect_vec();
}

#[skip_serializing_none]
#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(default, deny_unknown_fields)]
#[getset(get = "pub")]
pub struct HeartbeatConfig {
    #[validate(url)]
    #[builder(into)]
    start: Option<String>,
    #[validate(url)]
    #[builder(into)]
    finish: Option<String>,
    #[validate(url)]
    #[builder(into)]
    fail: Option<String>,
}

impl HeartbeatConfig {
    fn normalize(&mut self) {
        for url in [&mut self.start, &mut self.finish, &mut self.fail] {
            if url.as_deref().is_some_and(|u| u.trim().is_empty()) {
                *url = None;
            }
        }
    }
}

#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(default, deny_unknown_fields)]
#[getset(get = "pub")]
pub struct S3Config {
    #[validate(custom(function = validate_not_blank))]
    #[builder(default, into)]
    access_key: RedactedString,
    #[validate(custom(function = validate_not_blank))]
    #[builder(default, into)]
    secret_key: RedactedString,
    /// Custom endpoint for S3-compatible providers
    #[validate(url)]
    #[builder(into)]
    endpoint: Option<String>,
    #[builder(into)]
    region: Option<String>,
    #[validate(length(min = 1, message = "s3-bucket is required"))]
    #[builder(default, into)]
    bucket: String,
    /// Destination key template, see `file_name`
    #[validate(length(min = 1, message = "s3-file-name must have a value"))]
    #[builder(default = default_file_name(), into)]
    file_name: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl S3Config {
    fn normalize(&mut self) {
        for opt in [&mut self.endpoint, &mut self.region] {
            if opt.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *opt = None;
            }
        }
    }
}

/// Command line overrides, every flag maps onto one [`RunConfig`] field.
#[derive(Args, Debug, Default, Clone)]
pub struct RunConfigOverrides {
    /// The database host e.g. localhost, 127.0.0.1, /var/run/mysqld/mysqld.sock, db.host.tld [default: localhost]
    #[arg(long)]
    pub db_host: Option<String>,
    /// The database port [default: 3306]
    #[arg(long)]
    pub db_port: Option<u16>,
    /// The database username [default: root]
    #[arg(long)]
    pub db_username: Option<String>,
    /// The database password
    #[arg(long)]
    pub db_password: Option<String>,
    /// The database to export
    #[arg(long)]
    pub db_database: Option<String>,
    /// A comma-separated list of tables to export
    #[arg(long, value_delimiter = ',')]
    pub db_tables_allowlist: Option<Vec<String>>,
    /// A comma-separated list of tables to skip
    #[arg(long, value_delimiter = ',')]
    pub db_tables_blocklist: Option<Vec<String>>,
    /// Compression level from 0 to 9 [default: 6]
    #[arg(long, allow_negative_numbers = true)]
    pub compression_level: Option<i32>,
    /// The age public key to encrypt the file with
    #[arg(long)]
    pub encryption_key: Option<String>,
    /// A URL to POST to when starting an export
    #[arg(long)]
    pub heartbeat_start: Option<String>,
    /// A URL to POST to when an export finishes
    #[arg(long)]
    pub heartbeat_finish: Option<String>,
    /// A URL to POST to when an export fails
    #[arg(long)]
    pub heartbeat_fail: Option<String>,
    /// S3 access key
    #[arg(long)]
    pub s3_access_key: Option<String>,
    /// S3 secret key
    #[arg(long)]
    pub s3_secret_key: Option<String>,
    /// S3 endpoint e.g. https://s3.us-west-001.backblazeb2.com to use Backblaze B2
    #[arg(long)]
    pub s3_endpoint: Option<String>,
    /// S3 region
    #[arg(long)]
    pub s3_region: Option<String>,
    /// S3 bucket
    #[arg(long)]
    pub s3_bucket: Option<String>,
    /// The destination filename for S3. Can include directories and substitutions
    #[arg(long)]
    pub s3_file_name: Option<String>,
    /// Directory for temporary files [default: system temp dir]
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
    /// If set, perform the export but don't upload
    #[arg(long)]
    pub dry_run: bool,
}

impl RunConfig {
    /// Reads a YAML config file. The result is not validated yet.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<RunConfig> {
        let path = path.as_ref();
        File::open(path)
            .map_err(Error::from)
            .and_then(|f| serde_yml::from_reader::<_, RunConfig>(f).map_err(Error::from))
            .add_msg(format!("Parse YAML config failed: {:?}", path))
    }

    /// Builds the final, validated configuration for a run.
    pub fn load(config_file: Option<&Path>, overrides: RunConfigOverrides) -> Result<RunConfig> {
        let mut config = match config_file {
            Some(path) => Self::from_yaml_file(path)?,
            None => RunConfig::default(),
        };
        config.apply(overrides);
        config.finalize()
    }

    fn apply(&mut self, o: RunConfigOverrides) {
        fn set<T>(target: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *target = v;
            }
        }

        set(&mut self.database.host, o.db_host);
        set(&mut self.database.port, o.db_port);
        set(&mut self.database.username, o.db_username);
        set(&mut self.database.password, o.db_password.map(RedactedString::from));
        set(&mut self.database.database, o.db_database);
        set(&mut self.tables.allowlist, o.db_tables_allowlist);
        set(&mut self.tables.blocklist, o.db_tables_blocklist);
        set(&mut self.compression_level, o.compression_level);
        set(&mut self.encryption_key, o.encryption_key);
        set(&mut self.heartbeat.start, o.heartbeat_start.map(Some));
        set(&mut self.heartbeat.finish, o.heartbeat_finish.map(Some));
        set(&mut self.heartbeat.fail, o.heartbeat_fail.map(Some));
        set(&mut self.s3.access_key, o.s3_access_key.map(RedactedString::from));
        set(&mut self.s3.secret_key, o.s3_secret_key.map(RedactedString::from));
        set(&mut self.s3.endpoint, o.s3_endpoint.map(Some));
        set(&mut self.s3.region, o.s3_region.map(Some));
        set(&mut self.s3.bucket, o.s3_bucket);
        set(&mut self.s3.file_name, o.s3_file_name);
        set(&mut self.work_dir, o.work_dir.map(Some));
        self.dry_run |= o.dry_run;
    }

    /// Normalises list and optional values, then validates.
    pub fn finalize(mut self) -> Result<RunConfig> {
        self.encryption_key = self.encryption_key.trim().to_string();
        self.tables.normalize();
        self.heartbeat.normalize();
        self.s3.normalize();
        self.validate().map_err(Error::from)?;
        if self.s3.file_name.trim_start_matches('/').is_empty() {
            return Err(Error::configuration(format!(
                "s3-file-name {:?} does not name an object",
                self.s3.file_name
            )));
        }
        Ok(self)
    }

    /// The directory temporary artifacts are created in.
    pub fn artifact_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
