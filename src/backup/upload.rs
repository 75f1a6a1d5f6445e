use crate::backup::command::{escape_arg, CommandInvocation};
use crate::backup::run_config::S3Config;
use std::path::Path;

static S5CMD_BIN: &str = "s5cmd";

/// Copies the final artifact to object storage with `s5cmd`.
///
/// Credentials are passed as environment assignments in front of the command
/// and are masked in logs.
pub struct S5cmdUpload<'a> {
    s3: &'a S3Config,
}

impl<'a> S5cmdUpload<'a> {
    pub fn new(s3: &'a S3Config) -> Self {
        Self { s3 }
    }

    pub fn command(&self, input: &Path, destination: &str) -> CommandInvocation {
        let access_key = escape_arg(self.s3.access_key().inner());
        let secret_key = escape_arg(self.s3.secret_key().inner());

        let mut cmd = CommandInvocation::new(format!("AWS_ACCESS_KEY_ID={access_key}"))
            .arg(format!("AWS_SECRET_ACCESS_KEY={secret_key}"));
        if let Some(region) = self.s3.region() {
            cmd = cmd.arg(format!("AWS_REGION={}", escape_arg(region)));
        }
        cmd = cmd.arg(S5CMD_BIN);
        if let Some(endpoint) = self.s3.endpoint() {
            cmd = cmd.arg(format!("--endpoint-url={}", escape_arg(endpoint)));
        }

        cmd.arg("cp")
            .arg(escape_arg(input.to_string_lossy()))
            .arg(escape_arg(destination))
            .escaped_secret(self.s3.access_key().inner())
            .escaped_secret(self.s3.secret_key().inner())
    }
}
