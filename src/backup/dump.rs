use crate::backup::command::{escape_arg, CommandInvocation};
use crate::backup::run_config::DatabaseConfig;
use std::path::Path;

static MYSQLDUMP_BIN: &str = "mysqldump";

/// Flags for a consistent, restorable logical dump.
static MYSQLDUMP_FLAGS: &[&str] = &[
    "--add-drop-table",
    "--add-locks",
    "--allow-keywords",
    "--compress",
    "--create-options",
    "--disable-keys",
    "--extended-insert",
    "--max_allowed_packet=512M",
    "--no-tablespaces",
    "--quick",
    "--set-charset",
    // consistent snapshot without locking every table
    "--single-transaction",
];

/// Logical dump through `mysqldump`, written to a file via shell redirection.
pub struct MysqlDump<'a> {
    database: &'a DatabaseConfig,
}

impl<'a> MysqlDump<'a> {
    pub fn new(database: &'a DatabaseConfig) -> Self {
        Self { database }
    }

    pub fn command<S: AsRef<str>>(&self, tables: &[S], output: &Path) -> CommandInvocation {
        let db = self.database;
        let password = escape_arg(db.password().inner());

        CommandInvocation::new(MYSQLDUMP_BIN)
            .args(MYSQLDUMP_FLAGS.iter().copied())
            .arg(format!("--host={}", escape_arg(db.host())))
            .arg(format!("--port={}", escape_arg(db.port().to_string())))
            .arg(format!("--user={}", escape_arg(db.username())))
            .arg(format!("--password={password}"))
            .arg(escape_arg(db.database()))
            .args(tables.iter().map(escape_arg))
            .arg(format!("> {}", escape_arg(output.to_string_lossy())))
            .escaped_secret(db.password().inner())
    }
}
