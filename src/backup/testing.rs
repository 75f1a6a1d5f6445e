//! Test doubles for the collaborators the pipeline is wired with.

use crate::backup::command::{CommandInvocation, CommandOutput, CommandRunner};
use crate::backup::database::{DatabaseConnector, TableLister};
use crate::backup::dependency::{DependencyInfo, DependencyProbe, DependencyReport, REQUIRED_TOOLS};
use crate::backup::heartbeat::{HeartbeatEvent, HeartbeatNotifier};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::run_config::{DatabaseConfig, RunConfigOverrides};
use std::cell::{Cell, RefCell};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub(crate) static RECIPIENT: &str =
    "age1ql3z7hjy54pw3hyww5ayyfg7zqgvc7w3j2elw8zmrj2kg5sfn9aqmcac8p";

pub(crate) static START_URL: &str = "https://hc.example.com/ping/start";
pub(crate) static FINISH_URL: &str = "https://hc.example.com/ping/finish";
pub(crate) static FAIL_URL: &str = "https://hc.example.com/ping/fail";

/// A complete set of flags for database `shop` and bucket `my-bucket`.
pub(crate) fn overrides(work_dir: &Path) -> RunConfigOverrides {
    RunConfigOverrides {
        db_host: Some("db.internal".into()),
        db_password: Some("db-pa55".into()),
        db_database: Some("shop".into()),
        encryption_key: Some(RECIPIENT.into()),
        heartbeat_start: Some(START_URL.into()),
        heartbeat_finish: Some(FINISH_URL.into()),
        heartbeat_fail: Some(FAIL_URL.into()),
        s3_access_key: Some("AKIA123".into()),
        s3_secret_key: Some("s3cr3t".into()),
        s3_region: Some("us-east-1".into()),
        s3_bucket: Some("my-bucket".into()),
        work_dir: Some(work_dir.to_path_buf()),
        ..Default::default()
    }
}

/// Reverses `escape_arg`.
fn unescape_arg(token: &str) -> String {
    token
        .trim_start_matches('\'')
        .trim_end_matches('\'')
        .replace("'\\''", "'")
}

/// The file a stage command writes: the target of `> path` or `-o path`.
pub(crate) fn output_of(invocation: &CommandInvocation) -> Option<PathBuf> {
    invocation.tokens().iter().find_map(|t| {
        t.strip_prefix("> ")
            .or_else(|| t.strip_prefix("-o "))
            .map(|p| PathBuf::from(unescape_arg(p)))
    })
}

/// Pretends to be every external tool. Each command "succeeds" by writing
/// `output_size` bytes to its output file, unless its program is set to fail.
pub(crate) struct FakeRunner {
    pub(crate) logged: RefCell<Vec<String>>,
    pub(crate) output_size: usize,
    pub(crate) fail: Option<(&'static str, Vec<String>)>,
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self {
            logged: RefCell::default(),
            output_size: 64,
            fail: None,
        }
    }
}

impl FakeRunner {
    pub(crate) fn failing(program: &'static str, output: &[&str]) -> Self {
        Self {
            fail: Some((program, output.iter().map(|l| l.to_string()).collect())),
            ..Default::default()
        }
    }

    pub(crate) fn programs(&self) -> Vec<String> {
        self.logged
            .borrow()
            .iter()
            .filter_map(|l| {
                l.split(' ')
                    .find(|t| !t.contains('='))
                    .map(str::to_string)
            })
            .collect()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput> {
        self.logged.borrow_mut().push(invocation.redacted());

        // Tools may leave partial output behind before failing.
        if let Some(path) = output_of(invocation) {
            std::fs::write(&path, vec![b'x'; self.output_size])?;
        }

        match &self.fail {
            Some((program, lines)) if invocation.program() == *program => Ok(CommandOutput {
                exit_code: 1,
                lines: lines.clone(),
            }),
            _ => Ok(CommandOutput::default()),
        }
    }
}

/// Reports every required tool as installed except `missing`.
#[derive(Default)]
pub(crate) struct FakeProbe {
    pub(crate) missing: Vec<&'static str>,
}

impl DependencyProbe for FakeProbe {
    fn probe(&self) -> Result<DependencyReport> {
        Ok(REQUIRED_TOOLS
            .iter()
            .map(|tool| {
                let info = if self.missing.contains(&tool.name) {
                    DependencyInfo::missing()
                } else {
                    DependencyInfo::found(format!("/usr/bin/{}", tool.name), Some("1.0".into()))
                };
                (tool.name.to_string(), info)
            })
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct FakeConnector {
    pub(crate) tables: Vec<String>,
    pub(crate) refuse: bool,
    pub(crate) connects: Cell<usize>,
}

impl FakeConnector {
    pub(crate) fn with_tables(tables: &[&str]) -> Self {
        Self {
            tables: tables.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }
}

impl DatabaseConnector for FakeConnector {
    fn connect(&self, _config: &DatabaseConfig) -> Result<Box<dyn TableLister>> {
        self.connects.set(self.connects.get() + 1);
        if self.refuse {
            return Err(Error::database_connection("Access denied for user 'root'"));
        }
        Ok(Box::new(FakeLister(self.tables.clone())))
    }
}

struct FakeLister(Vec<String>);

impl TableLister for FakeLister {
    fn list_tables(&mut self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// Records every notification instead of sending it.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) sent: RefCell<Vec<(Option<String>, HeartbeatEvent)>>,
}

impl RecordingNotifier {
    pub(crate) fn events(&self) -> Vec<HeartbeatEvent> {
        self.sent.borrow().iter().map(|(_, e)| e.clone()).collect()
    }
}

impl HeartbeatNotifier for RecordingNotifier {
    fn notify(&self, url: Option<&str>, event: &HeartbeatEvent) {
        self.sent
            .borrow_mut()
            .push((url.map(str::to_string), event.clone()));
    }
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a debug-level subscriber on this thread and returns what it logged.
pub(crate) fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let out = tracing::subscriber::with_default(subscriber, f);
    let logged = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    (out, logged)
}
