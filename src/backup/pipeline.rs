//! The dump run: dependency check, table scan, then
//! dump → compress → encrypt → upload, with heartbeats around it.
//!
//! Every file a stage writes is registered with an [`ArtifactTracker`] before
//! the stage runs. Whatever happens, all of them are gone when [`Pipeline::run`]
//! returns; only the uploaded copy survives a successful run.

use crate::backup::artifact::{bytes_to_human, verify_artifact, ArtifactTracker};
use crate::backup::command::{CommandInvocation, CommandRunner};
use crate::backup::compress::XzCompressor;
use crate::backup::database::DatabaseConnector;
use crate::backup::dependency::{missing_dependencies, DependencyProbe};
use crate::backup::dump::MysqlDump;
use crate::backup::encrypt::AgeEncryptor;
use crate::backup::file_ext::FileExtProvider;
use crate::backup::file_name::{destination_url, render_file_name, TemplateValues};
use crate::backup::function_path;
use crate::backup::heartbeat::{HeartbeatEvent, HeartbeatNotifier};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddFunctionName;
use crate::backup::run_config::RunConfig;
use crate::backup::tables::select_tables;
use crate::backup::upload::S5cmdUpload;
use bon::Builder;
use chrono::{DateTime, Utc};
use derive_more::Display;
use function_name::named;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::Builder as TempFileBuilder;
use tracing::{debug, info, warn};

static DUMP_FILE_PREFIX: &str = "hl-mysql-export";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum Stage {
    #[display("dump")]
    Dump,
    #[display("compress")]
    Compress,
    #[display("encrypt")]
    Encrypt,
    #[display("upload")]
    Upload,
}

impl Stage {
    pub fn failure_message(&self) -> &'static str {
        match self {
            Stage::Dump => "Unable to dump database",
            Stage::Compress => "Unable to compress file",
            Stage::Encrypt => "Unable to encrypt file",
            Stage::Upload => "Unable to upload file",
        }
    }

    pub fn artifact_name(&self) -> &'static str {
        match self {
            Stage::Dump => "Dumped database",
            Stage::Compress => "Compressed",
            Stage::Encrypt => "Encrypted",
            Stage::Upload => "Uploaded",
        }
    }
}

/// Where a run is. Transitions only go forward; `Failed` can be entered from
/// any state after `HeartbeatStart`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum PipelineState {
    Init,
    HeartbeatStart,
    DependencyCheck,
    Connect,
    ScanTables,
    Dump,
    Compress,
    Encrypt,
    DryRunSkip,
    Upload,
    HeartbeatFinish,
    Done,
    Failed,
}

#[derive(Builder)]
pub struct Pipeline<'a> {
    config: &'a RunConfig,
    runner: &'a dyn CommandRunner,
    probe: &'a dyn DependencyProbe,
    connector: &'a dyn DatabaseConnector,
    notifier: &'a dyn HeartbeatNotifier,
    /// Timestamp used for file name substitutions
    #[builder(default = Utc::now())]
    started_at: DateTime<Utc>,
}

/// Mutable part of one run.
struct RunState {
    state: PipelineState,
    artifacts: ArtifactTracker,
}

impl RunState {
    fn enter(&mut self, next: PipelineState) {
        debug!("pipeline state: {} -> {}", self.state, next);
        self.state = next;
    }

    fn cleanup(&mut self) {
        if let Err(e) = self.artifacts.cleanup() {
            warn!("Failed to remove temporary files: {e}");
        }
    }
}

impl Pipeline<'_> {
    /// Runs the whole export once. Returns the destination URL, or an empty
    /// string for a dry run.
    pub fn run(&self) -> Result<String> {
        let dry_run = *self.config.dry_run();
        let heartbeat = self.config.heartbeat();
        let mut run = RunState {
            state: PipelineState::Init,
            artifacts: ArtifactTracker::new(),
        };

        if !dry_run {
            run.enter(PipelineState::HeartbeatStart);
            self.notifier
                .notify(heartbeat.start().as_deref(), &HeartbeatEvent::Start);
        }
        let timer = Instant::now();

        match self.execute(&mut run) {
            Ok(url) => {
                let time_taken_secs = timer.elapsed().as_secs_f64();
                if !dry_run {
                    run.enter(PipelineState::HeartbeatFinish);
                    self.notifier.notify(
                        heartbeat.finish().as_deref(),
                        &HeartbeatEvent::Finish {
                            time_taken_secs,
                            uploaded_url: url.clone(),
                        },
                    );
                }
                run.cleanup();
                run.enter(PipelineState::Done);
                info!("Export finished in {time_taken_secs:.4}s");
                Ok(url)
            }
            Err(e) => {
                let failed_in = run.state;
                run.enter(PipelineState::Failed);
                debug!("export failed during {failed_in}");
                run.cleanup();
                if !dry_run {
                    self.notifier.notify(
                        heartbeat.fail().as_deref(),
                        &HeartbeatEvent::Fail {
                            error: e.root().to_string(),
                        },
                    );
                }
                Err(e)
            }
        }
    }

    fn execute(&self, run: &mut RunState) -> Result<String> {
        run.enter(PipelineState::DependencyCheck);
        self.check_dependencies()?;

        run.enter(PipelineState::Connect);
        info!("Connecting to database {:?}", self.config.database().database());
        let mut lister = self.connector.connect(self.config.database())?;

        run.enter(PipelineState::ScanTables);
        let filter = self.config.tables();
        let all = lister.list_tables()?;
        drop(lister);
        let tables = select_tables(&all, filter.allowlist(), filter.blocklist())?;
        info!("Exporting {} table(s)", tables.len());

        run.enter(PipelineState::Dump);
        let dumped = self.dump(&tables, &mut run.artifacts)?;

        run.enter(PipelineState::Compress);
        let compressed = self.compress(&dumped, &mut run.artifacts)?;

        run.enter(PipelineState::Encrypt);
        let encrypted = self.encrypt(&compressed, &mut run.artifacts)?;

        if *self.config.dry_run() {
            run.enter(PipelineState::DryRunSkip);
            info!("Dry run, skipping upload of {:?}", encrypted);
            return Ok(String::new());
        }

        run.enter(PipelineState::Upload);
        self.upload(&encrypted)
    }

    fn check_dependencies(&self) -> Result<()> {
        let missing = missing_dependencies(&self.probe.probe()?);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::dependency_missing(missing))
        }
    }

    #[named]
    fn dump(&self, tables: &[String], artifacts: &mut ArtifactTracker) -> Result<PathBuf> {
        let output = TempFileBuilder::new()
            .prefix(DUMP_FILE_PREFIX)
            .keep(true)
            .tempfile_in(self.config.artifact_dir())
            .map_err(Error::from)
            .add_fn_name(function_path!())?
            .path()
            .to_path_buf();
        artifacts.register(&output);

        info!("Dumping database to {:?}", output);
        let cmd = MysqlDump::new(self.config.database()).command(tables, &output);
        self.run_stage(Stage::Dump, &cmd, &output)
            .add_fn_name(function_path!())?;
        Ok(output)
    }

    #[named]
    fn compress(&self, input: &Path, artifacts: &mut ArtifactTracker) -> Result<PathBuf> {
        let xz = XzCompressor::new(*self.config.compression_level());
        let output = xz.output_path(input);
        artifacts.register(&output);

        info!("Compressing {:?} at level {}", input, xz.level());
        self.run_stage(Stage::Compress, &xz.command(input, &output), &output)
            .add_fn_name(function_path!())?;
        Ok(output)
    }

    #[named]
    fn encrypt(&self, input: &Path, artifacts: &mut ArtifactTracker) -> Result<PathBuf> {
        let age = AgeEncryptor::new(self.config.encryption_key());
        let output = age.output_path(input);
        artifacts.register(&output);

        info!("Encrypting {:?}", input);
        self.run_stage(Stage::Encrypt, &age.command(input, &output), &output)
            .add_fn_name(function_path!())?;
        Ok(output)
    }

    #[named]
    fn upload(&self, input: &Path) -> Result<String> {
        let s3 = self.config.s3();
        let values = TemplateValues::new(self.config.database(), self.started_at);
        let url = destination_url(s3.bucket(), &render_file_name(s3.file_name(), &values));

        info!("Uploading to {url}");
        let out = self
            .runner
            .run(&S5cmdUpload::new(s3).command(input, &url))
            .add_fn_name(function_path!())?;
        if !out.success() {
            return Err(Error::stage_execution(Stage::Upload, out.lines))
                .add_fn_name(function_path!());
        }
        Ok(url)
    }

    /// Runs a file-producing stage and checks what it wrote.
    fn run_stage(&self, stage: Stage, cmd: &CommandInvocation, output: &Path) -> Result<()> {
        let out = self.runner.run(cmd)?;
        if !out.success() {
            return Err(Error::stage_execution(stage, out.lines));
        }

        let size = verify_artifact(stage, output)?;
        info!("  {} output: {}", stage.artifact_name(), bytes_to_human(size));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::artifact::ArtifactProblem;
    use crate::backup::run_config::RunConfigOverrides;
    use crate::backup::tables::TableSelectionError;
    use crate::backup::testing::{
        overrides, with_captured_logs, FakeConnector, FakeProbe, FakeRunner, RecordingNotifier,
        FAIL_URL, FINISH_URL, RECIPIENT, START_URL,
    };
    use chrono::TimeZone;
    use std::fs;

    struct Harness {
        dir: tempfile::TempDir,
        runner: FakeRunner,
        probe: FakeProbe,
        connector: FakeConnector,
        notifier: RecordingNotifier,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                runner: FakeRunner::default(),
                probe: FakeProbe::default(),
                connector: FakeConnector::with_tables(&["users", "orders", "sessions"]),
                notifier: RecordingNotifier::default(),
            }
        }

        fn overrides(&self) -> RunConfigOverrides {
            overrides(self.dir.path())
        }

        fn run(&self, overrides: RunConfigOverrides) -> Result<String> {
            let config = RunConfig::load(None, overrides).unwrap();
            Pipeline::builder()
                .config(&config)
                .runner(&self.runner)
                .probe(&self.probe)
                .connector(&self.connector)
                .notifier(&self.notifier)
                .started_at(Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap())
                .build()
                .run()
        }

        fn leftover_files(&self) -> usize {
            fs::read_dir(self.dir.path()).unwrap().count()
        }
    }

    #[test]
    fn test_successful_run_uploads_and_reports_finish() {
        let h = Harness::new();
        let overrides = RunConfigOverrides {
            db_tables_allowlist: Some(vec!["users".into()]),
            ..h.overrides()
        };

        let url = h.run(overrides).unwrap();

        assert_eq!(url, "s3://my-bucket/export-shop-20240305-120000.sql.xz.age");
        assert_eq!(h.runner.programs(), vec!["mysqldump", "xz", "age", "s5cmd"]);
        let dump = h.runner.logged.borrow()[0].clone();
        assert!(dump.contains("'shop' 'users' > '"));
        assert!(dump.contains(DUMP_FILE_PREFIX));
        assert!(!dump.contains("db-pa55"));

        let sent = h.notifier.sent.borrow();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], (Some(START_URL.to_string()), HeartbeatEvent::Start));
        let (finish_url, finish) = &sent[1];
        assert_eq!(finish_url.as_deref(), Some(FINISH_URL));
        match finish {
            HeartbeatEvent::Finish {
                time_taken_secs,
                uploaded_url,
            } => {
                assert!(time_taken_secs.is_finite() && *time_taken_secs >= 0.0);
                assert_eq!(uploaded_url, &url);
            }
            other => panic!("expected finish heartbeat, got {other:?}"),
        }

        assert_eq!(h.leftover_files(), 0);
    }

    #[test]
    fn test_encrypt_failure_cleans_up_and_reports_fail() {
        let h = Harness {
            runner: FakeRunner::failing("age", &["age: error: invalid recipient"]),
            ..Harness::new()
        };

        let err = h.run(h.overrides()).unwrap_err();

        assert!(matches!(
            err.root(),
            Error::StageExecution {
                stage: Stage::Encrypt,
                ..
            }
        ));
        assert!(err
            .to_string()
            .contains("Unable to encrypt file: age: error: invalid recipient"));
        assert_eq!(h.runner.programs(), vec!["mysqldump", "xz", "age"]);
        assert_eq!(h.leftover_files(), 0);

        let sent = h.notifier.sent.borrow();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[1],
            (
                Some(FAIL_URL.to_string()),
                HeartbeatEvent::Fail {
                    error: "Unable to encrypt file: age: error: invalid recipient".into()
                }
            )
        );
    }

    #[test]
    fn test_upload_failure_cleans_up_final_artifact() {
        let h = Harness {
            runner: FakeRunner::failing("s5cmd", &["ERROR \"cp\": access denied"]),
            ..Harness::new()
        };

        let err = h.run(h.overrides()).unwrap_err();

        assert!(err.to_string().contains("Unable to upload file: ERROR"));
        assert_eq!(h.leftover_files(), 0);
        assert!(matches!(
            h.notifier.events().last(),
            Some(HeartbeatEvent::Fail { .. })
        ));
    }

    #[test]
    fn test_dry_run_skips_upload_and_heartbeats() {
        let h = Harness::new();
        let overrides = RunConfigOverrides {
            dry_run: true,
            ..h.overrides()
        };

        let url = h.run(overrides).unwrap();

        assert_eq!(url, "");
        assert_eq!(h.runner.programs(), vec!["mysqldump", "xz", "age"]);
        assert!(h.notifier.events().is_empty());
        assert_eq!(h.leftover_files(), 0);
    }

    #[test]
    fn test_dry_run_never_enters_heartbeat_states() {
        let h = Harness::new();
        let overrides = RunConfigOverrides {
            dry_run: true,
            ..h.overrides()
        };

        let (url, logged) = with_captured_logs(|| h.run(overrides));

        assert_eq!(url.unwrap(), "");
        assert!(logged.contains("pipeline state: DryRunSkip -> Done"));
        assert!(!logged.contains("HeartbeatStart"));
        assert!(!logged.contains("HeartbeatFinish"));
    }

    /// Takes its time answering the start heartbeat.
    #[derive(Default)]
    struct SlowStartNotifier {
        inner: RecordingNotifier,
    }

    impl HeartbeatNotifier for SlowStartNotifier {
        fn notify(&self, url: Option<&str>, event: &HeartbeatEvent) {
            if *event == HeartbeatEvent::Start {
                std::thread::sleep(std::time::Duration::from_millis(500));
            }
            self.inner.notify(url, event);
        }
    }

    #[test]
    fn test_time_taken_excludes_start_heartbeat() {
        let h = Harness::new();
        let notifier = SlowStartNotifier::default();
        let config = RunConfig::load(None, h.overrides()).unwrap();

        Pipeline::builder()
            .config(&config)
            .runner(&h.runner)
            .probe(&h.probe)
            .connector(&h.connector)
            .notifier(&notifier)
            .build()
            .run()
            .unwrap();

        match notifier.inner.events().last() {
            Some(HeartbeatEvent::Finish {
                time_taken_secs, ..
            }) => assert!(*time_taken_secs < 0.5, "took {time_taken_secs}"),
            other => panic!("expected finish heartbeat, got {other:?}"),
        }
    }

    #[test]
    fn test_dry_run_failure_sends_no_heartbeat() {
        let h = Harness {
            runner: FakeRunner::failing("xz", &["xz: out of memory"]),
            ..Harness::new()
        };
        let overrides = RunConfigOverrides {
            dry_run: true,
            ..h.overrides()
        };

        assert!(h.run(overrides).is_err());
        assert!(h.notifier.events().is_empty());
        assert_eq!(h.leftover_files(), 0);
    }

    #[test]
    fn test_missing_dependencies_fail_before_connecting() {
        let h = Harness {
            probe: FakeProbe {
                missing: vec!["s5cmd", "age"],
            },
            ..Harness::new()
        };

        let err = h.run(h.overrides()).unwrap_err();

        assert_eq!(err.to_string(), "Missing dependencies: age, s5cmd");
        assert_eq!(h.connector.connects.get(), 0);
        assert!(h.runner.programs().is_empty());
        assert_eq!(
            h.notifier.events(),
            vec![
                HeartbeatEvent::Start,
                HeartbeatEvent::Fail {
                    error: "Missing dependencies: age, s5cmd".into()
                }
            ]
        );
    }

    #[test]
    fn test_connection_failure_is_reported() {
        let h = Harness {
            connector: FakeConnector {
                refuse: true,
                ..Default::default()
            },
            ..Harness::new()
        };

        let err = h.run(h.overrides()).unwrap_err();

        assert!(matches!(err, Error::DatabaseConnection(_)));
        assert!(h.runner.programs().is_empty());
        assert_eq!(h.notifier.events().len(), 2);
    }

    #[test]
    fn test_table_selection_errors_stop_the_run() {
        let h = Harness {
            connector: FakeConnector::with_tables(&[]),
            ..Harness::new()
        };
        let err = h.run(h.overrides()).unwrap_err();
        assert!(matches!(
            err,
            Error::TableSelection(TableSelectionError::NoTablesFound)
        ));

        let h = Harness::new();
        let overrides = RunConfigOverrides {
            db_tables_allowlist: Some(vec!["users".into(), "ghosts".into()]),
            ..h.overrides()
        };
        let err = h.run(overrides).unwrap_err();
        assert_eq!(err.to_string(), "Required allowlist tables not found: ghosts");

        let h = Harness::new();
        let overrides = RunConfigOverrides {
            db_tables_blocklist: Some(vec!["users".into(), "orders".into(), "sessions".into()]),
            ..h.overrides()
        };
        let err = h.run(overrides).unwrap_err();
        assert_eq!(err.to_string(), "No tables found to export after filtering.");
        assert!(h.runner.programs().is_empty());
    }

    #[test]
    fn test_blocklist_removes_tables_from_dump() {
        let h = Harness::new();
        let overrides = RunConfigOverrides {
            db_tables_blocklist: Some(vec!["sessions".into()]),
            ..h.overrides()
        };

        h.run(overrides).unwrap();

        let dump = h.runner.logged.borrow()[0].clone();
        assert!(dump.contains("'shop' 'users' 'orders' > "));
        assert!(!dump.contains("'sessions'"));
    }

    #[test]
    fn test_undersized_artifact_is_rejected() {
        let h = Harness {
            runner: FakeRunner {
                output_size: 10,
                ..Default::default()
            },
            ..Harness::new()
        };

        let err = h.run(h.overrides()).unwrap_err();

        assert!(matches!(
            err.root(),
            Error::ArtifactIntegrity {
                stage: Stage::Dump,
                problem: ArtifactProblem::TooSmall { size: 10 },
                ..
            }
        ));
        assert_eq!(h.runner.programs(), vec!["mysqldump"]);
        assert_eq!(h.leftover_files(), 0);
    }

    #[test]
    fn test_secrets_never_reach_command_logs() {
        let h = Harness::new();
        h.run(h.overrides()).unwrap();

        for line in h.runner.logged.borrow().iter() {
            assert!(!line.contains("db-pa55"));
            assert!(!line.contains("s3cr3t"));
            assert!(!line.contains("AKIA123"));
            assert!(!line.contains(RECIPIENT));
        }
    }

    #[test]
    fn test_stage_messages() {
        assert_eq!(Stage::Dump.failure_message(), "Unable to dump database");
        assert_eq!(Stage::Upload.failure_message(), "Unable to upload file");
        assert_eq!(Stage::Encrypt.to_string(), "encrypt");
        assert_eq!(PipelineState::DryRunSkip.to_string(), "DryRunSkip");
    }
}
