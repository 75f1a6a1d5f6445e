use clap::{Args, Parser, Subcommand};
use hl_backup::backup::command::ShellCommandRunner;
use hl_backup::backup::database::MysqlConnector;
use hl_backup::backup::dependency::{DependencyProbe, ShellDependencyProbe};
use hl_backup::backup::heartbeat::HttpHeartbeat;
use hl_backup::backup::logging;
use hl_backup::backup::pipeline::Pipeline;
use hl_backup::backup::result_error::result::Result;
use hl_backup::backup::run_config::{RunConfig, RunConfigOverrides};
use std::path::PathBuf;
use std::process::exit;
use tracing::error;

/// Export a MySQL database, compress it, encrypt it and upload it to S3
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dump, compress, encrypt and upload the database
    Dump(DumpArgs),
    /// Print the version and the external tools that were found
    Version,
}

#[derive(Args, Debug)]
struct DumpArgs {
    /// YAML config file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Enable debug logging
    #[arg(long)]
    debug: bool,
    #[command(flatten)]
    overrides: RunConfigOverrides,
}

fn dump(args: DumpArgs) -> Result<String> {
    let config = RunConfig::load(args.config.as_deref(), args.overrides)?;
    let runner = ShellCommandRunner;
    let probe = ShellDependencyProbe::new(&runner);

    Pipeline::builder()
        .config(&config)
        .runner(&runner)
        .probe(&probe)
        .connector(&MysqlConnector)
        .notifier(&HttpHeartbeat::default())
        .build()
        .run()
}

fn version() -> Result<()> {
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!();

    let runner = ShellCommandRunner;
    for (name, info) in ShellDependencyProbe::new(&runner).probe()? {
        match (info.found, info.path) {
            (true, Some(path)) => match info.version {
                Some(version) => println!("{name} @ {path} [{version}]"),
                None => println!("{name} @ {path}"),
            },
            _ => println!("{name} WARNING: dependency not found"),
        }
    }
    Ok(())
}

/// Logs a failed command with `failure` as context and maps it to the
/// process exit code.
fn exit_code(res: Result<()>, failure: &str) -> i32 {
    match res {
        Ok(()) => 0,
        Err(e) => {
            error!("{failure}: {e}");
            1
        }
    }
}

fn run(cli: Cli) -> i32 {
    match cli.command {
        Command::Dump(args) => exit_code(
            dump(args).map(|url| println!("{url}")),
            "Dump failed to complete",
        ),
        Command::Version => exit_code(version(), "Unable to detect dependencies"),
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(matches!(&cli.command, Command::Dump(args) if args.debug));
    exit(run(cli));
}
