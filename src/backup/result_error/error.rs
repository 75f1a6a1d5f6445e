use crate::backup::artifact::ArtifactProblem;
use crate::backup::pipeline::Stage;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use crate::backup::tables::TableSelectionError;
use std::fmt::Debug;
use std::path::PathBuf;
use thiserror::Error;
use thiserror_ext::Construct;

#[derive(Error, Debug, Construct)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Mysql(#[from] mysql::Error),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error("Invalid configuration:\n{}", indent::indent_all_with("  ", .0.to_string()))]
    ValidationError(#[from] validator::ValidationErrors),
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Missing dependencies: {}", .0.join(", "))]
    DependencyMissing(Vec<String>),
    #[error("Unable to connect to database: {0}")]
    DatabaseConnection(String),
    #[error(transparent)]
    TableSelection(#[from] TableSelectionError),
    #[error("{}: {}", .stage.failure_message(), .output.join("\n"))]
    StageExecution { stage: Stage, output: Vec<String> },
    #[error("{} output file {}: {:?}", .stage.artifact_name(), .problem, .path)]
    ArtifactIntegrity {
        stage: Stage,
        path: PathBuf,
        problem: ArtifactProblem,
    },
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("{} failed:\n{}", fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithFunctionName { fn_name: String, error: Box<Error> },
    #[error("{}", itertools::join(.0, "\n\n"))]
    LotsOfError(Vec<Error>),
}

impl<S: Into<String>> AddMsg<S> for Error {
    fn add_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl<S: Into<String>> AddFunctionName<S> for Error {
    fn add_fn_name(self, fn_name: S) -> Self {
        Self::WithFunctionName {
            fn_name: fn_name.into(),
            error: Box::new(self),
        }
    }
}

impl Error {
    /// Peels `WithMsg`/`WithFunctionName` wrappers off to reach the error that
    /// actually happened.
    pub fn root(&self) -> &Error {
        match self {
            Error::WithMsg { error, .. } | Error::WithFunctionName { error, .. } => error.root(),
            e => e,
        }
    }
}
