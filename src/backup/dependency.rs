//! Detection of the external tools a run shells out to.

use crate::backup::command::{escape_arg, CommandInvocation, CommandRunner, SHELL};
use crate::backup::result_error::result::Result;
use std::collections::BTreeMap;

/// A tool the pipeline needs, and how to ask it for its version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequiredTool {
    pub name: &'static str,
    pub version_args: Option<&'static str>,
}

pub static REQUIRED_TOOLS: &[RequiredTool] = &[
    RequiredTool {
        name: "age",
        version_args: Some("--version"),
    },
    RequiredTool {
        name: "mysqldump",
        version_args: Some("--version"),
    },
    RequiredTool {
        name: "s5cmd",
        version_args: Some("version"),
    },
    // Every command line is interpreted by it.
    RequiredTool {
        name: SHELL,
        version_args: None,
    },
    RequiredTool {
        name: "xz",
        version_args: Some("--version"),
    },
];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyInfo {
    pub found: bool,
    pub path: Option<String>,
    pub version: Option<String>,
}

impl DependencyInfo {
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn found<P: Into<String>>(path: P, version: Option<String>) -> Self {
        Self {
            found: true,
            path: Some(path.into()),
            version,
        }
    }
}

/// Tool name to detection result, ordered by name.
pub type DependencyReport = BTreeMap<String, DependencyInfo>;

pub trait DependencyProbe {
    fn probe(&self) -> Result<DependencyReport>;
}

/// Names of every tool the report marks as not found, in name order.
pub fn missing_dependencies(report: &DependencyReport) -> Vec<String> {
    report
        .iter()
        .filter(|(_, info)| !info.found)
        .map(|(name, _)| name.clone())
        .collect()
}

/// Looks tools up with `command -v` and asks each for its version.
pub struct ShellDependencyProbe<'a> {
    runner: &'a dyn CommandRunner,
    tools: &'static [RequiredTool],
}

impl<'a> ShellDependencyProbe<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            tools: REQUIRED_TOOLS,
        }
    }

    fn probe_tool(&self, tool: &RequiredTool) -> Result<DependencyInfo> {
        let lookup = self
            .runner
            .run(&CommandInvocation::new("command").arg("-v").arg(escape_arg(tool.name)))?;
        let path = match lookup.lines.first() {
            Some(path) if lookup.success() && !path.trim().is_empty() => path.trim().to_string(),
            _ => return Ok(DependencyInfo::missing()),
        };

        let version = match tool.version_args {
            Some(args) => {
                let out = self.runner.run(
                    &CommandInvocation::new(escape_arg(&path))
                        .arg(args)
                        .arg("2>&1"),
                )?;
                out.lines.into_iter().find(|l| !l.trim().is_empty())
            }
            None => None,
        };

        Ok(DependencyInfo::found(path, version))
    }
}

impl DependencyProbe for ShellDependencyProbe<'_> {
    fn probe(&self) -> Result<DependencyReport> {
        self.tools
            .iter()
            .map(|tool| Ok((tool.name.to_string(), self.probe_tool(tool)?)))
            .collect()
    }
}
