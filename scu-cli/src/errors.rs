// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING, StderrStyles};
use owo_colors::OwoColorize;
use scu_metadata::ScuExitCode;
use scu_runner::errors::*;
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are mostly placeholder messages: the expected way to print out errors is
// with the display_to_stderr method, which colorizes errors.

/// An error that was anticipated: bad input, a failing test run, or an output error.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine current directory")]
    CurrentDirFailed {
        #[source]
        err: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 {
        #[source]
        err: camino::FromPathBufError,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("test filter build error")]
    TestFilterBuildError {
        #[from]
        err: TestFilterBuildError,
    },
    #[error("dangling --exclude")]
    DanglingExclude,
    #[error("module runner build error")]
    ModuleRunnerBuildError {
        #[from]
        err: ModuleRunnerBuildError,
    },
    #[error("error writing test list")]
    WriteTestListError {
        #[source]
        err: std::io::Error,
    },
    #[error("error serializing test list")]
    SerializeTestListError {
        #[source]
        err: serde_json::Error,
    },
    #[error("error writing event")]
    WriteEventError {
        #[source]
        err: RunnerExecuteError,
    },
    #[error("error writing to output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
    #[error("test run failed")]
    TestRunFailed,
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::TestFilterBuildError { .. }
            | Self::DanglingExclude => ScuExitCode::SETUP_ERROR,
            Self::ModuleRunnerBuildError { .. } => ScuExitCode::TEST_LIST_CREATION_FAILED,
            Self::WriteTestListError { .. }
            | Self::SerializeTestListError { .. }
            | Self::WriteEventError { .. }
            | Self::WriteOutputError { .. } => ScuExitCode::WRITE_OUTPUT_ERROR,
            Self::TestRunFailed => ScuExitCode::TEST_RUN_FAILED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::CurrentDirFailed { err } => {
                error!("could not determine current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { err } => {
                error!("current directory is not valid UTF-8");
                Some(err as &dyn Error)
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse scu config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::TestFilterBuildError { err } => {
                error!("failed to build test filter");
                Some(err as &dyn Error)
            }
            Self::DanglingExclude => {
                error!(
                    "{} must be followed by a {} or {} filter",
                    "--exclude".style(styles.bold),
                    "--name".style(styles.bold),
                    "--tag".style(styles.bold),
                );
                None
            }
            Self::ModuleRunnerBuildError { err } => {
                error!("failed to build module runner");
                Some(err as &dyn Error)
            }
            Self::WriteTestListError { err } => {
                error!("failed to write test list to output");
                Some(err as &dyn Error)
            }
            Self::SerializeTestListError { err } => {
                error!("failed to serialize test list");
                Some(err as &dyn Error)
            }
            Self::WriteEventError { err } => {
                error!("failed to write event to output");
                err.source()
            }
            Self::WriteOutputError { err } => {
                error!("failed to write to output");
                Some(err as &dyn Error)
            }
            Self::TestRunFailed => {
                error!("test run failed");
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING, "\ncaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
