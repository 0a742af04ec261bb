// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by scu.

use camino::{Utf8Path, Utf8PathBuf};
use config::ConfigError;
use std::io;
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse scu config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of [`ConfigParseError`] that occurred.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// A config key had a value that parsed but isn't valid.
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue {
        /// The key that was invalid.
        key: &'static str,

        /// Why the value is invalid.
        reason: String,
    },
}

/// An error that occurs while parsing a [`TestThreads`](crate::config::TestThreads) value.
#[derive(Clone, Debug, Error)]
#[error("unrecognized value for test-threads: {input}\n(hint: expected an integer or \"num-cpus\")")]
pub struct TestThreadsParseError {
    /// The input that failed to parse.
    pub input: String,
}

impl TestThreadsParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurs while parsing a
/// [`TestOutputDisplay`](crate::reporter::TestOutputDisplay) value.
#[derive(Clone, Debug, Error)]
#[error("unrecognized value for test output display: {input}\n(hint: expected \"immediate\" or \"never\")")]
pub struct TestOutputDisplayParseError {
    /// The input that failed to parse.
    pub input: String,
}

impl TestOutputDisplayParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurs while building a [`TestFilter`](crate::test_filter::TestFilter).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestFilterBuildError {
    /// A name pattern was not a valid glob.
    #[error("invalid glob `{glob}`")]
    InvalidGlob {
        /// The glob that failed to parse.
        glob: String,

        /// The underlying error.
        #[source]
        error: globset::Error,
    },

    /// A glob was valid, but its regex translation failed to compile.
    #[error("glob `{glob}` could not be compiled")]
    GlobRegex {
        /// The glob that failed to compile.
        glob: String,

        /// The underlying error.
        #[source]
        error: regex::Error,
    },
}

/// An error that occurs while creating a [`ModuleRunner`](crate::runner::ModuleRunner).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModuleRunnerBuildError {
    /// An error occurred while creating the Tokio runtime.
    #[error("error creating Tokio runtime")]
    TokioRuntimeCreate(#[source] io::Error),
}

/// An error that occurs while starting a test module process.
#[derive(Debug, Error)]
#[error("error spawning `{command}`")]
pub struct ChildStartError {
    command: String,
    #[source]
    error: io::Error,
}

impl ChildStartError {
    pub(crate) fn new(command: impl Into<String>, error: io::Error) -> Self {
        Self {
            command: command.into(),
            error,
        }
    }

    /// Returns the command line that failed to start.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the underlying I/O error.
    pub fn io_error(&self) -> &io::Error {
        &self.error
    }
}

/// An error that occurs while an observer handles a test event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteEventError {
    /// An error occurred while writing the event to the provided output.
    #[error("error writing to output")]
    Io(#[from] io::Error),
}

/// An error that occurs while running test modules.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerExecuteError {
    /// An observer failed to handle an event. The run completed regardless; this is the first
    /// such error.
    #[error("error reporting test events")]
    WriteEvent(#[from] WriteEventError),
}
