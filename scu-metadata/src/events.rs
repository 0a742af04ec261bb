// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single event emitted by a test module.
///
/// Test modules write events as JSON objects, one per line, to standard output. The kind of the
/// event is stored in the `"event"` key:
///
/// ```json
/// {"event": "testcase_start", "index": 0, "output": "/tmp/scu-output-1234"}
/// ```
///
/// For a single module run, events are emitted in the order `module_start`, then for each selected
/// test a `testcase_start` followed by exactly one of `testcase_end` or `testcase_error`, then
/// `module_end`. The `testcase_list` event is only produced while listing tests.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ModuleEvent {
    /// The module started executing tests.
    ModuleStart {
        /// The name the module reports for itself.
        name: String,
    },

    /// A test case was discovered. Only produced in list mode.
    TestcaseList(TestCaseSummary),

    /// A test case started running.
    TestcaseStart {
        /// The index of the test case, as discovered during listing.
        index: usize,

        /// The file the module writes diagnostic output for this test case to.
        output: Utf8PathBuf,
    },

    /// A test case finished running.
    TestcaseEnd(TestCaseEnd),

    /// A test case could not be run to completion.
    ///
    /// Also produced by the orchestrator for lines it could not parse, and for modules that
    /// crashed.
    TestcaseError {
        /// A description of the error.
        message: String,

        /// True if the module process crashed.
        crash: bool,
    },

    /// The module finished executing tests.
    ModuleEnd,
}

impl ModuleEvent {
    /// The message used for lines of module output that can't be parsed.
    pub const PARSE_ERROR_MESSAGE: &'static str = "Failed to parse test case output";

    /// Parses a single line of module output.
    pub fn from_line(line: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(line)
    }

    /// Serializes this event to a single line of JSON, without the trailing newline.
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).expect("serializing a module event never fails")
    }

    /// The event produced in place of a line that couldn't be parsed.
    pub fn parse_error() -> Self {
        Self::TestcaseError {
            message: Self::PARSE_ERROR_MESSAGE.to_owned(),
            crash: false,
        }
    }

    /// The event produced when a module process exits abnormally.
    pub fn crash(message: impl Into<String>) -> Self {
        Self::TestcaseError {
            message: message.into(),
            crash: true,
        }
    }

    /// Returns the kind of this event, as it is spelled on the wire.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::ModuleStart { .. } => "module_start",
            Self::TestcaseList(_) => "testcase_list",
            Self::TestcaseStart { .. } => "testcase_start",
            Self::TestcaseEnd(_) => "testcase_end",
            Self::TestcaseError { .. } => "testcase_error",
            Self::ModuleEnd => "module_end",
        }
    }

    /// Returns true if this event ends a test case.
    pub fn is_test_terminal(&self) -> bool {
        matches!(self, Self::TestcaseEnd(_) | Self::TestcaseError { .. })
    }
}

/// A test case as reported by a module in list mode.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct TestCaseSummary {
    /// The name of the test case, unique within its module.
    pub name: String,

    /// A human-readable description.
    #[serde(default, alias = "desc")]
    pub description: String,

    /// Tags attached to the test case.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// The result of a test case that ran to completion.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TestCaseEnd {
    /// The index of the test case.
    pub index: usize,

    /// True if all assertions passed.
    pub success: bool,

    /// Wall-clock time taken, in seconds.
    #[serde(default)]
    pub duration: f64,

    /// CPU time taken, in seconds.
    #[serde(default)]
    pub cpu_time: f64,

    /// The number of assertions evaluated.
    #[serde(default)]
    pub asserts: u64,

    /// The assertions that failed.
    #[serde(default)]
    pub failures: Vec<Failure>,
}

impl TestCaseEnd {
    /// Returns the wall-clock time as a [`Duration`].
    ///
    /// Negative or non-finite values are treated as zero.
    pub fn duration(&self) -> Duration {
        secs_to_duration(self.duration)
    }

    /// Returns the CPU time as a [`Duration`].
    pub fn cpu_time(&self) -> Duration {
        secs_to_duration(self.cpu_time)
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// A failed assertion.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Failure {
    /// The source file containing the assertion.
    pub file: String,

    /// The line of the assertion.
    pub line: u32,

    /// The assertion macro that failed, e.g. `SCU_ASSERT_EQUAL`.
    #[serde(default)]
    pub assert_method: String,

    /// A custom message attached to the assertion.
    #[serde(default, alias = "msg", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Source text of the actual value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lhs: Option<String>,

    /// Source text of the expected value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhs: Option<String>,

    /// The actual value, pretty-printed by the module.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lhs_value: Option<String>,

    /// The expected value, pretty-printed by the module.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhs_value: Option<String>,
}
