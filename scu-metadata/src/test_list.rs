// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Root element for a serializable list of discovered tests, produced by `scu list
/// --message-format json`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct TestListSummary {
    /// The number of tests selected to run, across all modules.
    pub test_count: usize,

    /// One entry per module, in invocation order.
    pub modules: Vec<ModuleSummary>,
}

impl TestListSummary {
    /// Parses JSON output from `scu list --message-format json`.
    pub fn parse_json(json: impl AsRef<str>) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json.as_ref())
    }
}

/// A test module and the tests it reported.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ModuleSummary {
    /// The path to the module executable, as passed in.
    pub path: Utf8PathBuf,

    /// The name of the module, derived from its file name.
    pub name: String,

    /// The tests discovered in this module, by index.
    pub testcases: Vec<TestCaseListSummary>,
}

/// A single discovered test case.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct TestCaseListSummary {
    /// The index of the test case within its module.
    pub index: usize,

    /// The name of the test case.
    pub name: String,

    /// A human-readable description.
    pub description: String,

    /// The tags attached to the test case.
    pub tags: Vec<String>,

    /// True if the test filter selected this test case.
    pub selected: bool,
}
