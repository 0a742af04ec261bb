// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripts describing how a fake test module behaves.
//!
//! The `scu-fake-module` binary is copied into a temporary directory once per module under test.
//! Each copy reads a [`ModuleScript`] from a JSON file next to itself, so a single binary can act
//! as any number of distinct modules.

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::{Result, eyre::Context};
use serde::{Deserialize, Serialize};
use std::fs;

/// The behavior of one fake module.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ModuleScript {
    /// The name reported in `module_start`. Defaults to the executable's file stem.
    pub module_name: Option<String>,

    /// Don't emit `module_start` in run mode.
    pub omit_module_start: bool,

    /// Exit with this code after listing. A non-zero code lists no tests at all.
    pub list_exit_code: i32,

    /// Milliseconds to sleep inside every test.
    pub delay_ms: u64,

    /// The tests, in index order.
    pub tests: Vec<ScriptedTest>,
}

impl ModuleScript {
    /// Creates a script with these tests.
    pub fn new(tests: impl IntoIterator<Item = ScriptedTest>) -> Self {
        Self {
            tests: tests.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Returns the path of the script for the fake module at `exe`.
    pub fn path_for(exe: &Utf8Path) -> Utf8PathBuf {
        exe.with_extension("json")
    }

    /// Returns the file a fake module at `exe` creates when asked to wait for a debugger.
    pub fn debug_marker_for(exe: &Utf8Path) -> Utf8PathBuf {
        exe.with_extension("debugged")
    }

    /// Returns the output file a fake module at `exe` writes for the test at `index`.
    pub fn output_file_for(exe: &Utf8Path, index: usize) -> Utf8PathBuf {
        exe.with_extension(format!("{index}.out"))
    }

    /// Reads the script for the fake module at `exe`.
    pub fn load(exe: &Utf8Path) -> Result<Self> {
        let path = Self::path_for(exe);
        let contents =
            fs::read_to_string(&path).wrap_err_with(|| format!("failed to read {path}"))?;
        serde_json::from_str(&contents).wrap_err_with(|| format!("failed to parse {path}"))
    }

    /// Writes this script next to the fake module at `exe`.
    pub fn store(&self, exe: &Utf8Path) -> Result<()> {
        let path = Self::path_for(exe);
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&path, contents).wrap_err_with(|| format!("failed to write {path}"))
    }
}

/// One test in a [`ModuleScript`].
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScriptedTest {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub outcome: ScriptedOutcome,

    /// Written to the test's output file.
    #[serde(default)]
    pub output: String,
}

impl ScriptedTest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            outcome: ScriptedOutcome::Pass,
            output: String::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|&tag| tag.to_owned()).collect();
        self
    }

    pub fn outcome(mut self, outcome: ScriptedOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }
}

/// What a scripted test does once it has started.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ScriptedOutcome {
    /// Ends successfully.
    #[default]
    Pass,
    /// Ends with one failed assertion.
    Fail,
    /// Reports a `testcase_error`.
    Error { message: String },
    /// Writes a line that isn't valid JSON instead of ending.
    Malformed,
    /// Exits the process with this code without ending the test.
    Crash { exit_code: i32 },
}
