// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::test_module::TestModule;
use camino::Utf8PathBuf;
use serde::Deserialize;

/// Settings for running modules under a memory checker, the `[memcheck]` table.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct MemcheckConfig {
    /// The program and leading arguments every module invocation is wrapped in. Never empty.
    pub command: Vec<String>,

    /// The argument used to pass the log file to the memory checker.
    pub log_file_arg: String,

    /// Appended to the module name to form the log file name.
    pub log_file_suffix: String,
}

impl MemcheckConfig {
    /// Returns the log file for `module`, relative to the current directory.
    pub fn log_file(&self, module: &TestModule) -> Utf8PathBuf {
        format!("{}{}", module.name(), self.log_file_suffix).into()
    }

    /// Returns the arguments to pass before the module path, for `module`.
    pub(crate) fn wrapper_args(&self, module: &TestModule) -> Vec<String> {
        let mut args = self.command.clone();
        args.push(format!("{}={}", self.log_file_arg, self.log_file(module)));
        args
    }
}

/// Settings for attaching a debugger in debug mode, the `[debugger]` table.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct DebuggerConfig {
    /// The command printed for attaching a debugger to a waiting module. Every `{pid}` is replaced
    /// with the process ID.
    pub attach_command: Vec<String>,
}

impl DebuggerConfig {
    /// The placeholder replaced with a process ID in [`attach_command`](Self::attach_command).
    pub const PID_PLACEHOLDER: &'static str = "{pid}";

    /// Returns a shell-quoted command line for attaching to `pid`.
    pub fn attach_command_for(&self, pid: u32) -> String {
        let pid = pid.to_string();
        shell_words::join(
            self.attach_command
                .iter()
                .map(|arg| arg.replace(Self::PID_PLACEHOLDER, &pid)),
        )
    }
}
