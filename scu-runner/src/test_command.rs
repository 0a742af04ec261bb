// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{config::MemcheckConfig, errors::ChildStartError, test_module::TestModule};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::{fmt, process::Stdio};

/// Environment variable set to `1` on module processes started in debug mode.
///
/// Modules that see it wait for a debugger to attach before running tests.
pub const DEBUG_ENV: &str = "SCU_WAIT_FOR_DEBUGGER";

const LIST_ARG: &str = "--list";
const RUN_ARG: &str = "--run";

/// Settings that affect how module processes are launched.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct LaunchContext<'a> {
    /// Wrap run invocations in the memory checker.
    pub(crate) memcheck: Option<&'a MemcheckConfig>,
    /// Ask run invocations to wait for a debugger.
    pub(crate) debug: bool,
}

/// What a module process is asked to do.
#[derive(Clone, Copy, Debug)]
pub(crate) enum ModuleInvocation<'a> {
    /// List the tests in the module.
    List,
    /// Run the tests with these indexes.
    Run(&'a [usize]),
}

/// A to-be-run module command.
pub(crate) struct ModuleCommand {
    command: std::process::Command,
    display: String,
}

impl ModuleCommand {
    pub(crate) fn new(
        module: &TestModule,
        invocation: ModuleInvocation<'_>,
        ctx: &LaunchContext<'_>,
    ) -> Self {
        let module_path = program_path(module.path()).into_string();
        let mut argv = Vec::new();

        // Memory checking and debugging only apply to running tests, never to listing them.
        let is_run = matches!(invocation, ModuleInvocation::Run(_));
        let program = match ctx.memcheck.filter(|_| is_run) {
            Some(memcheck) => {
                let mut wrapper = memcheck.wrapper_args(module).into_iter();
                let program = wrapper.next().unwrap_or_else(|| module_path.clone());
                argv.extend(wrapper);
                argv.push(module_path);
                program
            }
            None => module_path,
        };

        match invocation {
            ModuleInvocation::List => argv.push(LIST_ARG.to_owned()),
            ModuleInvocation::Run(indices) => {
                argv.push(RUN_ARG.to_owned());
                argv.extend(indices.iter().map(ToString::to_string));
            }
        }

        let display = shell_words::join(std::iter::once(&program).chain(&argv));
        let mut command = std::process::Command::new(&program);
        command.args(&argv);
        if ctx.debug && is_run {
            command.env(DEBUG_ENV, "1");
        }

        Self { command, display }
    }

    /// Spawns the process with stdin closed, stdout piped and stderr inherited.
    pub(crate) fn spawn(self) -> Result<tokio::process::Child, ChildStartError> {
        let Self { command, display } = self;
        let mut command = tokio::process::Command::from(command);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        command
            .spawn()
            .map_err(|error| ChildStartError::new(display, error))
    }
}

impl fmt::Display for ModuleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

// A bare file name would be looked up in PATH rather than in the current directory.
fn program_path(path: &Utf8Path) -> Utf8PathBuf {
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Utf8Component::Normal(_)), None) => Utf8Path::new(".").join(path),
        _ => path.to_owned(),
    }
}
