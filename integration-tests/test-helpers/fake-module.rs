// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A fake scu test module, driven by a script stored next to the executable.
//!
//! Supports the two module modes:
//! - `--list`: emits a `testcase_list` event per scripted test
//! - `--run <index>...`: runs the given tests, emitting events as a real module would
//!
//! With `--wrap --log-file=<path> <program> <args>...` it instead acts as a memory checker: it
//! writes a log file and runs the wrapped program, exiting with its exit code.

use camino::Utf8PathBuf;
use color_eyre::{
    Result,
    eyre::{Context, bail, eyre},
};
use integration_tests::module_script::{ModuleScript, ScriptedOutcome};
use scu_metadata::{Failure, ModuleEvent, TestCaseEnd, TestCaseSummary};
use std::{
    env, fs,
    io::{self, Write},
    process::{Command, exit},
    thread,
    time::{Duration, Instant},
};

/// The contents of the log file written in wrapper mode.
const MEMCHECK_LOG: &str = "fake memcheck: 0 errors\n";

fn main() -> Result<()> {
    color_eyre::install()?;

    let args: Vec<String> = env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("--wrap") {
        return wrap(&args[1..]);
    }

    let exe = Utf8PathBuf::try_from(env::current_exe()?)?;
    let script = ModuleScript::load(&exe)?;

    match args.first().map(String::as_str) {
        Some("--list") => list(&script),
        Some("--run") => run(&script, exe, &args[1..]),
        _ => bail!("usage: {exe} (--list | --run <index>...)"),
    }
}

fn list(script: &ModuleScript) -> Result<()> {
    if script.list_exit_code != 0 {
        exit(script.list_exit_code);
    }

    let mut stdout = io::stdout().lock();
    for test in &script.tests {
        let event = ModuleEvent::TestcaseList(TestCaseSummary {
            name: test.name.clone(),
            description: test.description.clone(),
            tags: test.tags.clone(),
        });
        writeln!(stdout, "{}", event.to_line())?;
    }
    Ok(())
}

fn run(script: &ModuleScript, exe: Utf8PathBuf, indexes: &[String]) -> Result<()> {
    if env::var(scu_runner::DEBUG_ENV).as_deref() == Ok("1") {
        fs::write(ModuleScript::debug_marker_for(&exe), "")?;
    }

    let mut stdout = io::stdout().lock();
    if !script.omit_module_start {
        let name = match &script.module_name {
            Some(name) => name.clone(),
            None => exe.file_stem().unwrap_or_default().to_owned(),
        };
        writeln!(stdout, "{}", ModuleEvent::ModuleStart { name }.to_line())?;
    }

    for index in indexes {
        let index: usize = index
            .parse()
            .wrap_err_with(|| format!("invalid test index `{index}`"))?;
        let test = script
            .tests
            .get(index)
            .ok_or_else(|| eyre!("no test at index {index}"))?;

        let output = ModuleScript::output_file_for(&exe, index);
        fs::write(&output, &test.output)?;
        writeln!(
            stdout,
            "{}",
            ModuleEvent::TestcaseStart { index, output }.to_line()
        )?;
        stdout.flush()?;

        let start = Instant::now();
        thread::sleep(Duration::from_millis(script.delay_ms));
        let duration = start.elapsed().as_secs_f64();

        let event = match &test.outcome {
            ScriptedOutcome::Pass => ModuleEvent::TestcaseEnd(TestCaseEnd {
                index,
                success: true,
                duration,
                cpu_time: 0.0,
                asserts: 1,
                failures: vec![],
            }),
            ScriptedOutcome::Fail => ModuleEvent::TestcaseEnd(TestCaseEnd {
                index,
                success: false,
                duration,
                cpu_time: 0.0,
                asserts: 2,
                failures: vec![Failure {
                    file: "fake_module.c".to_owned(),
                    line: 10,
                    assert_method: "SCU_ASSERT_EQUAL".to_owned(),
                    message: None,
                    lhs: Some("actual".to_owned()),
                    rhs: Some("expected".to_owned()),
                    lhs_value: Some("1".to_owned()),
                    rhs_value: Some("2".to_owned()),
                }],
            }),
            ScriptedOutcome::Error { message } => ModuleEvent::TestcaseError {
                message: message.clone(),
                crash: false,
            },
            ScriptedOutcome::Malformed => {
                writeln!(stdout, "{{\"event\": \"testcase_end\", \"index\": ")?;
                continue;
            }
            ScriptedOutcome::Crash { exit_code } => {
                stdout.flush()?;
                exit(*exit_code);
            }
        };
        writeln!(stdout, "{}", event.to_line())?;
    }

    writeln!(stdout, "{}", ModuleEvent::ModuleEnd.to_line())?;
    Ok(())
}

fn wrap(args: &[String]) -> Result<()> {
    let Some((log_file, rest)) = args
        .split_first()
        .and_then(|(first, rest)| Some((first.strip_prefix("--log-file=")?, rest)))
    else {
        bail!("usage: --wrap --log-file=<path> <program> <args>...");
    };
    let Some((program, program_args)) = rest.split_first() else {
        bail!("no program to wrap");
    };

    fs::write(log_file, MEMCHECK_LOG).wrap_err_with(|| format!("failed to write {log_file}"))?;
    let status = Command::new(program)
        .args(program_args)
        .status()
        .wrap_err_with(|| format!("failed to run {program}"))?;
    exit(status.code().unwrap_or(1));
}
