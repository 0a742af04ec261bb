// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for scu.
//!
//! Modules are copies of the `scu-fake-module` helper binary, each driven by a script stored next
//! to it. The `scu` command line is exercised through the `scu-dup` binary, and the runner
//! library is also driven directly.

use color_eyre::Result;
use fixtures::*;
use indoc::indoc;
use integration_tests::module_script::{ModuleScript, ScriptedOutcome, ScriptedTest};
use pretty_assertions::assert_eq;
use scu_metadata::ScuExitCode;
use std::fs;

mod fixtures;
mod runner;

#[test]
fn list_json() -> Result<()> {
    let modules = FakeModules::new()?;
    let (math, strings) = modules.add_standard()?;

    let output = scu()
        .args(["list", "--message-format", "json", math.as_str(), strings.as_str()])
        .output();
    let summary = output.decode_test_list_json()?;

    assert_eq!(summary.test_count, 5);
    let names: Vec<_> = summary.modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["math", "strings"]);
    assert_eq!(summary.modules[0].path, math);

    let add = &summary.modules[0].testcases[0];
    assert_eq!(add.index, 0);
    assert_eq!(add.name, "add");
    assert_eq!(add.description, "adds numbers");
    assert_eq!(add.tags, ["fast"]);
    assert!(
        summary
            .modules
            .iter()
            .flat_map(|m| &m.testcases)
            .all(|tc| tc.selected),
        "without filters, every test is selected"
    );
    Ok(())
}

#[test]
fn list_json_filtered() -> Result<()> {
    let modules = FakeModules::new()?;
    let (math, strings) = modules.add_standard()?;

    // Tests tagged fast, except sub.
    let output = scu()
        .args(["list", "-T", "json", "-t", "fast", "-x", "-n", "sub"])
        .args([math.as_str(), strings.as_str()])
        .output();
    let summary = output.decode_test_list_json()?;

    let selected: Vec<_> = summary
        .modules
        .iter()
        .flat_map(|m| {
            m.testcases
                .iter()
                .filter(|tc| tc.selected)
                .map(move |tc| format!("{}::{}", m.name, tc.name))
        })
        .collect();
    assert_eq!(selected, ["math::add", "strings::concat"]);
    assert_eq!(summary.test_count, 2);
    // Deselected tests are still listed.
    let listed: usize = summary.modules.iter().map(|m| m.testcases.len()).sum();
    assert_eq!(listed, 5);
    Ok(())
}

#[test]
fn list_human() -> Result<()> {
    let modules = FakeModules::new()?;
    let (math, strings) = modules.add_standard()?;

    let output = scu()
        .args(["list", "-t", "slow", math.as_str(), strings.as_str()])
        .output();
    assert_eq!(
        output.stdout_as_str(),
        indoc! {"
            math:
                sub [fast, slow]
            strings:
                split [slow]
        "}
    );
    Ok(())
}

#[test]
fn list_failure_leaves_module_empty() -> Result<()> {
    let modules = FakeModules::new()?;
    let broken = modules.add(
        "broken",
        &ModuleScript {
            list_exit_code: 3,
            ..ModuleScript::new([ScriptedTest::new("never_listed")])
        },
    )?;

    let output = scu()
        .args(["list", "-T", "json", broken.as_str()])
        .output();
    let summary = output.decode_test_list_json()?;
    assert_eq!(summary.test_count, 0);
    assert_eq!(summary.modules.len(), 1);
    assert!(summary.modules[0].testcases.is_empty());
    Ok(())
}

#[test]
fn run_passing() -> Result<()> {
    let modules = FakeModules::new()?;
    let (math, _) = modules.add_standard()?;

    let output = scu().args(["run", "-j", "2", math.as_str()]).output();
    assert_eq!(output.exit_code(), Some(ScuExitCode::OK), "{output}");

    let stdout = output.stdout_as_str();
    assert!(
        stdout.contains("    Starting 3 tests across 1 module\n"),
        "{output}"
    );
    assert!(stdout.contains(&format!("      MODULE math [{math}]\n")), "{output}");
    assert!(stdout.contains("] add: adds numbers\n"), "{output}");
    assert!(stdout.contains("      PASSED 3 tests across 1 module\n"), "{output}");

    // Output files are removed once their tests are reported.
    for index in 0..3 {
        let file = ModuleScript::output_file_for(&math, index);
        assert!(!file.exists(), "{file} was removed");
    }
    Ok(())
}

#[test]
fn run_failing() -> Result<()> {
    let modules = FakeModules::new()?;
    let (math, strings) = modules.add_standard()?;

    let output = scu()
        .args(["run", math.as_str(), strings.as_str()])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(ScuExitCode::TEST_RUN_FAILED),
        "{output}"
    );

    let stdout = output.stdout_as_str();
    assert!(stdout.contains("] split\n"), "{output}");
    assert!(stdout.contains("SCU_ASSERT_EQUAL"), "{output}");
    // Failing tests show their output file by default.
    assert!(stdout.contains("split: expected 2 parts"), "{output}");
    assert!(stdout.contains("      FAILED 5 tests across 2 modules\n"), "{output}");
    assert!(output.stderr_as_str().contains("error: test run failed"), "{output}");
    Ok(())
}

#[test]
fn run_filtered_skips_modules() -> Result<()> {
    let modules = FakeModules::new()?;
    let (math, strings) = modules.add_standard()?;

    // Only math::mul is selected, so strings (which has a failing test) never runs.
    let output = scu()
        .args(["run", "-n", "m*", math.as_str(), strings.as_str()])
        .output();
    let stdout = output.stdout_as_str();
    assert!(
        stdout.contains("    Starting 1 test across 1 module (1 module skipped)\n"),
        "{output}"
    );
    assert!(!stdout.contains("MODULE strings"), "{output}");
    assert!(stdout.contains("      PASSED 1 test across 1 module\n"), "{output}");
    Ok(())
}

#[test]
fn run_nothing_selected() -> Result<()> {
    let modules = FakeModules::new()?;
    let (math, _) = modules.add_standard()?;

    let output = scu()
        .args(["run", "-t", "no-such-tag", math.as_str()])
        .output();
    assert_eq!(output.exit_code(), Some(ScuExitCode::OK), "{output}");
    assert!(
        output
            .stdout_as_str()
            .contains("      PASSED 0 tests across 0 modules\n"),
        "{output}"
    );
    Ok(())
}

#[test]
fn run_crash() -> Result<()> {
    let modules = FakeModules::new()?;
    let crashy = modules.add(
        "crashy",
        &ModuleScript::new([
            ScriptedTest::new("fine"),
            ScriptedTest::new("boom").outcome(ScriptedOutcome::Crash { exit_code: 7 }),
            ScriptedTest::new("unreached"),
        ]),
    )?;

    let output = scu()
        .args(["run", crashy.as_str()])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(ScuExitCode::TEST_RUN_FAILED),
        "{output}"
    );
    let stdout = output.stdout_as_str();
    assert!(stdout.contains("] boom\n"), "{output}");
    assert!(stdout.contains("Test module crashed (exit code 7)"), "{output}");
    assert!(!stdout.contains("unreached"), "{output}");
    Ok(())
}

#[test]
fn dangling_exclude() -> Result<()> {
    let modules = FakeModules::new()?;
    let (math, _) = modules.add_standard()?;

    let output = scu()
        .args(["run", "-n", "add", "-x", math.as_str()])
        .unchecked(true)
        .output();
    assert_eq!(output.exit_code(), Some(ScuExitCode::SETUP_ERROR), "{output}");
    assert!(
        output
            .stderr_as_str()
            .contains("--exclude must be followed by a --name or --tag filter"),
        "{output}"
    );
    Ok(())
}

#[test]
fn invalid_glob() -> Result<()> {
    let modules = FakeModules::new()?;
    let (math, _) = modules.add_standard()?;

    let output = scu()
        .args(["list", "-n", "add[", math.as_str()])
        .unchecked(true)
        .output();
    assert_eq!(output.exit_code(), Some(ScuExitCode::SETUP_ERROR), "{output}");
    Ok(())
}

#[test]
fn invalid_config() -> Result<()> {
    let modules = FakeModules::new()?;
    let (math, _) = modules.add_standard()?;
    let config = modules.dir().join("bad.toml");
    fs::write(&config, "test-threads = 0\n")?;

    let output = scu()
        .args(["run", "--config-file", config.as_str(), math.as_str()])
        .unchecked(true)
        .output();
    assert_eq!(output.exit_code(), Some(ScuExitCode::SETUP_ERROR), "{output}");
    assert!(
        output.stderr_as_str().contains("failed to parse scu config"),
        "{output}"
    );
    Ok(())
}

#[test]
fn debug_mode() -> Result<()> {
    let modules = FakeModules::new()?;
    let (math, strings) = modules.add_standard()?;

    let output = scu()
        .args(["run", "--debug", "-j", "8", math.as_str(), "-t", "fast"])
        .arg(strings.as_str())
        .output();

    for module in [&math, &strings] {
        let marker = ModuleScript::debug_marker_for(module);
        assert!(marker.exists(), "{module} was asked to wait for a debugger");
    }
    let stderr = output.stderr_as_str();
    assert!(stderr.contains("is waiting for a debugger"), "{output}");
    assert!(stderr.contains("gdb -p "), "{output}");
    Ok(())
}

#[test]
fn memcheck() -> Result<()> {
    let modules = FakeModules::new()?;
    let (math, _) = modules.add_standard()?;

    let work_dir = modules.dir().join("work");
    fs::create_dir_all(work_dir.join(".config"))?;
    fs::write(
        work_dir.join(".config/scu.toml"),
        format!(
            indoc! {r#"
                [memcheck]
                command = ['{}', "--wrap"]
                log-file-arg = "--log-file"
                log-file-suffix = ".memcheck.log"
            "#},
            FAKE_MODULE
        ),
    )?;

    let output = scu()
        .args(["run", "--memcheck", math.as_str()])
        .current_dir(&work_dir)
        .output();
    assert!(
        output
            .stdout_as_str()
            .contains("      PASSED 3 tests across 1 module\n"),
        "{output}"
    );
    assert_eq!(
        fs::read_to_string(work_dir.join("math.memcheck.log"))?,
        "fake memcheck: 0 errors\n"
    );
    Ok(())
}
