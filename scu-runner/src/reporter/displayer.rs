// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prints test events to the console.

use super::{
    EventObserver, TestEvent, TestOutputDisplay,
    helpers::{DisplayBracketedDuration, Styles},
};
use crate::{
    errors::WriteEventError,
    helpers::{plural, write_indented},
    test_filter::RunPlan,
    test_module::{ModuleIndex, TestCase, TestModule},
};
use camino::{Utf8Path, Utf8PathBuf};
use owo_colors::{OwoColorize, Style};
use scu_metadata::{Failure, ModuleEvent, TestCaseEnd};
use std::{
    collections::BTreeMap,
    fs,
    io::{self, Write},
    time::Duration,
};
use tracing::warn;

const DETAIL_INDENT: &str = "             ";
const VALUE_INDENT: &str = "                 ";

/// Builder for [`DisplayReporter`].
#[derive(Clone, Debug)]
pub struct DisplayReporterBuilder {
    success_output: TestOutputDisplay,
    failure_output: TestOutputDisplay,
    should_colorize: bool,
}

impl Default for DisplayReporterBuilder {
    fn default() -> Self {
        Self {
            success_output: TestOutputDisplay::Never,
            failure_output: TestOutputDisplay::Immediate,
            should_colorize: false,
        }
    }
}

impl DisplayReporterBuilder {
    /// Sets when to display the output of passing tests.
    pub fn set_success_output(&mut self, success_output: TestOutputDisplay) -> &mut Self {
        self.success_output = success_output;
        self
    }

    /// Sets when to display the output of failing tests.
    pub fn set_failure_output(&mut self, failure_output: TestOutputDisplay) -> &mut Self {
        self.failure_output = failure_output;
        self
    }

    /// Sets whether the output should be colorized.
    pub fn set_colorize(&mut self, should_colorize: bool) -> &mut Self {
        self.should_colorize = should_colorize;
        self
    }

    /// Creates a new reporter writing to `writer`.
    pub fn build<'a, W: Write>(&self, writer: W) -> DisplayReporter<'a, W> {
        DisplayReporter {
            writer,
            styles: Styles::new(self.should_colorize),
            success_output: self.success_output,
            failure_output: self.failure_output,
            running: BTreeMap::new(),
        }
    }
}

struct RunningTest<'a> {
    index: usize,
    test_case: Option<&'a TestCase>,
    output: Utf8PathBuf,
}

/// Prints a line for every test that finishes, along with failure details and output files.
pub struct DisplayReporter<'a, W> {
    writer: W,
    styles: Styles,
    success_output: TestOutputDisplay,
    failure_output: TestOutputDisplay,
    running: BTreeMap<ModuleIndex, RunningTest<'a>>,
}

impl<'a, W: Write> DisplayReporter<'a, W> {
    /// Consumes the reporter, returning the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Writes the line announcing a run of `plan`.
    pub fn write_run_started(&mut self, plan: &RunPlan<'_>) -> io::Result<()> {
        let test_count = plan.test_count();
        let module_count = plan.modules().len();
        write!(
            self.writer,
            "{:>12} {} {} across {} {}",
            "Starting".style(self.styles.pass),
            test_count.style(self.styles.count),
            plural::tests_str(test_count),
            module_count.style(self.styles.count),
            plural::modules_str(module_count),
        )?;
        let skipped = plan.skipped().len();
        if skipped > 0 {
            write!(
                self.writer,
                " ({} {} skipped)",
                skipped.style(self.styles.count),
                plural::modules_str(skipped),
            )?;
        }
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn write_event(&mut self, event: &TestEvent<'a>) -> io::Result<()> {
        let module = event.module;
        match &event.event {
            ModuleEvent::ModuleStart { .. } => {
                writeln!(
                    self.writer,
                    "{:>12} {} [{}]",
                    "MODULE".style(self.styles.module),
                    module.name().style(self.styles.count),
                    module.path(),
                )?;
            }
            ModuleEvent::TestcaseStart { index, output } => {
                self.running.insert(
                    module.index(),
                    RunningTest {
                        index: *index,
                        test_case: module.test_case(*index),
                        output: output.clone(),
                    },
                );
            }
            ModuleEvent::TestcaseEnd(end) => {
                let running = self.take_running(module, Some(end.index));
                self.write_end(module, &running, end)?;
            }
            ModuleEvent::TestcaseError { message, crash } => {
                let running = self.take_running(module, None);
                self.write_error(module, &running, message, *crash)?;
            }
            ModuleEvent::ModuleEnd => {
                self.running.remove(&module.index());
            }
            ModuleEvent::TestcaseList(_) => {}
        }
        Ok(())
    }

    // Returns the test being finished. A testcase_end that doesn't match the running test still
    // names its test through its own index, and keeps the output file of the running test.
    fn take_running(&mut self, module: &'a TestModule, index: Option<usize>) -> RunningTest<'a> {
        let running = self.running.remove(&module.index());
        match index {
            Some(index) if running.as_ref().is_none_or(|running| running.index != index) => {
                RunningTest {
                    index,
                    test_case: module.test_case(index),
                    output: running.map(|running| running.output).unwrap_or_default(),
                }
            }
            _ => running.unwrap_or(RunningTest {
                index: usize::MAX,
                test_case: None,
                output: Utf8PathBuf::new(),
            }),
        }
    }

    fn write_end(
        &mut self,
        module: &TestModule,
        running: &RunningTest<'a>,
        end: &TestCaseEnd,
    ) -> io::Result<()> {
        let (status, style) = if end.success {
            ("PASS", self.styles.pass)
        } else {
            ("FAIL", self.styles.fail)
        };
        self.write_status_line(module, running, status, style, Some(end.duration()))?;

        for failure in &end.failures {
            self.write_failure(failure)?;
        }

        let display = if end.success {
            self.success_output
        } else {
            self.failure_output
        };
        if display.is_immediate() {
            self.write_output_file(module, running, end.success)?;
        }
        Ok(())
    }

    fn write_error(
        &mut self,
        module: &TestModule,
        running: &RunningTest<'a>,
        message: &str,
        crash: bool,
    ) -> io::Result<()> {
        let status = if crash { "CRASH" } else { "ERROR" };
        self.write_status_line(module, running, status, self.styles.fail, None)?;
        write_indented(&mut self.writer, DETAIL_INDENT, message)?;
        if self.failure_output.is_immediate() {
            self.write_output_file(module, running, false)?;
        }
        Ok(())
    }

    fn write_status_line(
        &mut self,
        module: &TestModule,
        running: &RunningTest<'a>,
        status: &str,
        style: Style,
        duration: Option<Duration>,
    ) -> io::Result<()> {
        write!(
            self.writer,
            "{:>12} {}",
            status.style(style),
            DisplayBracketedDuration(duration),
        )?;
        match running.test_case {
            Some(test_case) => {
                write!(self.writer, "{}", test_case.name.style(self.styles.count))?;
                if !test_case.description.is_empty() {
                    write!(
                        self.writer,
                        ": {}",
                        test_case.description.style(self.styles.description)
                    )?;
                }
                writeln!(self.writer)
            }
            // The module crashed between tests, or reported a test it never listed.
            None => writeln!(self.writer, "{}", module.name().style(self.styles.count)),
        }
    }

    fn write_failure(&mut self, failure: &Failure) -> io::Result<()> {
        let method = if failure.assert_method.is_empty() {
            "assertion"
        } else {
            failure.assert_method.as_str()
        };
        writeln!(
            self.writer,
            "{DETAIL_INDENT}{} {} failed",
            format_args!("{}:{}:", failure.file, failure.line).style(self.styles.location),
            method.style(self.styles.fail),
        )?;
        if let Some(message) = &failure.message {
            write_indented(&mut self.writer, VALUE_INDENT, message)?;
        }
        self.write_operand("actual", failure.lhs.as_deref(), failure.lhs_value.as_deref())?;
        self.write_operand("expected", failure.rhs.as_deref(), failure.rhs_value.as_deref())
    }

    fn write_operand(
        &mut self,
        label: &str,
        expr: Option<&str>,
        value: Option<&str>,
    ) -> io::Result<()> {
        match (expr, value) {
            (None, None) => Ok(()),
            (Some(expr), None) => writeln!(self.writer, "{VALUE_INDENT}{label}: {expr}"),
            (expr, Some(value)) => {
                match expr {
                    Some(expr) => writeln!(self.writer, "{VALUE_INDENT}{label} ({expr}):")?,
                    None => writeln!(self.writer, "{VALUE_INDENT}{label}:")?,
                }
                write_indented(&mut self.writer, &format!("{VALUE_INDENT}  "), value)
            }
        }
    }

    fn write_output_file(
        &mut self,
        module: &TestModule,
        running: &RunningTest<'a>,
        success: bool,
    ) -> io::Result<()> {
        let Some(contents) = read_output(&running.output) else {
            return Ok(());
        };

        let style = if success {
            self.styles.pass_output
        } else {
            self.styles.fail_output
        };
        let test_name = running.test_case.map_or("", |tc| tc.name.as_str());
        writeln!(
            self.writer,
            "\n{}",
            format_args!("--- OUTPUT: {} {} ---", module.name(), test_name).style(style),
        )?;
        self.writer.write_all(&contents)?;
        if !contents.ends_with(b"\n") {
            writeln!(self.writer)?;
        }
        writeln!(self.writer)
    }
}

fn read_output(path: &Utf8Path) -> Option<Vec<u8>> {
    if path.as_str().is_empty() {
        return None;
    }
    match fs::read(path) {
        Ok(contents) if contents.is_empty() => None,
        Ok(contents) => Some(contents),
        Err(error) if error.kind() == io::ErrorKind::NotFound => None,
        Err(error) => {
            warn!("failed to read output file {path}: {error}");
            None
        }
    }
}

impl<'a, W: Write> EventObserver<'a> for DisplayReporter<'a, W> {
    fn handle_event(&mut self, event: &TestEvent<'a>) -> Result<(), WriteEventError> {
        self.write_event(event)?;
        self.writer.flush()?;
        Ok(())
    }
}
