// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{EventObserver, TestEvent, helpers::Styles};
use crate::{
    errors::WriteEventError,
    helpers::plural,
    test_module::ModuleIndex,
};
use owo_colors::OwoColorize;
use scu_metadata::ModuleEvent;
use std::{collections::BTreeMap, io, io::Write, time::Duration};

/// Statistics for a test run.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct RunSummary {
    /// The number of modules that started running.
    pub modules_total: usize,

    /// The number of modules with at least one failed test, or that crashed.
    pub modules_failed: usize,

    /// The number of tests that finished, one way or another.
    pub tests_total: usize,

    /// The number of tests that failed, errored out or crashed.
    pub tests_failed: usize,

    /// The number of assertions evaluated.
    pub asserts_total: u64,

    /// The number of assertion failures reported.
    pub asserts_failed: u64,

    /// The sum of the wall-clock durations reported by tests.
    pub duration: Duration,

    /// The sum of the CPU times reported by tests.
    pub cpu_time: Duration,
}

impl RunSummary {
    /// Returns true if no test failed and no module crashed.
    pub fn is_success(&self) -> bool {
        self.modules_failed == 0 && self.tests_failed == 0
    }

    /// Writes a fixed-width summary table.
    pub fn write_table(&self, writer: &mut dyn Write, should_colorize: bool) -> io::Result<()> {
        let styles = Styles::new(should_colorize);
        let rule = "-".repeat(42);
        let failed_style = |count: u64| {
            if count > 0 {
                styles.fail
            } else {
                styles.count
            }
        };

        writeln!(writer, "{rule}")?;
        writeln!(writer, "{:<12}{:>15}{:>15}", "", "Total", "Failed")?;
        for (label, total, failed) in [
            ("Modules", self.modules_total as u64, self.modules_failed as u64),
            ("Tests", self.tests_total as u64, self.tests_failed as u64),
            ("Asserts", self.asserts_total, self.asserts_failed),
        ] {
            writeln!(
                writer,
                "{:<12}{:>15}{:>15}",
                label,
                total.style(styles.count),
                failed.style(failed_style(failed)),
            )?;
        }
        writeln!(writer, "{rule}")?;
        writeln!(writer, "{:<12}{:>29.3}s", "Duration", self.duration.as_secs_f64())?;
        writeln!(writer, "{:<12}{:>29.3}s", "CPU time", self.cpu_time.as_secs_f64())?;

        let status = if self.is_success() {
            "PASSED".style(styles.pass)
        } else {
            "FAILED".style(styles.fail)
        };
        writeln!(
            writer,
            "{:>12} {} {} across {} {}",
            status,
            self.tests_total,
            plural::tests_str(self.tests_total),
            self.modules_total,
            plural::modules_str(self.modules_total),
        )
    }
}

/// Aggregates test events into a [`RunSummary`].
#[derive(Debug, Default)]
pub struct SummaryAggregator {
    summary: RunSummary,
    // Whether each running module has failed so far.
    running: BTreeMap<ModuleIndex, bool>,
}

impl SummaryAggregator {
    /// Creates a new aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the statistics so far.
    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    fn mark_failed(&mut self, index: ModuleIndex) {
        self.running.insert(index, true);
    }
}

impl<'a> EventObserver<'a> for SummaryAggregator {
    fn handle_event(&mut self, event: &TestEvent<'a>) -> Result<(), WriteEventError> {
        let index = event.module.index();
        match &event.event {
            ModuleEvent::ModuleStart { .. } => {
                self.summary.modules_total = self.summary.modules_total.saturating_add(1);
                self.running.insert(index, false);
            }
            ModuleEvent::TestcaseEnd(end) => {
                // Values come straight from the module, so they may be arbitrarily large.
                let summary = &mut self.summary;
                summary.tests_total = summary.tests_total.saturating_add(1);
                summary.asserts_total = summary.asserts_total.saturating_add(end.asserts);
                summary.asserts_failed = summary
                    .asserts_failed
                    .saturating_add(end.failures.len() as u64);
                summary.duration = summary.duration.saturating_add(end.duration());
                summary.cpu_time = summary.cpu_time.saturating_add(end.cpu_time());
                if !end.success {
                    summary.tests_failed = summary.tests_failed.saturating_add(1);
                    self.mark_failed(index);
                }
            }
            ModuleEvent::TestcaseError { .. } => {
                self.summary.tests_total = self.summary.tests_total.saturating_add(1);
                self.summary.tests_failed = self.summary.tests_failed.saturating_add(1);
                self.mark_failed(index);
            }
            ModuleEvent::ModuleEnd => {
                if self.running.remove(&index) == Some(true) {
                    self.summary.modules_failed = self.summary.modules_failed.saturating_add(1);
                }
            }
            ModuleEvent::TestcaseStart { .. } | ModuleEvent::TestcaseList(_) => {}
        }
        Ok(())
    }
}
