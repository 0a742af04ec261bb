// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tests that drive the runner library directly against fake modules.

use crate::fixtures::FakeModules;
use camino::Utf8PathBuf;
use color_eyre::Result;
use integration_tests::module_script::{ModuleScript, ScriptedOutcome, ScriptedTest};
use pretty_assertions::assert_eq;
use scu_metadata::ModuleEvent;
use scu_runner::{
    config::TestThreads,
    errors::WriteEventError,
    reporter::{
        DiscoveryCollector, EventBus, EventObserver, ReorderingLayer, RunSummary,
        SummaryAggregator, TestEvent,
    },
    runner::{ModuleRunner, ModuleRunnerBuilder},
    test_filter::{FilterPredicate, TestFilter},
    test_module::ModuleList,
};

#[derive(Debug, Default)]
struct Recorder {
    events: Vec<(usize, ModuleEvent)>,
}

impl<'a> EventObserver<'a> for Recorder {
    fn handle_event(&mut self, event: &TestEvent<'a>) -> Result<(), WriteEventError> {
        self.events
            .push((event.module.index().as_usize(), event.event.clone()));
        Ok(())
    }
}

fn runner(threads: usize) -> Result<ModuleRunner> {
    let mut builder = ModuleRunnerBuilder::default();
    builder.set_test_threads(TestThreads::Count(threads));
    Ok(builder.build()?)
}

fn discover(runner: &ModuleRunner, paths: Vec<Utf8PathBuf>) -> Result<ModuleList> {
    let mut modules = ModuleList::new(paths);
    let mut collector = DiscoveryCollector::new();
    {
        let mut bus = EventBus::new();
        bus.subscribe(&mut collector);
        runner.discover(&modules, &mut bus)?;
    }
    modules.set_test_cases(collector.into_test_lists());
    Ok(modules)
}

/// Runs every selected test, returning the reordered event stream and the summary.
fn execute(
    runner: &ModuleRunner,
    modules: &ModuleList,
    filter: &TestFilter,
) -> Result<(Vec<(usize, ModuleEvent)>, RunSummary)> {
    let plan = filter.plan(modules);
    let mut recorder = Recorder::default();
    let mut summary = SummaryAggregator::new();
    {
        let mut downstream = EventBus::new();
        downstream.subscribe(&mut recorder).subscribe(&mut summary);
        let mut reorder = ReorderingLayer::new(downstream);
        {
            let mut bus = EventBus::new();
            bus.subscribe(&mut reorder);
            runner.execute(&plan, &mut bus)?;
        }
        assert!(reorder.is_drained(), "every event was forwarded");
    }
    Ok((recorder.events, summary.summary()))
}

fn kinds(events: &[(usize, ModuleEvent)]) -> Vec<(usize, &'static str)> {
    events
        .iter()
        .map(|(index, event)| (*index, event.kind_str()))
        .collect()
}

#[test]
fn modules_are_reported_contiguously() -> Result<()> {
    let modules = FakeModules::new()?;
    let slow_tests = (0..3).map(|i| ScriptedTest::new(format!("slow_{i}")));
    let slow = modules.add(
        "slow",
        &ModuleScript {
            delay_ms: 50,
            ..ModuleScript::new(slow_tests)
        },
    )?;
    let fast = modules.add(
        "fast",
        &ModuleScript::new((0..3).map(|i| ScriptedTest::new(format!("fast_{i}")))),
    )?;

    let runner = runner(2)?;
    let list = discover(&runner, vec![slow, fast])?;
    assert_eq!(list.test_count(), 6);

    let (events, summary) = execute(&runner, &list, &TestFilter::default())?;
    assert_eq!(events.len(), 2 * (1 + 3 * 2 + 1));

    // Each module's events form one contiguous block, bracketed by module_start and module_end.
    let blocks: Vec<_> = events.chunk_by(|a, b| a.0 == b.0).collect();
    assert_eq!(blocks.len(), 2, "{:?}", kinds(&events));
    for block in blocks {
        assert_eq!(block.first().map(|e| e.1.kind_str()), Some("module_start"));
        assert_eq!(block.last().map(|e| e.1.kind_str()), Some("module_end"));
    }

    assert!(summary.is_success());
    assert_eq!(summary.modules_total, 2);
    assert_eq!(summary.tests_total, 6);
    assert_eq!(summary.asserts_total, 6);
    Ok(())
}

#[test]
fn crash_counts_as_extra_failure() -> Result<()> {
    let modules = FakeModules::new()?;
    let crashy = modules.add(
        "crashy",
        &ModuleScript::new([
            ScriptedTest::new("fails").outcome(ScriptedOutcome::Fail),
            ScriptedTest::new("crashes").outcome(ScriptedOutcome::Crash { exit_code: 2 }),
        ]),
    )?;

    let runner = runner(1)?;
    let list = discover(&runner, vec![crashy])?;
    let (events, summary) = execute(&runner, &list, &TestFilter::default())?;

    assert_eq!(
        kinds(&events),
        [
            (0, "module_start"),
            (0, "testcase_start"),
            (0, "testcase_end"),
            (0, "testcase_start"),
            (0, "testcase_error"),
            (0, "module_end"),
        ]
    );
    assert_eq!(
        events[4].1,
        ModuleEvent::crash("Test module crashed (exit code 2)")
    );

    assert!(!summary.is_success());
    assert_eq!(summary.modules_failed, 1);
    assert_eq!(summary.tests_total, 2);
    assert_eq!(summary.tests_failed, 2);
    assert_eq!(summary.asserts_failed, 1);
    Ok(())
}

#[test]
fn malformed_lines_and_missing_module_start() -> Result<()> {
    let modules = FakeModules::new()?;
    let sloppy = modules.add(
        "sloppy",
        &ModuleScript {
            omit_module_start: true,
            ..ModuleScript::new([
                ScriptedTest::new("garbled").outcome(ScriptedOutcome::Malformed),
                ScriptedTest::new("errors").outcome(ScriptedOutcome::Error {
                    message: "fixture setup failed".to_owned(),
                }),
            ])
        },
    )?;

    let runner = runner(1)?;
    let list = discover(&runner, vec![sloppy])?;
    let (events, summary) = execute(&runner, &list, &TestFilter::default())?;

    assert_eq!(
        events[0].1,
        ModuleEvent::ModuleStart {
            name: "sloppy".to_owned()
        }
    );
    assert_eq!(events[2].1, ModuleEvent::parse_error());
    assert_eq!(
        events[4].1,
        ModuleEvent::TestcaseError {
            message: "fixture setup failed".to_owned(),
            crash: false,
        }
    );
    assert_eq!(events.last().map(|e| &e.1), Some(&ModuleEvent::ModuleEnd));

    assert_eq!(summary.tests_failed, 2);
    assert_eq!(summary.modules_failed, 1);
    Ok(())
}

#[test]
fn only_selected_tests_run() -> Result<()> {
    let modules = FakeModules::new()?;
    let (math, strings) = modules.add_standard()?;

    let runner = runner(4)?;
    let list = discover(&runner, vec![math, strings])?;
    let filter = TestFilter::new(vec![
        FilterPredicate::tag("slow", false),
        FilterPredicate::tag("fast", true),
    ]);
    let (events, summary) = execute(&runner, &list, &filter)?;

    let started: Vec<_> = events
        .iter()
        .filter_map(|(module, event)| match event {
            ModuleEvent::TestcaseStart { index, .. } => Some((*module, *index)),
            _ => None,
        })
        .collect();
    // strings::split is the only test tagged slow but not fast.
    assert_eq!(started, [(1, 1)]);
    assert_eq!(summary.modules_total, 1);
    assert_eq!(summary.tests_failed, 1);
    Ok(())
}
