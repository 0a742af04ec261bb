// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    executor::{ChildExit, JobMessage, drive_child},
    job::JobState,
};
use crate::{
    config::{DebuggerConfig, MemcheckConfig, TestThreads},
    errors::{ChildStartError, ModuleRunnerBuildError, RunnerExecuteError, WriteEventError},
    reporter::{EventBus, TestEvent},
    test_command::{LaunchContext, ModuleCommand, ModuleInvocation},
    test_filter::RunPlan,
    test_module::{ModuleIndex, ModuleList, TestModule},
};
use scu_metadata::ModuleEvent;
use std::collections::{BTreeMap, VecDeque};
use tokio::{
    runtime::Runtime,
    sync::mpsc::{UnboundedSender, unbounded_channel},
};
use tracing::{debug, info, warn};

/// Module runner options.
#[derive(Debug, Default)]
pub struct ModuleRunnerBuilder {
    test_threads: Option<TestThreads>,
    memcheck: Option<MemcheckConfig>,
    debugger: Option<DebuggerConfig>,
}

impl ModuleRunnerBuilder {
    /// Sets the number of module processes to run simultaneously.
    ///
    /// Defaults to the number of logical CPUs.
    pub fn set_test_threads(&mut self, test_threads: TestThreads) -> &mut Self {
        self.test_threads = Some(test_threads);
        self
    }

    /// Runs tests under the memory checker.
    ///
    /// Only affects [`ModuleRunner::execute`]: discovery always runs modules directly.
    pub fn set_memcheck(&mut self, memcheck: MemcheckConfig) -> &mut Self {
        self.memcheck = Some(memcheck);
        self
    }

    /// Enables debug mode.
    ///
    /// In debug mode, modules are asked to wait for a debugger before running tests, the attach
    /// command is logged for each of them, and tests run one module at a time.
    pub fn set_debugger(&mut self, debugger: DebuggerConfig) -> &mut Self {
        self.debugger = Some(debugger);
        self
    }

    /// Creates a new module runner.
    pub fn build(self) -> Result<ModuleRunner, ModuleRunnerBuildError> {
        let test_threads = self
            .test_threads
            .unwrap_or(TestThreads::NumCpus)
            .compute()
            .max(1);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .thread_name("scu-runner-worker")
            .build()
            .map_err(ModuleRunnerBuildError::TokioRuntimeCreate)?;

        Ok(ModuleRunner {
            test_threads,
            memcheck: self.memcheck,
            debugger: self.debugger,
            runtime,
        })
    }
}

/// Runs test modules as child processes.
///
/// Created using [`ModuleRunnerBuilder::build`].
#[derive(Debug)]
pub struct ModuleRunner {
    test_threads: usize,
    memcheck: Option<MemcheckConfig>,
    debugger: Option<DebuggerConfig>,
    runtime: Runtime,
}

impl ModuleRunner {
    /// Returns the maximum number of module processes run at once during discovery.
    pub fn test_threads(&self) -> usize {
        self.test_threads
    }

    /// Returns the maximum number of module processes run at once while running tests.
    pub fn execute_threads(&self) -> usize {
        if self.debugger.is_some() {
            1
        } else {
            self.test_threads
        }
    }

    /// Runs every module in list mode, publishing its events on `bus`.
    ///
    /// Modules are started in order. Each module's events are published in the order the module
    /// wrote them, but events from different modules may interleave.
    pub fn discover<'a>(
        &self,
        modules: &'a ModuleList,
        bus: &mut EventBus<'_, 'a>,
    ) -> Result<(), RunnerExecuteError> {
        let jobs = modules
            .iter()
            .map(|module| Job {
                module,
                invocation: ModuleInvocation::List,
            })
            .collect();
        debug!(
            "discovering tests in {} modules, {} at a time",
            modules.len(),
            self.test_threads
        );
        self.run_jobs(jobs, self.test_threads, bus)
    }

    /// Runs the selected tests of every module in `plan`, publishing events on `bus`.
    ///
    /// Modules are started in order. Each module's events are published in the order the module
    /// wrote them, but events from different modules may interleave.
    pub fn execute<'a>(
        &self,
        plan: &RunPlan<'a>,
        bus: &mut EventBus<'_, 'a>,
    ) -> Result<(), RunnerExecuteError> {
        let jobs = plan
            .modules()
            .iter()
            .map(|planned| Job {
                module: planned.module(),
                invocation: ModuleInvocation::Run(planned.indices()),
            })
            .collect();
        let limit = self.execute_threads();
        debug!(
            "running {} tests across {} modules, {limit} at a time",
            plan.test_count(),
            plan.modules().len(),
        );
        self.run_jobs(jobs, limit, bus)
    }

    fn run_jobs<'a>(
        &self,
        jobs: VecDeque<Job<'a, '_>>,
        limit: usize,
        bus: &mut EventBus<'_, 'a>,
    ) -> Result<(), RunnerExecuteError> {
        let launch = LaunchContext {
            memcheck: self.memcheck.as_ref(),
            debug: self.debugger.is_some(),
        };
        let mut publisher = Publisher {
            bus,
            first_error: None,
        };

        self.runtime.block_on(async {
            let (sender, mut receiver) = unbounded_channel();
            let mut pending = jobs;
            let mut running: BTreeMap<ModuleIndex, JobState<'a>> = BTreeMap::new();

            loop {
                while running.len() < limit {
                    let Some(job) = pending.pop_front() else {
                        break;
                    };
                    let mut state = JobState::new(job.module);
                    match self.start_job(&job, &launch, &sender) {
                        Ok(()) => {
                            running.insert(job.module.index(), state);
                        }
                        Err(error) => {
                            warn!("{error}: {}", error.io_error());
                            let crash_message = ChildExit::SpawnFailed(error).crash_message();
                            publisher.publish_all(job.module, state.on_exit(crash_message));
                        }
                    }
                }

                if running.is_empty() {
                    break;
                }

                // The sender is held here, so recv only returns None if every reader task is gone.
                let Some(message) = receiver.recv().await else {
                    break;
                };
                match message {
                    JobMessage::Output { index, data } => {
                        if let Some(state) = running.get_mut(&index) {
                            let events = state.on_output(&data);
                            publisher.publish_all(state.module(), events);
                        }
                    }
                    JobMessage::Exited { index, exit } => {
                        if let Some(mut state) = running.remove(&index) {
                            debug!("{} exited: {exit:?}", state.module().name());
                            let events = state.on_exit(exit.crash_message());
                            publisher.publish_all(state.module(), events);
                        }
                    }
                }
            }
        });

        publisher.finish()
    }

    fn start_job(
        &self,
        job: &Job<'_, '_>,
        launch: &LaunchContext<'_>,
        sender: &UnboundedSender<JobMessage>,
    ) -> Result<(), ChildStartError> {
        let command = ModuleCommand::new(job.module, job.invocation, launch);
        debug!("starting `{command}`");
        let child = command.spawn()?;

        if let (Some(debugger), ModuleInvocation::Run(_)) = (&self.debugger, job.invocation) {
            match child.id() {
                Some(pid) => info!(
                    "{} (pid {pid}) is waiting for a debugger, attach with:\n  {}",
                    job.module.name(),
                    debugger.attach_command_for(pid),
                ),
                None => warn!("{} exited before it could be debugged", job.module.name()),
            }
        }

        tokio::spawn(drive_child(job.module.index(), child, sender.clone()));
        Ok(())
    }
}

#[derive(Debug)]
struct Job<'a, 'p> {
    module: &'a TestModule,
    invocation: ModuleInvocation<'p>,
}

/// Publishes events, carrying on past observer errors.
struct Publisher<'bus, 'obs, 'a> {
    bus: &'bus mut EventBus<'obs, 'a>,
    first_error: Option<WriteEventError>,
}

impl<'a> Publisher<'_, '_, 'a> {
    fn publish_all(&mut self, module: &'a TestModule, events: Vec<ModuleEvent>) {
        for event in events {
            if let Err(error) = self.bus.publish(&TestEvent::new(module, event)) {
                debug!("error publishing event for {}: {error}", module.name());
                self.first_error.get_or_insert(error);
            }
        }
    }

    fn finish(self) -> Result<(), RunnerExecuteError> {
        match self.first_error {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::test_helpers::RecordingObserver;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(TestThreads::Count(4), 4 ; "count")]
    #[test_case(TestThreads::Count(0), 1 ; "zero is clamped")]
    fn builder_test_threads(test_threads: TestThreads, expected: usize) {
        let mut builder = ModuleRunnerBuilder::default();
        builder.set_test_threads(test_threads);
        let runner = builder.build().unwrap();
        assert_eq!(runner.test_threads(), expected);
        assert_eq!(runner.execute_threads(), expected);
    }

    #[test]
    fn debugger_runs_one_module_at_a_time() {
        let mut builder = ModuleRunnerBuilder::default();
        builder
            .set_test_threads(TestThreads::Count(8))
            .set_debugger(DebuggerConfig {
                attach_command: vec!["gdb".to_owned(), "-p".to_owned(), "{pid}".to_owned()],
            });
        let runner = builder.build().unwrap();
        assert_eq!(runner.test_threads(), 8);
        assert_eq!(runner.execute_threads(), 1);
    }

    #[test]
    fn missing_module_is_reported_as_crash() {
        let modules = ModuleList::new(["/nonexistent/scu/test_missing"]);
        let runner = ModuleRunnerBuilder::default().build().unwrap();
        let mut recorder = RecordingObserver::default();
        let mut bus = EventBus::new();
        bus.subscribe(&mut recorder);
        runner.discover(&modules, &mut bus).unwrap();
        drop(bus);

        let kinds: Vec<_> = recorder
            .events
            .iter()
            .map(|(_, event)| event.kind_str())
            .collect();
        assert_eq!(kinds, ["module_start", "testcase_error", "module_end"]);
        let ModuleEvent::TestcaseError { message, crash } = &recorder.events[1].1 else {
            panic!("expected testcase_error, got {:?}", recorder.events[1].1);
        };
        assert!(*crash);
        assert!(
            message.starts_with("Test module could not be started: /nonexistent/scu/test_missing"),
            "unexpected message: {message}"
        );
    }

    #[cfg(unix)]
    mod scripts {
        use super::*;
        use camino::Utf8Path;
        use camino_tempfile::Utf8TempDir;
        use indoc::indoc;
        use pretty_assertions::assert_eq;
        use std::{fs, os::unix::fs::PermissionsExt};

        fn write_script(dir: &Utf8Path, name: &str, body: &str) {
            let path = dir.join(name);
            fs::write(&path, body).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }

        #[test]
        fn crash_after_passing_test() {
            let dir = Utf8TempDir::new().unwrap();
            write_script(
                dir.path(),
                "test_crash",
                indoc! {r#"
                    #!/bin/sh
                    echo '{"event":"module_start","name":"test_crash"}'
                    echo '{"event":"testcase_start","index":0,"output":"/dev/null"}'
                    echo '{"event":"testcase_end","index":0,"success":true,"duration":0.5,"cpu_time":0.25,"asserts":2,"failures":[]}'
                    echo 'not json'
                    exit 3
                "#},
            );
            let mut modules = ModuleList::new([dir.path().join("test_crash")]);
            modules.set_test_cases(BTreeMap::from([(
                ModuleIndex::new(0),
                vec![crate::test_module::TestCase {
                    name: "adds".to_owned(),
                    description: String::new(),
                    tags: vec![],
                }],
            )]));
            let plan = crate::test_filter::TestFilter::default().plan(&modules);

            let runner = ModuleRunnerBuilder::default().build().unwrap();
            let mut recorder = RecordingObserver::default();
            let mut bus = EventBus::new();
            bus.subscribe(&mut recorder);
            runner.execute(&plan, &mut bus).unwrap();
            drop(bus);

            let events: Vec<_> = recorder.events.into_iter().map(|(_, e)| e).collect();
            assert_eq!(events.len(), 6, "events: {events:?}");
            assert_eq!(events[3], ModuleEvent::parse_error());
            assert_eq!(
                events[4],
                ModuleEvent::crash("Test module crashed (exit code 3)")
            );
            assert_eq!(events[5], ModuleEvent::ModuleEnd);
        }

        #[test]
        fn modules_run_concurrently_up_to_limit() {
            let dir = Utf8TempDir::new().unwrap();
            for name in ["test_a", "test_b", "test_c"] {
                write_script(
                    dir.path(),
                    name,
                    indoc! {r#"
                        #!/bin/sh
                        echo '{"event":"module_start","name":"m"}'
                        echo '{"event":"testcase_list","name":"only","description":"","tags":["fast"]}'
                        echo '{"event":"module_end"}'
                    "#},
                );
            }
            let modules = ModuleList::new(
                ["test_a", "test_b", "test_c"].map(|name| dir.path().join(name)),
            );

            let mut builder = ModuleRunnerBuilder::default();
            builder.set_test_threads(TestThreads::Count(2));
            let runner = builder.build().unwrap();
            let mut recorder = RecordingObserver::default();
            let mut bus = EventBus::new();
            bus.subscribe(&mut recorder);
            runner.discover(&modules, &mut bus).unwrap();
            drop(bus);

            for index in 0..3 {
                let kinds: Vec<_> = recorder
                    .events
                    .iter()
                    .filter(|(i, _)| i.as_usize() == index)
                    .map(|(_, event)| event.kind_str())
                    .collect();
                assert_eq!(
                    kinds,
                    ["module_start", "testcase_list", "module_end"],
                    "module {index}"
                );
            }
        }
    }
}
