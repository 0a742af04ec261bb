// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{EventObserver, TestEvent};
use crate::{
    errors::WriteEventError,
    test_module::{ModuleIndex, TestCase},
};
use scu_metadata::ModuleEvent;
use std::collections::BTreeMap;
use tracing::warn;

/// Collects the tests listed by modules during discovery.
///
/// Install the result with [`ModuleList::set_test_cases`](crate::test_module::ModuleList::set_test_cases)
/// once discovery has finished.
#[derive(Debug, Default)]
pub struct DiscoveryCollector {
    test_cases: BTreeMap<ModuleIndex, Vec<TestCase>>,
}

impl DiscoveryCollector {
    /// Creates a new, empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the test cases collected so far, by module.
    pub fn into_test_lists(self) -> BTreeMap<ModuleIndex, Vec<TestCase>> {
        self.test_cases
    }
}

impl<'a> EventObserver<'a> for DiscoveryCollector {
    fn handle_event(&mut self, event: &TestEvent<'a>) -> Result<(), WriteEventError> {
        let index = event.module.index();
        match &event.event {
            ModuleEvent::ModuleStart { .. } => {
                self.test_cases.entry(index).or_default();
            }
            ModuleEvent::TestcaseList(summary) => {
                self.test_cases
                    .entry(index)
                    .or_default()
                    .push(summary.clone().into());
            }
            ModuleEvent::TestcaseError { message, crash } => {
                let listed = self.test_cases.get(&index).map_or(0, Vec::len);
                if *crash {
                    warn!(
                        "{}: module failed while listing tests ({listed} listed): {message}",
                        event.module.path(),
                    );
                } else {
                    warn!("{}: error while listing tests: {message}", event.module.path());
                }
            }
            ModuleEvent::TestcaseStart { .. } | ModuleEvent::TestcaseEnd(_) => {
                warn!(
                    "{}: ignoring unexpected {} event while listing tests",
                    event.module.path(),
                    event.event.kind_str(),
                );
            }
            ModuleEvent::ModuleEnd => {}
        }
        Ok(())
    }
}
