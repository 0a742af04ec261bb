// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{errors::WriteEventError, test_module::TestModule};
use scu_metadata::ModuleEvent;

/// A test event, along with the module it came from.
#[derive(Clone, Debug)]
pub struct TestEvent<'a> {
    /// The module that produced this event.
    pub module: &'a TestModule,

    /// The event itself.
    pub event: ModuleEvent,
}

impl<'a> TestEvent<'a> {
    /// Creates a new test event.
    pub fn new(module: &'a TestModule, event: ModuleEvent) -> Self {
        Self { module, event }
    }
}

/// A subscriber to test events.
///
/// Observers are registered on an [`EventBus`](super::EventBus), and receive every event
/// published on it in publication order.
pub trait EventObserver<'a> {
    /// Handles a single event.
    ///
    /// An error does not stop the run. The runner keeps publishing events and returns the first
    /// error at the end.
    fn handle_event(&mut self, event: &TestEvent<'a>) -> Result<(), WriteEventError>;
}
