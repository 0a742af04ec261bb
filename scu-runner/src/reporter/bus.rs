// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{EventObserver, TestEvent};
use crate::errors::WriteEventError;
use debug_ignore::DebugIgnore;

/// Fans test events out to a list of observers.
///
/// Observers are borrowed for the lifetime of the bus, so that they can be inspected once the
/// bus is dropped. They are invoked in registration order: for example, an observer that deletes
/// output files must be registered after the observer that prints them.
#[derive(Debug, Default)]
pub struct EventBus<'obs, 'a> {
    observers: DebugIgnore<Vec<&'obs mut dyn EventObserver<'a>>>,
}

impl<'obs, 'a> EventBus<'obs, 'a> {
    /// Creates a new bus with no observers.
    pub fn new() -> Self {
        Self {
            observers: DebugIgnore(Vec::new()),
        }
    }

    /// Registers an observer at the end of the list.
    pub fn subscribe(&mut self, observer: &'obs mut dyn EventObserver<'a>) -> &mut Self {
        self.observers.push(observer);
        self
    }

    /// Returns the number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns true if no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Delivers `event` to every observer in registration order.
    ///
    /// Every observer sees the event even if an earlier one fails. The first error is returned.
    pub fn publish(&mut self, event: &TestEvent<'a>) -> Result<(), WriteEventError> {
        let mut first_error = None;
        for observer in self.observers.iter_mut() {
            if let Err(error) = observer.handle_event(event) {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        reporter::test_helpers::RecordingObserver,
        test_module::{ModuleIndex, TestModule},
    };
    use pretty_assertions::assert_eq;
    use scu_metadata::ModuleEvent;

    #[test]
    fn publishes_in_registration_order_past_errors() {
        let module = TestModule::new(ModuleIndex::new(3), "m");
        let mut failing = RecordingObserver {
            fail: true,
            ..Default::default()
        };
        let mut recording = RecordingObserver::default();

        {
            let mut bus = EventBus::new();
            bus.subscribe(&mut failing).subscribe(&mut recording);
            assert_eq!(bus.len(), 2);
            let error = bus
                .publish(&TestEvent::new(&module, ModuleEvent::ModuleEnd))
                .expect_err("first observer fails");
            assert!(matches!(error, WriteEventError::Io(_)));
        }

        assert_eq!(failing.events, vec![(ModuleIndex::new(3), ModuleEvent::ModuleEnd)]);
        assert_eq!(recording.events, failing.events);
    }
}
