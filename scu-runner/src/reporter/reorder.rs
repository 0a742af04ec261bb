// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{EventBus, EventObserver, TestEvent};
use crate::{errors::WriteEventError, test_module::ModuleIndex};
use scu_metadata::ModuleEvent;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Turns the interleaved events of concurrently running modules into contiguous per-module
/// blocks.
///
/// At most one module is *active*. Events of the active module are forwarded downstream as they
/// arrive; events of every other module are buffered. When the active module ends, modules that
/// finished in the meantime are flushed, most recently finished first. Then the buffered module
/// with the lowest index, if any, becomes active and its buffer is flushed.
///
/// Every event that enters the layer is forwarded exactly once, and the events of each module
/// keep their relative order.
#[derive(Debug)]
pub struct ReorderingLayer<'obs, 'a> {
    downstream: EventBus<'obs, 'a>,
    active: Option<ModuleIndex>,
    buffers: BTreeMap<ModuleIndex, VecDeque<TestEvent<'a>>>,
    // Modules that ended while another module was active, most recently finished last.
    finished: Vec<ModuleIndex>,
}

impl<'obs, 'a> ReorderingLayer<'obs, 'a> {
    /// Creates a new reordering layer that forwards events to `downstream`.
    pub fn new(downstream: EventBus<'obs, 'a>) -> Self {
        Self {
            downstream,
            active: None,
            buffers: BTreeMap::new(),
            finished: Vec::new(),
        }
    }

    /// Returns the currently active module, if any.
    pub fn active(&self) -> Option<ModuleIndex> {
        self.active
    }

    /// Returns true if no events are held back.
    pub fn is_drained(&self) -> bool {
        self.buffers.values().all(VecDeque::is_empty) && self.finished.is_empty()
    }

    fn advance(&mut self) -> Result<(), WriteEventError> {
        self.active = None;
        let mut first_error = None;

        while let Some(index) = self.finished.pop() {
            debug!(module = %index, "flushing finished module");
            if let Err(error) = self.flush(index) {
                first_error.get_or_insert(error);
            }
        }

        let next = self
            .buffers
            .iter()
            .find_map(|(&index, queue)| (!queue.is_empty()).then_some(index));
        if let Some(index) = next {
            debug!(module = %index, "module is now active");
            self.active = Some(index);
            if let Err(error) = self.flush(index) {
                first_error.get_or_insert(error);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn flush(&mut self, index: ModuleIndex) -> Result<(), WriteEventError> {
        let mut first_error = None;
        for event in self.buffers.remove(&index).unwrap_or_default() {
            if let Err(error) = self.downstream.publish(&event) {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<'a> EventObserver<'a> for ReorderingLayer<'_, 'a> {
    fn handle_event(&mut self, event: &TestEvent<'a>) -> Result<(), WriteEventError> {
        let index = event.module.index();
        if self.active.is_none() && matches!(event.event, ModuleEvent::ModuleStart { .. }) {
            self.active = Some(index);
        }

        let is_active = self.active == Some(index);
        let mut res = if is_active {
            self.downstream.publish(event)
        } else {
            self.buffers
                .entry(index)
                .or_default()
                .push_back(event.clone());
            Ok(())
        };

        if matches!(event.event, ModuleEvent::ModuleEnd) {
            if is_active {
                res = res.and(self.advance());
            } else {
                self.finished.push(index);
            }
        }

        res
    }
}
