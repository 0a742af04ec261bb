// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{protocol::LineDecoder, test_module::TestModule};
use scu_metadata::ModuleEvent;
use tracing::warn;

/// Message for a test that was still running when its module exited successfully.
pub(super) const UNFINISHED_TEST_MESSAGE: &str = "Test module exited before the test finished";

/// The per-phase state of one running module.
///
/// Turns the raw output of a module into a well-formed event stream: exactly one `module_start`
/// first, exactly one `module_end` last, and one terminal event for every started test.
#[derive(Debug)]
pub(super) struct JobState<'a> {
    module: &'a TestModule,
    decoder: LineDecoder,
    started: bool,
    in_test: bool,
    end_seen: bool,
}

impl<'a> JobState<'a> {
    pub(super) fn new(module: &'a TestModule) -> Self {
        Self {
            module,
            decoder: LineDecoder::new(),
            started: false,
            in_test: false,
            end_seen: false,
        }
    }

    pub(super) fn module(&self) -> &'a TestModule {
        self.module
    }

    /// Decodes a chunk of output, returning the events to publish.
    pub(super) fn on_output(&mut self, data: &[u8]) -> Vec<ModuleEvent> {
        let mut out = Vec::new();
        for event in self.decoder.feed(data) {
            self.push(event, &mut out);
        }
        out
    }

    /// Closes the stream once the process has exited, returning the remaining events to publish.
    ///
    /// `crash_message` is set if the process exited abnormally or couldn't be run at all.
    pub(super) fn on_exit(&mut self, crash_message: Option<String>) -> Vec<ModuleEvent> {
        let mut out = Vec::new();
        if let Some(event) = self.decoder.finish() {
            self.push(event, &mut out);
        }

        self.ensure_started(&mut out);
        match crash_message {
            Some(message) => out.push(ModuleEvent::crash(message)),
            None if self.in_test => out.push(ModuleEvent::TestcaseError {
                message: UNFINISHED_TEST_MESSAGE.to_owned(),
                crash: false,
            }),
            None => {}
        }
        self.in_test = false;
        self.end_seen = true;
        out.push(ModuleEvent::ModuleEnd);
        out
    }

    fn push(&mut self, event: ModuleEvent, out: &mut Vec<ModuleEvent>) {
        if self.end_seen {
            warn!(
                "{}: ignoring {} event after module_end",
                self.module.path(),
                event.kind_str(),
            );
            return;
        }

        match event {
            ModuleEvent::ModuleStart { .. } if self.started => {
                warn!("{}: ignoring repeated module_start event", self.module.path());
            }
            ModuleEvent::ModuleStart { .. } => {
                self.started = true;
                out.push(event);
            }
            // Held back until the process exits, so a crash can still be reported before it.
            ModuleEvent::ModuleEnd => {
                self.ensure_started(out);
                self.end_seen = true;
            }
            event => {
                self.ensure_started(out);
                if matches!(event, ModuleEvent::TestcaseStart { .. }) {
                    self.in_test = true;
                } else if event.is_test_terminal() {
                    self.in_test = false;
                }
                out.push(event);
            }
        }
    }

    fn ensure_started(&mut self, out: &mut Vec<ModuleEvent>) {
        if !self.started {
            self.started = true;
            out.push(ModuleEvent::ModuleStart {
                name: self.module.name().to_owned(),
            });
        }
    }
}
