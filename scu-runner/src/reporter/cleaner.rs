// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{EventObserver, TestEvent};
use crate::{errors::WriteEventError, test_module::ModuleIndex};
use camino::{Utf8Path, Utf8PathBuf};
use scu_metadata::ModuleEvent;
use std::{collections::BTreeMap, fs, io};
use tracing::{debug, warn};

/// Deletes the output file of each test once the test has finished.
///
/// Must be registered after every observer that reads output files.
#[derive(Debug, Default)]
pub struct OutputCleaner {
    live: BTreeMap<ModuleIndex, Utf8PathBuf>,
}

impl OutputCleaner {
    /// Creates a new output cleaner.
    pub fn new() -> Self {
        Self::default()
    }

    fn remove(path: &Utf8Path) {
        match fs::remove_file(path) {
            Ok(()) => debug!("removed output file {path}"),
            // The module may not have written anything.
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => warn!("failed to remove output file {path}: {error}"),
        }
    }
}

impl<'a> EventObserver<'a> for OutputCleaner {
    fn handle_event(&mut self, event: &TestEvent<'a>) -> Result<(), WriteEventError> {
        let index = event.module.index();
        match &event.event {
            ModuleEvent::TestcaseStart { output, .. } => {
                self.live.insert(index, output.clone());
            }
            ModuleEvent::TestcaseEnd(_) | ModuleEvent::TestcaseError { .. } => {
                if let Some(path) = self.live.remove(&index) {
                    Self::remove(&path);
                }
            }
            ModuleEvent::ModuleEnd => {
                self.live.remove(&index);
            }
            ModuleEvent::ModuleStart { .. } | ModuleEvent::TestcaseList(_) => {}
        }
        Ok(())
    }
}
