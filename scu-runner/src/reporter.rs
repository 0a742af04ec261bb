// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Distributes, reorders, prints out and aggregates test events.
//!
//! Events from the runner are published on an [`EventBus`] to every registered
//! [`EventObserver`]. During a run, the only observer on the runner's bus is a
//! [`ReorderingLayer`], which makes sure that the events of one module are never interleaved
//! with those of another, and republishes them on its own bus to the reporting observers.

mod bus;
mod cleaner;
mod collector;
mod displayer;
mod events;
mod helpers;
mod reorder;
mod summary;

pub use bus::*;
pub use cleaner::*;
pub use collector::*;
pub use displayer::*;
pub use events::*;
pub use reorder::*;
pub use summary::*;

use crate::errors::TestOutputDisplayParseError;
use serde::Deserialize;
use std::{fmt, str::FromStr};

/// When to display the output file of a test in the reporter.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestOutputDisplay {
    /// Show output as soon as the test finishes.
    ///
    /// This is the default for failing tests.
    Immediate,

    /// Never show output.
    ///
    /// This is the default for passing tests.
    Never,
}

impl TestOutputDisplay {
    /// String representations of all known variants.
    pub fn variants() -> &'static [&'static str] {
        &["immediate", "never"]
    }

    /// Returns true if test output is shown immediately.
    pub fn is_immediate(self) -> bool {
        match self {
            TestOutputDisplay::Immediate => true,
            TestOutputDisplay::Never => false,
        }
    }
}

impl FromStr for TestOutputDisplay {
    type Err = TestOutputDisplayParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let val = match s {
            "immediate" => TestOutputDisplay::Immediate,
            "never" => TestOutputDisplay::Never,
            other => return Err(TestOutputDisplayParseError::new(other)),
        };
        Ok(val)
    }
}

impl fmt::Display for TestOutputDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestOutputDisplay::Immediate => write!(f, "immediate"),
            TestOutputDisplay::Never => write!(f, "never"),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::{EventObserver, TestEvent};
    use crate::{errors::WriteEventError, test_module::ModuleIndex};
    use scu_metadata::ModuleEvent;
    use std::io;

    /// Records every event it sees as `(module index, event)`.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingObserver {
        pub(crate) events: Vec<(ModuleIndex, ModuleEvent)>,
        pub(crate) fail: bool,
    }

    impl<'a> EventObserver<'a> for RecordingObserver {
        fn handle_event(&mut self, event: &TestEvent<'a>) -> Result<(), WriteEventError> {
            self.events.push((event.module.index(), event.event.clone()));
            if self.fail {
                Err(io::Error::from(io::ErrorKind::BrokenPipe).into())
            } else {
                Ok(())
            }
        }
    }
}
