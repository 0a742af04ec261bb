// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to the scu event protocol and to `scu`'s machine-readable output.
//!
//! Test modules write one [`ModuleEvent`] per line, as JSON, to standard output. The orchestrator
//! parses these lines, and in turn can emit a [`TestListSummary`] for `scu list
//! --message-format json`.

mod events;
mod exit_codes;
mod test_list;

pub use events::*;
pub use exit_codes::*;
pub use test_list::*;
