// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test runner.
//!
//! The main structure in this module is [`ModuleRunner`]. It runs a bounded pool of module
//! processes, decodes their output and publishes the resulting events on an
//! [`EventBus`](crate::reporter::EventBus).

mod executor;
mod imp;
mod job;

pub use imp::*;
