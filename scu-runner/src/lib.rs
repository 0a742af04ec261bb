// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for `scu`, a parallel orchestrator for scu test modules.
//!
//! The basic flow of operations is:
//!
//! 1. Build a [`ModuleList`](test_module::ModuleList) from the module paths.
//! 2. List the tests in every module with [`ModuleRunner::discover`](runner::ModuleRunner::discover),
//!    collecting them with a [`DiscoveryCollector`](reporter::DiscoveryCollector).
//! 3. Select the tests to run with a [`TestFilter`](test_filter::TestFilter), producing a
//!    [`RunPlan`](test_filter::RunPlan).
//! 4. Run the plan with [`ModuleRunner::execute`](runner::ModuleRunner::execute), publishing events
//!    through a [`ReorderingLayer`](reporter::ReorderingLayer) to the reporting observers.

pub mod config;
pub mod errors;
mod helpers;
pub mod protocol;
pub mod reporter;
pub mod runner;
mod test_command;
pub mod test_filter;
pub mod test_module;

pub use test_command::DEBUG_ENV;
