// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `scu` command-line tool: runs scu test modules in parallel and reports their results.
//!
//! Most of the logic lives in the `scu-runner` crate. This crate parses arguments, sets up logging
//! and colors, and maps errors to exit codes.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{Color, OutputContext, OutputWriter, StderrStyles};
