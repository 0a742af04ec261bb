// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for scu.
//!
//! The main structure in this module is [`ScuConfig`]. It is read with the `config` crate from an
//! embedded default config, with an optional repository config layered on top.

mod imp;
mod test_threads;
mod tools;

pub use imp::*;
pub use test_threads::*;
pub use tools::*;
