// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers shared by the integration tests and the test helper binaries.

pub mod module_script;
pub mod scu_cli;
