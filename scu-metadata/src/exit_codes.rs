// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `scu` failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum ScuExitCode {}

impl ScuExitCode {
    /// No errors occurred and scu exited normally.
    pub const OK: i32 = 0;

    /// One or more tests failed, or one or more modules crashed.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// The test runner could not be set up.
    pub const TEST_LIST_CREATION_FAILED: i32 = 104;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// A user issue happened while setting up an scu invocation: bad configuration, an invalid
    /// filter or invalid arguments.
    pub const SETUP_ERROR: i32 = 96;
}
