// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{self, Write};

/// Utilities for pluralizing various words based on count or plurality.
pub(crate) mod plural {
    /// Returns "test" if `count` is 1, otherwise "tests".
    pub(crate) fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }

    /// Returns "module" if `count` is 1, otherwise "modules".
    pub(crate) fn modules_str(count: usize) -> &'static str {
        if count == 1 { "module" } else { "modules" }
    }
}

/// Writes `text` line by line, prefixing every line with `indent`.
///
/// A trailing newline is always written, even if `text` doesn't end with one.
pub(crate) fn write_indented(writer: &mut dyn Write, indent: &str, text: &str) -> io::Result<()> {
    for line in text.lines() {
        writeln!(writer, "{indent}{line}")?;
    }
    Ok(())
}
