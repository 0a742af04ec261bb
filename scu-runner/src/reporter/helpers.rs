// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use owo_colors::Style;
use std::{fmt, time::Duration};

#[derive(Clone, Debug, Default)]
pub(super) struct Styles {
    pub(super) is_colorized: bool,
    pub(super) count: Style,
    pub(super) module: Style,
    pub(super) pass: Style,
    pub(super) fail: Style,
    pub(super) pass_output: Style,
    pub(super) fail_output: Style,
    pub(super) location: Style,
    pub(super) description: Style,
}

impl Styles {
    pub(super) fn new(should_colorize: bool) -> Self {
        let mut styles = Self::default();
        if should_colorize {
            styles.colorize();
        }
        styles
    }

    fn colorize(&mut self) {
        self.is_colorized = true;
        self.count = Style::new().bold();
        self.module = Style::new().magenta().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.pass_output = Style::new().green();
        self.fail_output = Style::new().magenta();
        self.location = Style::new().cyan();
        self.description = Style::new().dimmed();
    }
}

/// Displays a duration as `[   0.012s] `, or blank brackets of the same width if there is no
/// duration.
pub(super) struct DisplayBracketedDuration(pub(super) Option<Duration>);

impl fmt::Display for DisplayBracketedDuration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            // * > means right-align.
            // * 8 is the number of characters to pad to.
            // * .3 means print three digits after the decimal point.
            Some(duration) => write!(f, "[{:>8.3?}s] ", duration.as_secs_f64()),
            None => write!(f, "[{:>9}] ", ""),
        }
    }
}
