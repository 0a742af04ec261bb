// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use color_eyre::{Result, eyre::Context};
use integration_tests::{
    module_script::{ModuleScript, ScriptedOutcome, ScriptedTest},
    scu_cli::ScuCli,
};
use std::{env, fs};

pub(crate) const FAKE_MODULE: &str = env!("CARGO_BIN_EXE_scu-fake-module");

pub(crate) fn scu() -> ScuCli {
    ScuCli::new(env!("CARGO_BIN_EXE_scu-dup"))
}

/// A temporary directory of fake modules.
pub(crate) struct FakeModules {
    dir: Utf8TempDir,
}

impl FakeModules {
    pub(crate) fn new() -> Result<Self> {
        let dir = camino_tempfile::Builder::new()
            .prefix("scu-fake-modules-")
            .tempdir()?;
        Ok(Self { dir })
    }

    pub(crate) fn dir(&self) -> &Utf8Path {
        self.dir.path()
    }

    /// Installs a fake module called `name` that follows `script`, returning its path.
    pub(crate) fn add(&self, name: &str, script: &ModuleScript) -> Result<Utf8PathBuf> {
        let exe = self
            .dir
            .path()
            .join(format!("{name}{}", env::consts::EXE_SUFFIX));
        // A hard link avoids "text file busy" errors from running a freshly written executable
        // while other tests fork. The temp dir may be on another file system, though.
        if fs::hard_link(FAKE_MODULE, &exe).is_err() {
            fs::copy(FAKE_MODULE, &exe).wrap_err_with(|| format!("failed to copy to {exe}"))?;
        }
        script.store(&exe)?;
        Ok(exe)
    }

    /// Installs the modules used by most tests:
    ///
    /// * `math`: `add` (tags `fast`), `sub` (tags `fast`, `slow`), `mul`, all passing
    /// * `strings`: `concat` (tag `fast`) passing, `split` (tag `slow`) failing
    pub(crate) fn add_standard(&self) -> Result<(Utf8PathBuf, Utf8PathBuf)> {
        let math = self.add(
            "math",
            &ModuleScript::new([
                ScriptedTest::new("add")
                    .description("adds numbers")
                    .tags(&["fast"]),
                ScriptedTest::new("sub").tags(&["fast", "slow"]),
                ScriptedTest::new("mul"),
            ]),
        )?;
        let strings = self.add(
            "strings",
            &ModuleScript::new([
                ScriptedTest::new("concat").tags(&["fast"]),
                ScriptedTest::new("split")
                    .tags(&["slow"])
                    .outcome(ScriptedOutcome::Fail)
                    .output("split: expected 2 parts\n"),
            ]),
        )?;
        Ok((math, strings))
    }
}
