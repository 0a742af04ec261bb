// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test modules and the test cases they contain.
//!
//! A test module is an executable built against the scu test library. A [`ModuleList`] is built
//! from the paths passed in on the command line, and filled in with test cases once discovery has
//! finished.

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use owo_colors::{OwoColorize, Style};
use scu_metadata::{ModuleSummary, TestCaseListSummary, TestCaseSummary, TestListSummary};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    io::{self, Write},
};

/// The position of a module in the list of modules passed in.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ModuleIndex(usize);

impl ModuleIndex {
    /// Creates a new module index.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the index as a `usize`.
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for ModuleIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single test case, as discovered in a module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCase {
    /// The name of the test case.
    pub name: String,

    /// A human-readable description. May be empty.
    pub description: String,

    /// Tags attached to the test case.
    pub tags: Vec<String>,
}

impl TestCase {
    /// Returns true if this test case carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

impl From<TestCaseSummary> for TestCase {
    fn from(summary: TestCaseSummary) -> Self {
        Self {
            name: summary.name,
            description: summary.description,
            tags: summary.tags,
        }
    }
}

/// A test module executable.
#[derive(Clone, Debug)]
pub struct TestModule {
    index: ModuleIndex,
    path: Utf8PathBuf,
    name: String,
    test_cases: Vec<TestCase>,
}

impl TestModule {
    /// Creates a new test module with no test cases.
    ///
    /// The name of the module is the file stem of `path`.
    pub fn new(index: ModuleIndex, path: impl Into<Utf8PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .or_else(|| path.file_name())
            .unwrap_or(path.as_str())
            .to_owned();
        Self {
            index,
            path,
            name,
            test_cases: Vec::new(),
        }
    }

    /// Returns the position of this module in the module list.
    pub fn index(&self) -> ModuleIndex {
        self.index
    }

    /// Returns the path to the module executable.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the name of the module.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the test cases discovered in this module, in index order.
    pub fn test_cases(&self) -> &[TestCase] {
        &self.test_cases
    }

    /// Returns the test case with the given index, if one was discovered.
    pub fn test_case(&self, index: usize) -> Option<&TestCase> {
        self.test_cases.get(index)
    }
}

/// The list of test modules in a run, in invocation order.
#[derive(Clone, Debug, Default)]
pub struct ModuleList {
    modules: Vec<TestModule>,
}

impl ModuleList {
    /// Creates a new module list from the given paths.
    pub fn new<P: Into<Utf8PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        let modules = paths
            .into_iter()
            .enumerate()
            .map(|(index, path)| TestModule::new(ModuleIndex::new(index), path))
            .collect();
        Self { modules }
    }

    /// Returns the number of modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns true if there are no modules.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Returns the module at `index`.
    pub fn get(&self, index: ModuleIndex) -> Option<&TestModule> {
        self.modules.get(index.0)
    }

    /// Iterates over the modules in invocation order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &TestModule> + '_ {
        self.modules.iter()
    }

    /// Returns the total number of test cases discovered across all modules.
    pub fn test_count(&self) -> usize {
        self.modules.iter().map(|m| m.test_cases.len()).sum()
    }

    /// Installs discovered test cases into their modules.
    ///
    /// Modules without an entry keep an empty test list.
    pub fn set_test_cases(&mut self, mut lists: BTreeMap<ModuleIndex, Vec<TestCase>>) {
        for module in &mut self.modules {
            module.test_cases = lists.remove(&module.index).unwrap_or_default();
        }
    }

    /// Returns module names shared by more than one module.
    ///
    /// Memcheck logs are named after the module, so modules with the same name overwrite each
    /// other's logs.
    pub fn duplicate_names(&self) -> BTreeSet<&str> {
        self.modules.iter().map(TestModule::name).duplicates().collect()
    }

    /// Builds a serializable summary of this list.
    ///
    /// `is_selected` is called for every test case to determine the `selected` field.
    pub fn to_summary(
        &self,
        mut is_selected: impl FnMut(&TestModule, usize) -> bool,
    ) -> TestListSummary {
        let mut test_count = 0;
        let modules = self
            .modules
            .iter()
            .map(|module| {
                let testcases = module
                    .test_cases
                    .iter()
                    .enumerate()
                    .map(|(index, tc)| {
                        let selected = is_selected(module, index);
                        test_count += usize::from(selected);
                        TestCaseListSummary {
                            index,
                            name: tc.name.clone(),
                            description: tc.description.clone(),
                            tags: tc.tags.clone(),
                            selected,
                        }
                    })
                    .collect();
                ModuleSummary {
                    path: module.path.clone(),
                    name: module.name.clone(),
                    testcases,
                }
            })
            .collect();
        TestListSummary {
            test_count,
            modules,
        }
    }

    /// Writes a human-readable list of test cases, grouped by module.
    ///
    /// Test cases for which `is_selected` returns false, and modules without selected test cases,
    /// are only shown if `verbose` is set.
    pub fn write_human(
        &self,
        writer: &mut dyn Write,
        verbose: bool,
        should_colorize: bool,
        mut is_selected: impl FnMut(&TestModule, usize) -> bool,
    ) -> io::Result<()> {
        let styles = ListStyles::new(should_colorize);

        for module in &self.modules {
            let selected: Vec<bool> = (0..module.test_cases.len())
                .map(|index| is_selected(module, index))
                .collect();
            if !verbose && !selected.contains(&true) {
                continue;
            }

            if verbose {
                writeln!(
                    writer,
                    "{} [{}]:",
                    module.name.style(styles.module),
                    module.path.style(styles.path),
                )?;
            } else {
                writeln!(writer, "{}:", module.name.style(styles.module))?;
            }

            if module.test_cases.is_empty() {
                writeln!(writer, "    {}", "(no tests)".style(styles.skipped))?;
            }

            for (test_case, selected) in module.test_cases.iter().zip(selected) {
                if !selected && !verbose {
                    continue;
                }
                write!(writer, "    {}", test_case.name)?;
                if !test_case.tags.is_empty() {
                    write!(
                        writer,
                        " {}",
                        format!("[{}]", test_case.tags.join(", ")).style(styles.tags),
                    )?;
                }
                if !selected {
                    write!(writer, " {}", "(skipped)".style(styles.skipped))?;
                }
                writeln!(writer)?;
                if verbose && !test_case.description.is_empty() {
                    writeln!(writer, "        {}", test_case.description)?;
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
struct ListStyles {
    module: Style,
    path: Style,
    tags: Style,
    skipped: Style,
}

impl ListStyles {
    fn new(should_colorize: bool) -> Self {
        if !should_colorize {
            return Self::default();
        }
        Self {
            module: Style::new().magenta().bold(),
            path: Style::new().dimmed(),
            tags: Style::new().cyan(),
            skipped: Style::new().dimmed(),
        }
    }
}
