// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filtering tests based on user-specified parameters.
//!
//! The main structure in this module is [`TestFilter`], which is created from an ordered list of
//! [`FilterPredicate`]s. Predicates are applied left to right to the set of all tests in a module:
//! an inclusive predicate narrows the set to the tests it matches, and an exclusive one removes
//! the tests it matches.

use crate::{
    errors::TestFilterBuildError,
    test_module::{ModuleList, TestCase, TestModule},
};
use std::{collections::BTreeSet, fmt};

/// A glob pattern matched against test names.
///
/// `globset::GlobMatcher` has path-like semantics, so the glob is translated to a regex and the
/// regex is used for matching instead.
#[derive(Clone, Debug)]
pub struct GenericGlob {
    glob_str: String,
    regex: regex::bytes::Regex,
}

impl GenericGlob {
    /// Creates a new generic glob.
    pub fn new(glob_str: impl Into<String>) -> Result<Self, TestFilterBuildError> {
        let glob_str = glob_str.into();
        let glob = globset::GlobBuilder::new(&glob_str)
            // Only allow escapes via [].
            .backslash_escape(false)
            // Allow test_{a,} to match both test_a and test_.
            .empty_alternates(true)
            .build()
            .map_err(|error| TestFilterBuildError::InvalidGlob {
                glob: glob_str.clone(),
                error,
            })?;

        let regex = regex::bytes::Regex::new(glob.regex()).map_err(|error| {
            TestFilterBuildError::GlobRegex {
                glob: glob_str.clone(),
                error,
            }
        })?;

        Ok(Self { glob_str, regex })
    }

    /// Returns the glob string.
    pub fn as_str(&self) -> &str {
        &self.glob_str
    }

    /// Returns true if this glob matches the given string.
    pub fn is_match(&self, s: &str) -> bool {
        self.regex.is_match(s.as_bytes())
    }
}

/// What a [`FilterPredicate`] matches against.
#[derive(Clone, Debug)]
pub enum FilterKind {
    /// Matches test names against a glob.
    Name(GenericGlob),

    /// Matches tests carrying this tag exactly.
    Tag(String),
}

/// A single step in a [`TestFilter`].
#[derive(Clone, Debug)]
pub struct FilterPredicate {
    kind: FilterKind,
    exclude: bool,
}

impl FilterPredicate {
    /// Creates a predicate matching test names against `glob`.
    pub fn name(glob: &str, exclude: bool) -> Result<Self, TestFilterBuildError> {
        Ok(Self {
            kind: FilterKind::Name(GenericGlob::new(glob)?),
            exclude,
        })
    }

    /// Creates a predicate matching tests with the tag `tag`.
    pub fn tag(tag: impl Into<String>, exclude: bool) -> Self {
        Self {
            kind: FilterKind::Tag(tag.into()),
            exclude,
        }
    }

    /// Returns what this predicate matches against.
    pub fn kind(&self) -> &FilterKind {
        &self.kind
    }

    /// Returns true if this predicate removes the tests it matches.
    pub fn is_exclude(&self) -> bool {
        self.exclude
    }

    /// Returns true if `test_case` matches this predicate, ignoring `exclude`.
    pub fn matches(&self, test_case: &TestCase) -> bool {
        match &self.kind {
            FilterKind::Name(glob) => glob.is_match(&test_case.name),
            FilterKind::Tag(tag) => test_case.has_tag(tag),
        }
    }
}

impl fmt::Display for FilterPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exclude {
            write!(f, "not ")?;
        }
        match &self.kind {
            FilterKind::Name(glob) => write!(f, "name `{}`", glob.as_str()),
            FilterKind::Tag(tag) => write!(f, "tag `{tag}`"),
        }
    }
}

/// An ordered list of predicates selecting the tests to run.
///
/// The same filter is applied to every module.
#[derive(Clone, Debug, Default)]
pub struct TestFilter {
    predicates: Vec<FilterPredicate>,
}

impl TestFilter {
    /// Creates a new filter from predicates, applied in the given order.
    pub fn new(predicates: Vec<FilterPredicate>) -> Self {
        Self { predicates }
    }

    /// Returns the predicates in this filter.
    pub fn predicates(&self) -> &[FilterPredicate] {
        &self.predicates
    }

    /// Selects tests out of `test_cases`, returning the selected indexes.
    ///
    /// Returns `None` if nothing was selected, including when `test_cases` is empty.
    pub fn select(&self, test_cases: &[TestCase]) -> Option<BTreeSet<usize>> {
        let mut selected: BTreeSet<usize> = (0..test_cases.len()).collect();
        for predicate in &self.predicates {
            if predicate.exclude {
                selected.retain(|&index| !predicate.matches(&test_cases[index]));
            } else {
                selected.retain(|&index| predicate.matches(&test_cases[index]));
            }
        }
        (!selected.is_empty()).then_some(selected)
    }

    /// Applies this filter to every module, producing a plan for the run phase.
    pub fn plan<'a>(&self, modules: &'a ModuleList) -> RunPlan<'a> {
        let mut planned = Vec::new();
        let mut skipped = Vec::new();
        for module in modules.iter() {
            match self.select(module.test_cases()) {
                Some(indices) => planned.push(PlannedModule {
                    module,
                    indices: indices.into_iter().collect(),
                }),
                None => skipped.push(module),
            }
        }
        RunPlan { planned, skipped }
    }
}

/// A module along with the tests selected to run in it.
#[derive(Clone, Debug)]
pub struct PlannedModule<'a> {
    module: &'a TestModule,
    indices: Vec<usize>,
}

impl<'a> PlannedModule<'a> {
    /// Returns the module.
    pub fn module(&self) -> &'a TestModule {
        self.module
    }

    /// Returns the selected test indexes, in ascending order. Never empty.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

/// The set of modules and tests to run.
#[derive(Clone, Debug, Default)]
pub struct RunPlan<'a> {
    planned: Vec<PlannedModule<'a>>,
    skipped: Vec<&'a TestModule>,
}

impl<'a> RunPlan<'a> {
    /// Returns the modules with at least one selected test, in invocation order.
    pub fn modules(&self) -> &[PlannedModule<'a>] {
        &self.planned
    }

    /// Returns the modules with no selected tests.
    pub fn skipped(&self) -> &[&'a TestModule] {
        &self.skipped
    }

    /// Returns the total number of selected tests.
    pub fn test_count(&self) -> usize {
        self.planned.iter().map(|p| p.indices.len()).sum()
    }

    /// Returns true if the test at `index` in `module` is selected.
    pub fn is_selected(&self, module: &TestModule, index: usize) -> bool {
        self.planned
            .iter()
            .find(|p| p.module.index() == module.index())
            .is_some_and(|p| p.indices.binary_search(&index).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_module::ModuleIndex;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use test_case::test_case;
    use test_strategy::{Arbitrary, proptest};

    fn tc(name: &str, tags: &[&str]) -> TestCase {
        TestCase {
            name: name.to_owned(),
            description: String::new(),
            tags: tags.iter().map(|t| (*t).to_owned()).collect(),
        }
    }

    fn cases() -> Vec<TestCase> {
        vec![
            tc("test_add", &["fast"]),
            tc("test_sub", &["fast", "flaky"]),
            tc("test_mul", &["slow"]),
            tc("other", &[]),
        ]
    }

    #[test_case(vec![], Some(vec![0, 1, 2, 3]) ; "no predicates selects all")]
    #[test_case(vec![FilterPredicate::name("test_*", false).unwrap()], Some(vec![0, 1, 2]) ; "name glob")]
    #[test_case(vec![FilterPredicate::tag("fast", false)], Some(vec![0, 1]) ; "tag")]
    #[test_case(vec![FilterPredicate::tag("flaky", true)], Some(vec![0, 2, 3]) ; "exclude tag")]
    #[test_case(
        vec![FilterPredicate::tag("fast", false), FilterPredicate::tag("flaky", true)],
        Some(vec![0])
        ; "include then exclude"
    )]
    #[test_case(
        vec![FilterPredicate::tag("flaky", true), FilterPredicate::tag("fast", false)],
        Some(vec![0])
        ; "exclude then include"
    )]
    #[test_case(
        vec![FilterPredicate::name("test_{add,mul}", false).unwrap()],
        Some(vec![0, 2])
        ; "alternates"
    )]
    #[test_case(vec![FilterPredicate::name("nope*", false).unwrap()], None ; "nothing matches")]
    #[test_case(vec![FilterPredicate::tag("fas", false)], None ; "tags match exactly")]
    fn select(predicates: Vec<FilterPredicate>, expected: Option<Vec<usize>>) {
        let filter = TestFilter::new(predicates);
        let selected = filter.select(&cases()).map(|s| s.into_iter().collect::<Vec<_>>());
        assert_eq!(selected, expected);
    }

    #[test]
    fn select_empty_module() {
        assert_eq!(TestFilter::default().select(&[]), None);
    }

    #[test_case("foo/*", "foo/bar/baz", true ; "star crosses slashes")]
    #[test_case("test_?", "test_a", true ; "question mark")]
    #[test_case("test_[ab]", "test_c", false ; "class")]
    #[test_case("test_{a,}", "test_", true ; "empty alternate")]
    #[test_case("test\\*", "test\\x", true ; "no backslash escapes")]
    fn glob_matches(glob: &str, input: &str, matches: bool) {
        let glob = GenericGlob::new(glob).expect("glob is valid");
        assert_eq!(glob.is_match(input), matches);
    }

    #[test]
    fn invalid_glob() {
        let error = FilterPredicate::name("test_[", false).expect_err("unclosed class");
        assert!(
            matches!(&error, TestFilterBuildError::InvalidGlob { glob, .. } if glob == "test_["),
            "unexpected error: {error:?}"
        );
    }

    #[test]
    fn plan_skips_empty_selections() {
        let mut modules = ModuleList::new(["m0", "m1", "m2"]);
        let mut lists = BTreeMap::new();
        lists.insert(ModuleIndex::new(0), cases());
        lists.insert(ModuleIndex::new(1), vec![tc("other", &[])]);
        modules.set_test_cases(lists);

        let filter = TestFilter::new(vec![FilterPredicate::name("test_*", false).unwrap()]);
        let plan = filter.plan(&modules);
        assert_eq!(plan.modules().len(), 1);
        assert_eq!(plan.modules()[0].module().name(), "m0");
        assert_eq!(plan.modules()[0].indices(), &[0, 1, 2]);
        assert_eq!(
            plan.skipped().iter().map(|m| m.name()).collect::<Vec<_>>(),
            vec!["m1", "m2"]
        );
        assert_eq!(plan.test_count(), 3);

        let m0 = modules.get(ModuleIndex::new(0)).unwrap();
        assert!(plan.is_selected(m0, 2));
        assert!(!plan.is_selected(m0, 3));
    }

    #[derive(Arbitrary, Debug)]
    struct ArbitraryTestCase {
        #[strategy("[ab]{0,3}")]
        name: String,
        #[strategy(proptest::collection::vec("[xyz]", 0..3))]
        tags: Vec<String>,
    }

    #[derive(Arbitrary, Debug)]
    enum ArbitraryPredicate {
        Name(#[strategy("[ab*?]{0,3}")] String, bool),
        Tag(#[strategy("[xyz]")] String, bool),
    }

    impl ArbitraryPredicate {
        fn build(&self) -> FilterPredicate {
            match self {
                Self::Name(glob, exclude) => {
                    FilterPredicate::name(glob, *exclude).expect("generated globs are valid")
                }
                Self::Tag(tag, exclude) => FilterPredicate::tag(tag.clone(), *exclude),
            }
        }
    }

    /// A test is selected iff it passes every inclusive predicate and fails every exclusive one.
    #[proptest]
    fn select_matches_reference(
        #[strategy(proptest::collection::vec(any::<ArbitraryTestCase>(), 0..8))]
        test_cases: Vec<ArbitraryTestCase>,
        #[strategy(proptest::collection::vec(any::<ArbitraryPredicate>(), 0..5))]
        predicates: Vec<ArbitraryPredicate>,
    ) {
        let test_cases: Vec<_> = test_cases
            .into_iter()
            .map(|tc| TestCase {
                name: tc.name,
                description: String::new(),
                tags: tc.tags,
            })
            .collect();
        let predicates: Vec<_> = predicates.iter().map(ArbitraryPredicate::build).collect();

        let expected: BTreeSet<usize> = test_cases
            .iter()
            .enumerate()
            .filter(|(_, tc)| predicates.iter().all(|p| p.matches(tc) != p.is_exclude()))
            .map(|(index, _)| index)
            .collect();

        let actual = TestFilter::new(predicates).select(&test_cases);
        prop_assert_eq!(actual.unwrap_or_default(), expected);
    }
}
