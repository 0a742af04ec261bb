// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    errors::Result,
    output::{OutputContext, OutputOpts, OutputWriter, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{ArgMatches, Args, CommandFactory, FromArgMatches, Parser, Subcommand, ValueEnum};
use itertools::Itertools;
use scu_runner::{
    config::{DefaultConfigWarnings, ScuConfig, TestThreads},
    reporter::{
        DiscoveryCollector, DisplayReporterBuilder, EventBus, OutputCleaner, ReorderingLayer,
        SummaryAggregator, TestOutputDisplay,
    },
    runner::{ModuleRunner, ModuleRunnerBuilder},
    test_filter::{FilterPredicate, RunPlan, TestFilter},
    test_module::{ModuleList, TestModule},
};
use std::io::Write;
use tracing::{debug, warn};

/// Main entry point for the `scu` binary.
#[doc(hidden)]
pub fn main_impl() -> ! {
    // Filters are order-sensitive, so the raw matches are kept around alongside the parsed app.
    let matches = ScuApp::command().get_matches();
    let app = ScuApp::from_arg_matches(&matches).unwrap_or_else(|error| error.exit());
    let output = app.init_output();

    match app.exec(&matches, output, &mut OutputWriter::default()) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            error.display_to_stderr(&output.stderr_styles());
            std::process::exit(error.process_exit_code())
        }
    }
}

/// Runs scu test modules in parallel and reports their results.
#[derive(Debug, Parser)]
#[command(
    version,
    name = "scu",
    styles = clap_styles::style(),
    max_term_width = 100
)]
pub struct ScuApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(subcommand)]
    command: Command,
}

impl ScuApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    ///
    /// `matches` must be the matches this app was parsed from: they carry the relative order of
    /// filter options.
    pub fn exec(
        self,
        matches: &ArgMatches,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        let sub_matches = matches
            .subcommand()
            .map_or(matches, |(_, sub_matches)| sub_matches);
        let current_dir = current_dir()?;
        let config = self.config_opts.make_config(&current_dir)?;

        match self.command {
            Command::List {
                filter,
                message_format,
                modules,
            } => {
                let filter = filter.to_filter(sub_matches)?;
                let runner = modules.runner_builder(&config).build()?;
                let module_list = discover(&runner, modules.modules)?;
                let plan = filter.plan(&module_list);

                let mut writer = output_writer.stdout_writer();
                message_format.write(&module_list, &plan, output, &mut writer)?;
                writer
                    .flush()
                    .map_err(|err| ExpectedError::WriteTestListError { err })?;
                Ok(0)
            }
            Command::Run {
                filter,
                modules,
                runner_opts,
                reporter_opts,
            } => {
                let filter = filter.to_filter(sub_matches)?;
                let mut builder = modules.runner_builder(&config);
                runner_opts.apply(&config, &mut builder);
                let runner = builder.build()?;

                let module_list = discover(&runner, modules.modules)?;
                if runner_opts.memcheck {
                    for name in module_list.duplicate_names() {
                        warn!(
                            "multiple modules are named `{name}`, so their memcheck logs \
                             overwrite each other"
                        );
                    }
                }
                let plan = filter.plan(&module_list);

                run(&runner, &plan, &config, &reporter_opts, output, output_writer)
            }
        }
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: .config/scu.toml in the current directory]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn make_config(&self, current_dir: &Utf8Path) -> Result<ScuConfig> {
        let config = ScuConfig::from_sources(
            current_dir,
            self.config_file.as_deref(),
            &mut DefaultConfigWarnings,
        )?;
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the tests in test modules
    ///
    /// This command runs each module in list mode and prints the tests it contains. Tests that
    /// the filters deselect are only shown with --verbose.
    /// Use --message-format json to get machine-readable output.
    List {
        #[command(flatten)]
        filter: FilterOpts,

        /// Output format
        #[arg(
            short = 'T',
            long,
            value_enum,
            default_value_t,
            help_heading = "Output options",
            value_name = "FMT"
        )]
        message_format: MessageFormatOpts,

        #[command(flatten)]
        modules: ModuleOpts,
    },

    /// Run tests in test modules
    ///
    /// This command runs each module in list mode to discover its tests, then runs the selected
    /// tests of all modules in parallel.
    Run {
        #[command(flatten)]
        filter: FilterOpts,

        #[command(flatten)]
        modules: ModuleOpts,

        #[command(flatten)]
        runner_opts: RunnerOpts,

        #[command(flatten)]
        reporter_opts: ReporterOpts,
    },
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum MessageFormatOpts {
    #[default]
    Human,
    Json,
}

impl MessageFormatOpts {
    fn write(
        self,
        modules: &ModuleList,
        plan: &RunPlan<'_>,
        output: OutputContext,
        writer: &mut dyn Write,
    ) -> Result<()> {
        let is_selected = |module: &TestModule, index| plan.is_selected(module, index);
        match self {
            Self::Human => modules
                .write_human(
                    writer,
                    output.verbose,
                    output.should_colorize_stdout(),
                    is_selected,
                )
                .map_err(|err| ExpectedError::WriteTestListError { err }),
            Self::Json => {
                let summary = modules.to_summary(is_selected);
                serde_json::to_writer(&mut *writer, &summary)
                    .map_err(|err| ExpectedError::SerializeTestListError { err })?;
                writeln!(writer).map_err(|err| ExpectedError::WriteTestListError { err })
            }
        }
    }
}

#[derive(Debug, Args)]
struct ModuleOpts {
    /// Number of modules to run simultaneously [possible values: integer or "num-cpus"]
    ///
    /// Negative values mean the number of logical CPUs minus that many.
    #[arg(
        long,
        short = 'j',
        visible_alias = "jobs",
        value_name = "N",
        env = "SCU_TEST_THREADS",
        allow_negative_numbers = true
    )]
    test_threads: Option<TestThreads>,

    /// Test module executables to run
    #[arg(required = true, value_name = "MODULES")]
    modules: Vec<Utf8PathBuf>,
}

impl ModuleOpts {
    fn runner_builder(&self, config: &ScuConfig) -> ModuleRunnerBuilder {
        let mut builder = ModuleRunnerBuilder::default();
        builder.set_test_threads(self.test_threads.unwrap_or_else(|| config.test_threads()));
        builder
    }
}

/// Test filters, applied left to right.
#[derive(Debug, Args)]
#[command(next_help_heading = "Filter options")]
struct FilterOpts {
    /// Select tests whose name matches this glob
    #[arg(long, short = 'n', value_name = "GLOB")]
    name: Vec<String>,

    /// Select tests with this tag
    #[arg(long, short = 't', value_name = "TAG")]
    tag: Vec<String>,

    /// Turn the next --name or --tag into an exclusion
    #[arg(
        long,
        short = 'x',
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        hide_possible_values = true,
        value_name = "BOOL"
    )]
    exclude: Vec<bool>,
}

enum FilterToken<'a> {
    Name(&'a str),
    Tag(&'a str),
    Exclude(bool),
}

impl FilterOpts {
    /// Builds the filter, using `matches` to recover the command-line order of the options.
    fn to_filter(&self, matches: &ArgMatches) -> Result<TestFilter> {
        let indices = |id: &str| matches.indices_of(id).into_iter().flatten();
        let names = indices("name").zip(&self.name).map(|(i, v)| (i, FilterToken::Name(v)));
        let tags = indices("tag").zip(&self.tag).map(|(i, v)| (i, FilterToken::Tag(v)));
        let excludes = indices("exclude")
            .zip(&self.exclude)
            .map(|(i, v)| (i, FilterToken::Exclude(*v)));

        let mut predicates = Vec::new();
        let mut exclude = None;
        let tokens = names
            .merge_by(tags, |a, b| a.0 < b.0)
            .merge_by(excludes, |a, b| a.0 < b.0);
        for (_, token) in tokens {
            match token {
                FilterToken::Exclude(_) if exclude.is_some() => {
                    return Err(ExpectedError::DanglingExclude);
                }
                FilterToken::Exclude(value) => exclude = Some(value),
                FilterToken::Name(glob) => {
                    let exclude = exclude.take().unwrap_or(false);
                    predicates.push(FilterPredicate::name(glob, exclude)?);
                }
                FilterToken::Tag(tag) => {
                    let exclude = exclude.take().unwrap_or(false);
                    predicates.push(FilterPredicate::tag(tag, exclude));
                }
            }
        }
        if exclude.is_some() {
            return Err(ExpectedError::DanglingExclude);
        }

        debug!(
            "filter: [{}]",
            predicates.iter().map(ToString::to_string).join(", ")
        );
        Ok(TestFilter::new(predicates))
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Runner options")]
struct RunnerOpts {
    /// Run tests under the memory checker
    #[arg(long)]
    memcheck: bool,

    /// Ask modules to wait for a debugger, and run them one at a time
    #[arg(long)]
    debug: bool,
}

impl RunnerOpts {
    fn apply(&self, config: &ScuConfig, builder: &mut ModuleRunnerBuilder) {
        if self.memcheck {
            builder.set_memcheck(config.memcheck().clone());
        }
        if self.debug {
            builder.set_debugger(config.debugger().clone());
        }
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Reporter options")]
struct ReporterOpts {
    /// Output the contents of passing tests' output files [possible values: immediate, never]
    #[arg(long, value_name = "WHEN", env = "SCU_SUCCESS_OUTPUT")]
    success_output: Option<TestOutputDisplay>,

    /// Output the contents of failing tests' output files [possible values: immediate, never]
    #[arg(long, value_name = "WHEN", env = "SCU_FAILURE_OUTPUT")]
    failure_output: Option<TestOutputDisplay>,
}

impl ReporterOpts {
    fn to_builder(&self, config: &ScuConfig, should_colorize: bool) -> DisplayReporterBuilder {
        let mut builder = DisplayReporterBuilder::default();
        builder
            .set_success_output(self.success_output.unwrap_or_else(|| config.success_output()))
            .set_failure_output(self.failure_output.unwrap_or_else(|| config.failure_output()))
            .set_colorize(should_colorize);
        builder
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let current_dir =
        std::env::current_dir().map_err(|err| ExpectedError::CurrentDirFailed { err })?;
    Utf8PathBuf::try_from(current_dir).map_err(|err| ExpectedError::CurrentDirInvalidUtf8 { err })
}

/// Runs every module in list mode and installs the tests they report.
fn discover(runner: &ModuleRunner, paths: Vec<Utf8PathBuf>) -> Result<ModuleList> {
    let mut modules = ModuleList::new(paths);
    let mut collector = DiscoveryCollector::new();
    {
        let mut bus = EventBus::new();
        bus.subscribe(&mut collector);
        runner
            .discover(&modules, &mut bus)
            .map_err(|err| ExpectedError::WriteEventError { err })?;
    }
    modules.set_test_cases(collector.into_test_lists());
    debug!(
        "discovered {} tests across {} modules",
        modules.test_count(),
        modules.len()
    );
    Ok(modules)
}

fn run(
    runner: &ModuleRunner,
    plan: &RunPlan<'_>,
    config: &ScuConfig,
    reporter_opts: &ReporterOpts,
    output: OutputContext,
    output_writer: &mut OutputWriter,
) -> Result<i32> {
    let should_colorize = output.should_colorize_stdout();
    let mut writer = output_writer.stdout_writer();
    let mut reporter = reporter_opts
        .to_builder(config, should_colorize)
        .build(&mut writer);
    reporter
        .write_run_started(plan)
        .map_err(|err| ExpectedError::WriteOutputError { err })?;

    let mut summary = SummaryAggregator::new();
    let mut cleaner = OutputCleaner::new();
    let run_result = {
        let mut downstream = EventBus::new();
        downstream
            .subscribe(&mut reporter)
            .subscribe(&mut summary)
            .subscribe(&mut cleaner);
        let mut reorder = ReorderingLayer::new(downstream);

        let mut bus = EventBus::new();
        bus.subscribe(&mut reorder);
        let run_result = runner.execute(plan, &mut bus);
        drop(bus);
        if !reorder.is_drained() {
            warn!("some test events were never reported");
        }
        run_result
    };
    drop(reporter);

    let run_summary = summary.summary();
    writeln!(writer)
        .and_then(|()| run_summary.write_table(&mut writer, should_colorize))
        .and_then(|()| writer.flush())
        .map_err(|err| ExpectedError::WriteOutputError { err })?;

    run_result.map_err(|err| ExpectedError::WriteEventError { err })?;
    if !run_summary.is_success() {
        return Err(ExpectedError::TestRunFailed);
    }
    Ok(0)
}
