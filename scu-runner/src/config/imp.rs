// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{DebuggerConfig, MemcheckConfig, TestThreads};
use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind},
    reporter::TestOutputDisplay,
};
use camino::Utf8Path;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{collections::BTreeSet, sync::LazyLock};
use tracing::warn;

/// Trait for handling configuration warnings.
///
/// This trait allows for different warning handling strategies, such as logging warnings
/// (the default behavior) or collecting them for testing purposes.
pub trait ConfigWarnings {
    /// Handle unknown configuration keys found in a config file.
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>);
}

/// Default implementation of [`ConfigWarnings`] that logs warnings using the tracing crate.
pub struct DefaultConfigWarnings;

impl ConfigWarnings for DefaultConfigWarnings {
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>) {
        let mut unknown_str = String::new();
        if unknown.len() == 1 {
            // Print this on the same line.
            unknown_str.push(' ');
            unknown_str.push_str(unknown.iter().next().expect("unknown has length 1"));
        } else {
            for ignored_key in unknown {
                unknown_str.push('\n');
                unknown_str.push_str("  - ");
                unknown_str.push_str(ignored_key);
            }
        }

        warn!("ignoring unknown configuration keys in config file {config_file}:{unknown_str}");
    }
}

/// Gets the number of available CPUs and caches the value.
#[inline]
pub fn get_num_cpus() -> usize {
    static NUM_CPUS: LazyLock<usize> =
        LazyLock::new(|| match std::thread::available_parallelism() {
            Ok(count) => count.into(),
            Err(err) => {
                warn!("unable to determine num-cpus ({err}), assuming 1 logical CPU");
                1
            }
        });

    *NUM_CPUS
}

/// Overall configuration for scu.
///
/// Command-line options take precedence over the values stored here.
#[derive(Clone, Debug)]
pub struct ScuConfig {
    inner: ScuConfigDeserialize,
}

impl ScuConfig {
    /// The default location of the config within a directory: `.config/scu.toml`.
    pub const CONFIG_PATH: &'static str = ".config/scu.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// Reads the config from `config_file` if specified, otherwise from [`Self::CONFIG_PATH`]
    /// under `dir` if that file exists.
    ///
    /// Unknown keys are reported through `warnings`.
    pub fn from_sources(
        dir: &Utf8Path,
        config_file: Option<&Utf8Path>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = dir.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (inner, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;
        if !unknown.is_empty() {
            warnings.unknown_config_keys(&config_file, &unknown);
        }

        inner
            .validate()
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;
        Ok(Self { inner })
    }

    /// Returns the default config, without reading any files.
    pub fn default_config() -> Self {
        let (inner, _) = Self::build_and_deserialize_config(&Self::make_default_config())
            .expect("default config is always valid");
        Self { inner }
    }

    /// Returns the configured number of test threads.
    pub fn test_threads(&self) -> TestThreads {
        self.inner.test_threads
    }

    /// Returns when to display the output of passing tests.
    pub fn success_output(&self) -> TestOutputDisplay {
        self.inner.success_output
    }

    /// Returns when to display the output of failing tests.
    pub fn failure_output(&self) -> TestOutputDisplay {
        self.inner.failure_output
    }

    /// Returns the memory checker settings.
    pub fn memcheck(&self) -> &MemcheckConfig {
        &self.inner.memcheck
    }

    /// Returns the debugger settings.
    pub fn debugger(&self) -> &DebuggerConfig {
        &self.inner.debugger
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(ScuConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: ScuConfigDeserialize =
            serde_path_to_error::deserialize(ignored_de).map_err(|error| {
                // serde_path_to_error already reports the key, so drop it from the config error.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ScuConfigDeserialize {
    test_threads: TestThreads,
    success_output: TestOutputDisplay,
    failure_output: TestOutputDisplay,
    memcheck: MemcheckConfig,
    debugger: DebuggerConfig,
}

impl ScuConfigDeserialize {
    fn validate(&self) -> Result<(), ConfigParseErrorKind> {
        if self.memcheck.command.is_empty() {
            return Err(ConfigParseErrorKind::InvalidValue {
                key: "memcheck.command",
                reason: "must contain at least the program to run".to_owned(),
            });
        }
        if self.debugger.attach_command.is_empty() {
            return Err(ConfigParseErrorKind::InvalidValue {
                key: "debugger.attach-command",
                reason: "must contain at least the program to run".to_owned(),
            });
        }
        Ok(())
    }
}
