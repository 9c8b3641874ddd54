use crate::config::Config;
use log::LevelFilter;
use simplelog::{
    self, ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::error::Error as StdError;
use std::fs::{self, File, OpenOptions};
use std::path::Path;

/// Modules to filter out from logging when not in Trace mode.
/// These are typically verbose dependencies that clutter normal log output.
const FILTERED_MODULES: &[&str] = &["tower", "tracing", "hyper", "axum", "redis"];

/// File receiving every record at the configured level.
pub const COMBINED_LOG_FILE: &str = "combined.log";
/// File receiving ERROR records only.
pub const ERROR_LOG_FILE: &str = "error.log";

pub struct Logger {}

impl Logger {
    /// Initializes the global logger with configuration based on the provided Config.
    ///
    /// Records always go to the terminal. When `log_dir` is configured they are also
    /// appended to `combined.log`, and errors additionally to `error.log`.
    pub fn init_logger(config: &Config) -> Result<(), Box<dyn StdError + Send + Sync>> {
        let loggers = Self::build_loggers(config)?;
        CombinedLogger::init(loggers)?;
        Ok(())
    }

    fn build_loggers(
        config: &Config,
    ) -> Result<Vec<Box<dyn SharedLogger>>, Box<dyn StdError + Send + Sync>> {
        let level = config.log_level();
        let log_config = Self::build_log_config(Self::should_filter_dependencies(level));

        let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
            level,
            log_config.clone(),
            TerminalMode::Mixed,
            Self::color_choice(config),
        )];

        if let Some(dir) = config.log_dir.as_deref() {
            fs::create_dir_all(dir)?;
            loggers.push(WriteLogger::new(
                level,
                log_config.clone(),
                Self::open_append(dir, COMBINED_LOG_FILE)?,
            ));
            loggers.push(WriteLogger::new(
                LevelFilter::Error,
                log_config,
                Self::open_append(dir, ERROR_LOG_FILE)?,
            ));
        }

        Ok(loggers)
    }

    fn open_append(dir: &Path, name: &str) -> std::io::Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(name))
    }

    /// Production output is collected by log shippers, so skip ANSI colors there.
    fn color_choice(config: &Config) -> ColorChoice {
        if config.is_production() {
            ColorChoice::Never
        } else {
            ColorChoice::Auto
        }
    }

    /// Determines whether dependency logging should be filtered.
    ///
    /// Returns `false` for Trace level (show all logs), `true` for all other levels.
    fn should_filter_dependencies(level: LevelFilter) -> bool {
        level != LevelFilter::Trace
    }

    /// Builds a simplelog Config with optional module filtering.
    ///
    /// When `apply_filters` is true, logs from noisy dependencies are suppressed.
    fn build_log_config(apply_filters: bool) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();

        if apply_filters {
            for module in FILTERED_MODULES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn config_with(args: &[&str]) -> Config {
        let mut argv = vec!["ci_relay"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_filtered_modules_contains_expected_dependencies() {
        for module in ["tower", "hyper", "axum", "redis"] {
            assert!(
                FILTERED_MODULES.contains(&module),
                "{module} should be filtered"
            );
        }
    }

    #[test]
    fn test_should_filter_dependencies_trace_level_disables_filtering() {
        // Trace level should NOT filter - we want to see everything for deep debugging
        assert!(
            !Logger::should_filter_dependencies(LevelFilter::Trace),
            "Trace level should disable filtering"
        );
    }

    #[test]
    fn test_should_filter_dependencies_other_levels_enable_filtering() {
        for level in [
            LevelFilter::Off,
            LevelFilter::Error,
            LevelFilter::Warn,
            LevelFilter::Info,
            LevelFilter::Debug,
        ] {
            assert!(
                Logger::should_filter_dependencies(level),
                "{level} level should enable filtering"
            );
        }
    }

    #[test]
    fn test_terminal_only_without_log_dir() {
        let loggers = Logger::build_loggers(&config_with(&[])).unwrap();
        assert_eq!(loggers.len(), 1);
    }

    #[test]
    fn test_log_dir_adds_combined_and_error_files() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let config = config_with(&["--log-dir", log_dir.to_str().unwrap()]);

        let loggers = Logger::build_loggers(&config).unwrap();

        assert_eq!(loggers.len(), 3);
        assert!(log_dir.join(COMBINED_LOG_FILE).exists());
        assert!(log_dir.join(ERROR_LOG_FILE).exists());
    }

    #[test]
    fn test_production_disables_colors() {
        let production = config_with(&["--runtime-env", "production"]);
        let development = config_with(&[]);

        assert!(matches!(
            Logger::color_choice(&production),
            ColorChoice::Never
        ));
        assert!(matches!(Logger::color_choice(&development), ColorChoice::Auto));
    }
}
