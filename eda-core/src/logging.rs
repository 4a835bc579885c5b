//! Logging utilities and configuration.
//!
//! Library code logs through `tracing`; binaries call
//! [`setup::init_logging`] once to install a subscriber. Log output goes to
//! stderr so the report written to stdout stays clean.

/// Truncates a string to the maximum field length if needed.
///
/// Used when logging cell values, prompts and HTTP bodies that can be large.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Utilities for setting up structured logging.
pub mod setup {
    use tracing::Level;

    /// Configuration for the logging setup.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for dependencies (DataFusion, reqwest, ...)
        pub level: Level,
        /// Log level for the eda crates specifically
        pub eda_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::WARN,
                eda_level: Level::WARN,
                json_format: false,
            }
        }
    }

    impl LoggingConfig {
        /// Maps a `-v` count to a configuration: 0 = warn, 1 = info,
        /// 2 = debug, 3+ = trace. From 3 on dependencies log at debug too.
        pub fn from_verbosity(verbosity: u8) -> Self {
            let config = Self::default();
            match verbosity {
                0 => config,
                1 => config.with_eda_level(Level::INFO),
                2 => config.with_eda_level(Level::DEBUG),
                _ => config
                    .with_eda_level(Level::TRACE)
                    .with_level(Level::DEBUG),
            }
        }

        /// Sets the log level for dependencies.
        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        /// Sets the log level for the eda crates.
        pub fn with_eda_level(mut self, level: Level) -> Self {
            self.eda_level = level;
            self
        }

        /// Sets whether to use JSON output format.
        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            let eda = self.eda_level.as_str().to_lowercase();
            format!(
                "{},eda_core={eda},eda_cli={eda},eda={eda}",
                self.level.as_str().to_lowercase(),
            )
        }
    }

    /// Initializes logging. `RUST_LOG` takes precedence over the configuration.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use eda_core::logging::setup::{LoggingConfig, init_logging};
    ///
    /// init_logging(LoggingConfig::from_verbosity(2).with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}
