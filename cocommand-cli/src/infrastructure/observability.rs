use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub default_level: tracing::Level,
    pub json_format: bool,
    pub show_thread_ids: bool,
    pub show_targets: bool,
    /// Whether to write logs to stderr at all
    pub show_logs: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: tracing::Level::INFO,
            json_format: false,
            show_thread_ids: false,
            show_targets: true,
            show_logs: true,
        }
    }
}

impl LogConfig {
    /// Development configuration (verbose, human-readable)
    pub fn dev() -> Self {
        Self {
            default_level: tracing::Level::DEBUG,
            show_thread_ids: true,
            ..Default::default()
        }
    }

    /// Only warnings and errors
    pub fn quiet() -> Self {
        Self {
            default_level: tracing::Level::WARN,
            ..Default::default()
        }
    }

    /// One JSON object per event, for log shippers
    pub fn with_json(mut self) -> Self {
        self.json_format = true;
        self
    }

    pub fn without_logs(mut self) -> Self {
        self.show_logs = false;
        self
    }

    /// Filter used when `RUST_LOG` is unset
    pub fn default_directives(&self) -> String {
        ["cocommand_cli", "cocommand_sync", "cocommand_core"]
            .iter()
            .map(|target| format!("{}={}", target, self.default_level))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn init(self) -> Result<(), String> {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(self.default_directives())
                .map_err(|e| format!("Invalid log filter: {}", e))?,
        };

        if !self.show_logs {
            return tracing_subscriber::registry()
                .with(env_filter)
                .try_init()
                .map_err(|e| format!("Failed to initialize tracing: {}", e));
        }

        if self.json_format {
            let json_layer = fmt::layer()
                .json()
                .with_target(self.show_targets)
                .with_thread_ids(self.show_thread_ids)
                .with_writer(std::io::stderr);

            return tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init()
                .map_err(|e| format!("Failed to initialize tracing: {}", e));
        }

        let fmt_layer = fmt::layer()
            .with_target(self.show_targets)
            .with_thread_ids(self.show_thread_ids)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| format!("Failed to initialize tracing: {}", e))
    }
}
