use crate::workflow::stages::ReviewBand;
use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Longest rolling window for editor performance metrics
pub const MAX_METRICS_WINDOW_DAYS: u32 = 3650;
/// Longest lifetime of cached queue statistics
pub const MAX_STATS_CACHE_TTL_SECONDS: u64 = 86_400;

/// Main configuration structure for the content pipeline
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Workflow engine behaviour
    pub engine: EngineConfig,
    /// Approval queue settings
    pub queue: QueueConfig,
    /// Notification fan-out settings
    pub notifications: NotificationConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Graceful shutdown settings
    pub shutdown: ShutdownConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Failing attempts allowed per workflow before it is marked FAILED
    pub default_max_retries: u32,
    /// Passing scores inside this band are still sent to an editor
    pub review_band: Option<ReviewBand>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Page size when a query does not specify one
    pub default_page_size: u32,
    /// Upper bound for requested page sizes
    pub max_page_size: u32,
    /// Lifetime of cached queue statistics
    pub stats_cache_ttl_seconds: u64,
    pub stats_cache_capacity: u64,
    /// Rolling window for editor performance metrics
    pub metrics_window_days: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// Deliver recipient notifications (topic events are always published)
    pub enabled: bool,
    /// Buffer size of each broadcast topic
    pub channel_capacity: usize,
    /// Recipient of workflow failure notices
    pub operations_recipient: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level directive, overridden by RUST_LOG
    pub log_level: String,
    /// Emit JSON logs instead of compact text
    pub json_logs: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ShutdownConfig {
    /// How long to wait for in-flight notification deliveries
    pub drain_timeout_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_retries: 3,
            review_band: None,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            stats_cache_ttl_seconds: 120,
            stats_cache_capacity: 16,
            metrics_window_days: 30,
        }
    }
}

impl QueueConfig {
    pub fn stats_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_cache_ttl_seconds.min(MAX_STATS_CACHE_TTL_SECONDS))
    }

    pub fn metrics_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.metrics_window_days.min(MAX_METRICS_WINDOW_DAYS)))
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_capacity: 256,
            operations_recipient: "operations".to_string(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_seconds: 10,
        }
    }
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_seconds)
    }
}

impl PipelineConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (content-workflow.toml, .content-workflow-rc)
    /// 3. Environment variables (prefixed with CONTENT_WORKFLOW__)
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Same as [`PipelineConfig::load`] with an extra file layered over the defaults files
    pub fn load_from(extra_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&PipelineConfig::default())?);

        if Path::new("content-workflow.toml").exists() {
            builder = builder.add_source(File::with_name("content-workflow"));
        }

        if Path::new(".content-workflow-rc").exists() {
            builder = builder.add_source(
                File::with_name(".content-workflow-rc").format(config::FileFormat::Toml),
            );
        }

        if let Some(path) = extra_file {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("CONTENT_WORKFLOW")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: PipelineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.engine.default_max_retries == 0 {
            anyhow::bail!("engine.default_max_retries must be at least 1");
        }
        if let Some(band) = &self.engine.review_band {
            if !(0.0..=1.0).contains(&band.min) || !(0.0..=1.0).contains(&band.max) || band.min > band.max {
                anyhow::bail!(
                    "engine.review_band must satisfy 0 <= min <= max <= 1 (got {}..{})",
                    band.min,
                    band.max
                );
            }
        }
        if self.queue.default_page_size == 0 || self.queue.max_page_size < self.queue.default_page_size {
            anyhow::bail!("queue page sizes must satisfy 0 < default_page_size <= max_page_size");
        }
        if self.queue.metrics_window_days == 0 || self.queue.metrics_window_days > MAX_METRICS_WINDOW_DAYS {
            anyhow::bail!(
                "queue.metrics_window_days must be between 1 and {} (got {})",
                MAX_METRICS_WINDOW_DAYS,
                self.queue.metrics_window_days
            );
        }
        if self.queue.stats_cache_ttl_seconds > MAX_STATS_CACHE_TTL_SECONDS {
            anyhow::bail!(
                "queue.stats_cache_ttl_seconds must be at most {} (got {})",
                MAX_STATS_CACHE_TTL_SECONDS,
                self.queue.stats_cache_ttl_seconds
            );
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<PipelineConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = PipelineConfig::load_env_file();
        PipelineConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static PipelineConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}
