//! Configuration for the Admiral server
//!
//! Values are layered: built-in defaults, then an optional YAML/TOML/JSON
//! file, then `ADMIRAL_*` environment variables (`__` separates nested
//! keys, e.g. `ADMIRAL_APPLICATION__METADATA_PREFIX`).

use admiral_core::application::resources::parse_quantity;
use admiral_core::config::TaskResourceSet;
use admiral_core::ApplicationConfig;
use admiral_monitoring::MonitoringConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{ServerError, ServerResult};

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "ADMIRAL_CONFIG";

const ENV_PREFIX: &str = "ADMIRAL";
const ENV_SEPARATOR: &str = "__";

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Log filter, e.g. `info,admiral_core=debug`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON logs
    #[serde(default)]
    pub json_logs: bool,

    /// Prefix of every exported metric
    #[serde(default = "default_metrics_prefix")]
    pub metrics_prefix: String,

    /// Address of the Prometheus scrape endpoint; unset disables the exporter
    #[serde(default)]
    pub metrics_listen_addr: Option<String>,

    /// Cluster reported for dispatched executions
    #[serde(default = "default_cluster")]
    pub default_cluster: String,

    /// Base of offloaded payload references
    #[serde(default = "default_storage_base")]
    pub storage_base: String,

    /// YAML file holding the queue routing rules
    #[serde(default)]
    pub queue_config_path: Option<String>,

    /// How often the queue routing file is re-read
    #[serde(default = "default_queue_refresh_interval_secs")]
    pub queue_refresh_interval_secs: u64,

    /// Buffered notifications; publishing to a full queue fails
    #[serde(default = "default_notification_queue_capacity")]
    pub notification_queue_capacity: usize,

    /// Lifecycle manager settings
    #[serde(default)]
    pub application: ApplicationConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_prefix() -> String {
    "admiral".to_string()
}

fn default_cluster() -> String {
    "default".to_string()
}

fn default_storage_base() -> String {
    "mem://admiral".to_string()
}

fn default_queue_refresh_interval_secs() -> u64 {
    60
}

fn default_notification_queue_capacity() -> usize {
    1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            metrics_prefix: default_metrics_prefix(),
            metrics_listen_addr: None,
            default_cluster: default_cluster(),
            storage_base: default_storage_base(),
            queue_config_path: None,
            queue_refresh_interval_secs: default_queue_refresh_interval_secs(),
            notification_queue_capacity: default_notification_queue_capacity(),
            application: ApplicationConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the file named by `ADMIRAL_CONFIG` and the environment
    pub fn load() -> ServerResult<Self> {
        let path = env::var(CONFIG_PATH_ENV).ok();
        Self::load_from(path.as_deref())
    }

    /// Load configuration from an optional file and the environment
    pub fn load_from(path: Option<&str>) -> ServerResult<Self> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&ServerConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot start with
    pub fn validate(&self) -> ServerResult<()> {
        if self.storage_base.trim().is_empty() {
            return Err(ServerError::ConfigError("storage_base must not be empty".to_string()));
        }
        if self.default_cluster.trim().is_empty() {
            return Err(ServerError::ConfigError("default_cluster must not be empty".to_string()));
        }
        if self.queue_refresh_interval_secs == 0 {
            return Err(ServerError::ConfigError(
                "queue_refresh_interval_secs must be positive".to_string(),
            ));
        }
        if self.notification_queue_capacity == 0 {
            return Err(ServerError::ConfigError(
                "notification_queue_capacity must be positive".to_string(),
            ));
        }
        if self.application.background_workers == 0 {
            return Err(ServerError::ConfigError(
                "application.background_workers must be positive".to_string(),
            ));
        }
        if self.application.metadata_prefix.trim().is_empty() {
            return Err(ServerError::ConfigError(
                "application.metadata_prefix must not be empty".to_string(),
            ));
        }
        self.metrics_addr()?;

        let resources = &self.application.task_resources;
        validate_quantities("application.task_resources.defaults", &resources.defaults)?;
        validate_quantities("application.task_resources.limits", &resources.limits)?;
        Ok(())
    }

    /// Parsed Prometheus listen address
    pub fn metrics_addr(&self) -> ServerResult<Option<SocketAddr>> {
        self.metrics_listen_addr
            .as_deref()
            .map(|addr| {
                addr.parse::<SocketAddr>()
                    .map_err(|err| ServerError::ConfigError(format!("metrics_listen_addr {}: {}", addr, err)))
            })
            .transpose()
    }

    /// Interval between queue routing reloads
    pub fn queue_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.queue_refresh_interval_secs)
    }

    /// Logging and metrics settings for this server
    pub fn monitoring_config(&self) -> MonitoringConfig {
        MonitoringConfig {
            service_name: "admiral-server".to_string(),
            log_filter: self.log_level.clone(),
            json_logs: self.json_logs,
            metrics_prefix: self.metrics_prefix.clone(),
        }
    }
}

fn validate_quantities(section: &str, set: &TaskResourceSet) -> ServerResult<()> {
    let fields = [
        ("cpu", &set.cpu),
        ("memory", &set.memory),
        ("gpu", &set.gpu),
        ("storage", &set.storage),
    ];
    for (name, quantity) in fields {
        if quantity.is_empty() {
            continue;
        }
        parse_quantity(quantity)
            .map_err(|err| ServerError::ConfigError(format!("{}.{}: {}", section, name, err)))?;
    }
    Ok(())
}
