use std::{fmt, time::Duration};

use crate::error::RuntimeError;

/// Ingestion endpoint used when `LOGDNA_URL` is not set
pub const DEFAULT_INGEST_URL: &str = "https://logs.logdna.com/logs/ingest";

/// Window used when `EVENT_CUTOFF_SECONDS` is not set
pub const DEFAULT_EVENT_CUTOFF: Duration = Duration::from_secs(70);

/// `Config` holds the settings of a single invocation
#[derive(Clone, PartialEq)]
pub struct Config {
    /// Ingestion API key. Delivery is disabled when it's missing.
    pub api_key: Option<String>,
    /// Hostname that overrides the one derived from the logs
    pub hostname: Option<String>,
    /// Tags attached to every batch
    pub tags: Option<String>,
    /// Full URL of the ingestion endpoint
    pub ingest_url: String,
    /// ECS cluster to poll. ECS uses the default cluster when it's missing.
    pub ecs_cluster: Option<String>,
    /// ECS services to poll for events
    pub services: Vec<String>,
    /// How far back ECS service events are forwarded
    pub event_cutoff: Duration,
}

impl Config {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Config, RuntimeError> {
        Config::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration from any key/value source.
    /// Empty values are treated as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, RuntimeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let event_cutoff = match var("EVENT_CUTOFF_SECONDS") {
            Some(value) => value
                .trim()
                .parse()
                .map(Duration::from_secs)
                .map_err(|_| RuntimeError::InvalidConfig {
                    name: "EVENT_CUTOFF_SECONDS",
                    value,
                })?,
            None => DEFAULT_EVENT_CUTOFF,
        };

        Ok(Config {
            api_key: var("LOGDNA_KEY"),
            hostname: var("LOGDNA_HOSTNAME"),
            tags: var("LOGDNA_TAGS"),
            ingest_url: build_url(var("LOGDNA_URL").as_deref()),
            ecs_cluster: var("ECS_CLUSTER"),
            services: var("SERVICES")
                .map(|s| parse_services(&s))
                .unwrap_or_default(),
            event_cutoff,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: None,
            hostname: None,
            tags: None,
            ingest_url: DEFAULT_INGEST_URL.into(),
            ecs_cluster: None,
            services: Vec::new(),
            event_cutoff: DEFAULT_EVENT_CUTOFF,
        }
    }
}

// keep the api key out of the logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("hostname", &self.hostname)
            .field("tags", &self.tags)
            .field("ingest_url", &self.ingest_url)
            .field("ecs_cluster", &self.ecs_cluster)
            .field("services", &self.services)
            .field("event_cutoff", &self.event_cutoff)
            .finish()
    }
}

fn build_url(host: Option<&str>) -> String {
    match host {
        Some(host) => format!("https://{}", host.trim()),
        None => DEFAULT_INGEST_URL.into(),
    }
}

fn parse_services(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
