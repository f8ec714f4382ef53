//! Application-level configuration: tunables from an optional JSON file plus
//! deployment settings read from the environment.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

use crate::state::{fleet::FleetServer, game::DEFAULT_MU};

/// Default location on disk where the binaries look for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/rankrat.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "RANKRAT_CONFIG_PATH";

/// Default port of a game server.
pub const DEFAULT_SERVER_PORT: u16 = 3000;
/// Default port of the fleet router.
pub const DEFAULT_ROUTER_PORT: u16 = 4001;
/// Fleet name used when `SERVER_NAME` is unset.
pub const DEFAULT_SERVER_NAME: &str = "server1";

/// Immutable runtime configuration shared across the application.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Maximum number of rooms kept in memory.
    pub cache_capacity: usize,
    /// Entries inspected per eviction.
    pub eviction_sample_size: usize,
    /// Candidates shown per round.
    pub round_size: usize,
    /// Validity of signed picture URLs.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "picture_ttl_secs")]
    pub picture_ttl: Duration,
    /// Inbound silence after which a session is closed.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "idle_timeout_secs")]
    pub idle_timeout: Duration,
    /// Maximum number of concurrent background rating writes.
    pub persistence_concurrency: usize,
    /// Per-server timeout of fleet status probes.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "status_timeout_ms")]
    pub status_timeout: Duration,
    /// Skill model parameters.
    pub rating: RatingParams,
    /// Fleet name of this game server; set from `SERVER_NAME`, never from the file.
    #[serde(skip)]
    pub server_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 10_000,
            eviction_sample_size: 100,
            round_size: 4,
            picture_ttl: Duration::from_secs(20 * 60),
            idle_timeout: Duration::from_secs(10 * 60),
            persistence_concurrency: 16,
            status_timeout: Duration::from_millis(2_000),
            rating: RatingParams::default(),
            server_name: DEFAULT_SERVER_NAME.to_owned(),
        }
    }
}

/// Weng-Lin model parameters. Missing values are derived from `mu`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "RawRatingParams")]
pub struct RatingParams {
    /// Initial mean skill.
    pub mu: f64,
    /// Initial uncertainty.
    pub sigma: f64,
    /// Performance noise of a single round.
    pub beta: f64,
    /// Dynamics added to every sigma before an update.
    pub tau: f64,
    /// Lower bound keeping variances positive.
    pub kappa: f64,
}

impl RatingParams {
    /// Standard parameter set derived from an initial mean.
    pub fn from_mu(mu: f64) -> Self {
        let sigma = mu / 3.0;
        Self {
            mu,
            sigma,
            beta: sigma / 2.0,
            tau: sigma / 100.0,
            kappa: 1e-4,
        }
    }
}

impl Default for RatingParams {
    fn default() -> Self {
        Self::from_mu(DEFAULT_MU)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRatingParams {
    mu: Option<f64>,
    sigma: Option<f64>,
    beta: Option<f64>,
    tau: Option<f64>,
    kappa: Option<f64>,
}

impl From<RawRatingParams> for RatingParams {
    fn from(raw: RawRatingParams) -> Self {
        let mu = raw.mu.unwrap_or(DEFAULT_MU);
        let sigma = raw.sigma.unwrap_or(mu / 3.0);
        let derived = RatingParams {
            mu,
            sigma,
            beta: sigma / 2.0,
            tau: sigma / 100.0,
            kappa: 1e-4,
        };
        Self {
            beta: raw.beta.unwrap_or(derived.beta),
            tau: raw.tau.unwrap_or(derived.tau),
            kappa: raw.kappa.unwrap_or(derived.kappa),
            ..derived
        }
    }
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        cache_capacity = config.cache_capacity,
                        round_size = config.round_size,
                        "loaded configuration file"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document, missing keys keep their default value.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str(contents)
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Listening port from `PORT` or `SERVER_PORT`.
pub fn port_from_env(default: u16) -> u16 {
    env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
        .unwrap_or(default)
}

/// Name this game server is registered under in the fleet.
pub fn server_name_from_env() -> String {
    env::var("SERVER_NAME")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SERVER_NAME.to_owned())
}

/// Fleet members from `FLEET_SERVERS`, falling back to `SERVER1_ADDRESS` / `SERVER2_ADDRESS`.
pub fn fleet_servers_from_env() -> Vec<FleetServer> {
    if let Ok(list) = env::var("FLEET_SERVERS") {
        let servers = parse_fleet_servers(&list);
        if !servers.is_empty() {
            return servers;
        }
        warn!(value = %list, "FLEET_SERVERS contains no valid entry");
    }

    ["SERVER1", "SERVER2"]
        .into_iter()
        .filter_map(|name| {
            env::var(format!("{name}_ADDRESS"))
                .ok()
                .filter(|address| !address.trim().is_empty())
                .map(|address| FleetServer::new(name.to_ascii_lowercase(), address.trim()))
        })
        .collect()
}

/// Parse `name=host:port` entries separated by commas, skipping malformed ones.
pub fn parse_fleet_servers(value: &str) -> Vec<FleetServer> {
    value
        .split(',')
        .filter_map(|entry| {
            let (name, address) = entry.split_once('=')?;
            let (name, address) = (name.trim(), address.trim());
            if name.is_empty() || address.is_empty() {
                warn!(entry = %entry, "ignoring malformed fleet server entry");
                return None;
            }
            Some(FleetServer::new(name, address))
        })
        .collect()
}
