// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::registry::WorkflowRegistry;
use crate::config::settings::Settings;
use crate::config::validation::validate_dag;
use crate::dag::Dag;
use crate::errors::ConfigError;
use crate::scheduler::{parse_cron, ScheduleEntry};

/// Top-level deployment configuration for a conductor process.
///
/// Relative paths are resolved against the directory holding the TOML file,
/// so a config can be moved together with its DAG and schedule files.
///
/// # Example
/// ```toml
/// region = "eu-west"
/// dag_dir = "dags"
/// schedules_file = "schedules.yaml"
/// event_log = "var/events.jsonl"
/// state_log = "var/state.jsonl"
///
/// [queue]
/// backend = "postgres"
/// url = "postgres://conductor@localhost/conductor"
///
/// [settings]
/// max_workers = 8
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ConductorConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_dag_dir")]
    pub dag_dir: PathBuf,
    pub schedules_file: Option<PathBuf>,
    pub event_log: Option<PathBuf>,
    pub state_log: Option<PathBuf>,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub settings: Settings,
    #[serde(skip)]
    base_dir: PathBuf,
}

fn default_region() -> String {
    "default".to_string()
}

fn default_dag_dir() -> PathBuf {
    PathBuf::from(".")
}

impl ConductorConfig {
    /// Resolve a path from this config relative to the config file location.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn dag_dir(&self) -> PathBuf {
        self.resolve(&self.dag_dir)
    }

    pub fn schedules_path(&self) -> Option<PathBuf> {
        self.schedules_file.as_deref().map(|p| self.resolve(p))
    }

    pub fn event_log_path(&self) -> Option<PathBuf> {
        self.event_log.as_deref().map(|p| self.resolve(p))
    }

    pub fn state_log_path(&self) -> Option<PathBuf> {
        self.state_log.as_deref().map(|p| self.resolve(p))
    }
}

/// Queue backend selection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: QueueBackend,
    /// Connection string, required for the postgres backend.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize)]
struct ScheduleFile {
    #[serde(default)]
    schedules: Vec<ScheduleEntry>,
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a DAG definition from a YAML file without validating it.
pub fn load_dag<P: AsRef<Path>>(path: P) -> Result<Dag, ConfigError> {
    let path = path.as_ref();
    let content = read(path)?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a DAG definition and validate it against the workflow registry.
///
/// All validation problems are reported together in
/// [`ConfigError::InvalidDag`].
pub fn load_and_validate_dag<P: AsRef<Path>>(
    path: P,
    registry: &WorkflowRegistry,
) -> Result<Dag, ConfigError> {
    let path = path.as_ref();
    let dag = load_dag(path)?;
    validate_dag(&dag, registry).map_err(|errors| ConfigError::InvalidDag {
        dag_path: path.display().to_string(),
        errors,
    })?;
    Ok(dag)
}

/// Load schedule entries from a YAML file.
///
/// Cron expressions are parsed here so that a typo fails at startup rather
/// than silently never matching. Schedule ids must be unique.
pub fn load_schedules<P: AsRef<Path>>(path: P) -> Result<Vec<ScheduleEntry>, ConfigError> {
    let path = path.as_ref();
    let content = read(path)?;
    parse_schedules(&content).map_err(|err| match err {
        ParseFailure::Yaml(source) => ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        },
        ParseFailure::Config(err) => err,
    })
}

enum ParseFailure {
    Yaml(serde_yaml::Error),
    Config(ConfigError),
}

fn parse_schedules(content: &str) -> Result<Vec<ScheduleEntry>, ParseFailure> {
    let file: ScheduleFile = serde_yaml::from_str(content).map_err(ParseFailure::Yaml)?;

    let mut seen = HashSet::new();
    for entry in &file.schedules {
        if !seen.insert(entry.id.as_str()) {
            return Err(ParseFailure::Config(ConfigError::DuplicateSchedule(
                entry.id.clone(),
            )));
        }
        parse_cron(&entry.cron_expr).map_err(|e| {
            ParseFailure::Config(ConfigError::InvalidCron {
                schedule_id: entry.id.clone(),
                expr: entry.cron_expr.clone(),
                reason: e.to_string(),
            })
        })?;
    }

    Ok(file.schedules)
}

/// Load the conductor TOML file and apply environment overrides to its settings.
pub fn load_conductor_config<P: AsRef<Path>>(path: P) -> Result<ConductorConfig, ConfigError> {
    let mut config = load_conductor_config_file(path)?;
    config.settings = config.settings.with_env_overrides()?;
    config.settings.check()?;
    Ok(config)
}

/// Load the conductor TOML file exactly as written, without consulting the environment.
pub fn load_conductor_config_file<P: AsRef<Path>>(
    path: P,
) -> Result<ConductorConfig, ConfigError> {
    let path = path.as_ref();
    let content = read(path)?;
    let mut config: ConductorConfig =
        toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
    config.settings.check()?;
    config.base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok(config)
}
