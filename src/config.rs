use std::ffi::OsString;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::jira::Auth;
use crate::profile::{DumpProfile, ProfileOverrides};
use crate::schema::FieldSchema;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub jira: JiraConfig,
    #[serde(default)]
    pub dump: DumpConfig,
    #[serde(default)]
    pub fields: FieldsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct JiraConfig {
    pub base_url: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    /// Personal access token, sent as a bearer token instead of basic auth.
    #[serde(default)]
    pub token: Option<String>,
    pub jql: String,
}

#[derive(Debug, Deserialize)]
pub struct DumpConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "enabled")]
    pub transitions: bool,
    #[serde(default = "enabled")]
    pub comments: bool,
    #[serde(default = "enabled")]
    pub fix_versions: bool,
    #[serde(default = "enabled")]
    pub worklogs: bool,
    #[serde(default)]
    pub sla_overview: bool,
    #[serde(default = "default_transition_field")]
    pub transition_field: String,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            transitions: true,
            comments: true,
            fix_versions: true,
            worklogs: true,
            sla_overview: false,
            transition_field: default_transition_field(),
        }
    }
}

type ColumnPaths = IndexMap<String, Vec<String>>;

/// Column overlays, one table per extracted view.
#[derive(Debug, Default, Deserialize)]
pub struct FieldsConfig {
    #[serde(default)]
    pub issue: ColumnPaths,
    #[serde(default)]
    pub worklog: ColumnPaths,
    #[serde(default)]
    pub history: ColumnPaths,
    #[serde(default)]
    pub item: ColumnPaths,
    #[serde(default)]
    pub comment: ColumnPaths,
    #[serde(default)]
    pub fix_version: ColumnPaths,
    #[serde(default)]
    pub sla_overview: ColumnPaths,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Default)]
pub struct AppConfigOverrides {
    pub jira_base_url: Option<String>,
    pub jira_email: Option<String>,
    pub jira_api_token: Option<String>,
    pub jira_token: Option<String>,
    pub jira_jql: Option<String>,
    pub output_dir: Option<String>,
    pub logging_debug: Option<bool>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found at {path}. expected at $XDG_CONFIG_HOME/jira-dump/config.toml or ~/.config/jira-dump/config.toml")]
    MissingConfigFile { path: PathBuf },
    #[error("failed to resolve config path: HOME is not set and XDG_CONFIG_HOME is unset")]
    MissingHomeDirectory,
    #[error("failed to read config file at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse TOML config at {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load() -> Result<AppConfig, ConfigError> {
    let path = resolve_config_path()?;
    load_from(&path)
}

pub fn load_from(path: &std::path::Path) -> Result<AppConfig, ConfigError> {
    let path = path.to_path_buf();
    let raw = std::fs::read_to_string(&path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::MissingConfigFile { path: path.clone() }
        } else {
            ConfigError::ReadFailed {
                path: path.clone(),
                source,
            }
        }
    })?;

    let cfg = toml::from_str::<AppConfig>(&raw).map_err(|source| ConfigError::ParseFailed {
        path: path.clone(),
        source,
    })?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn resolve_config_path() -> Result<PathBuf, ConfigError> {
    let xdg_config_home = std::env::var_os("XDG_CONFIG_HOME");
    let home = std::env::var_os("HOME");
    resolve_config_path_from_env(xdg_config_home, home)
}

fn resolve_config_path_from_env(
    xdg_config_home: Option<OsString>,
    home: Option<OsString>,
) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = xdg_config_home.filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(dir).join("jira-dump").join("config.toml"));
    }

    let home = home
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingHomeDirectory)?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("jira-dump")
        .join("config.toml"))
}

impl AppConfigOverrides {
    /// Reads `JIRA_BASE_URL`, `JIRA_EMAIL`, `JIRA_API_TOKEN`, `JIRA_TOKEN`,
    /// `JIRA_JQL` and `JIRA_DUMP_OUTPUT_DIR`.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            jira_base_url: var("JIRA_BASE_URL"),
            jira_email: var("JIRA_EMAIL"),
            jira_api_token: var("JIRA_API_TOKEN"),
            jira_token: var("JIRA_TOKEN"),
            jira_jql: var("JIRA_JQL"),
            output_dir: var("JIRA_DUMP_OUTPUT_DIR"),
            logging_debug: None,
        }
    }
}

impl AppConfig {
    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) -> Result<(), ConfigError> {
        if let Some(value) = &overrides.jira_base_url {
            self.jira.base_url = value.clone();
        }
        if let Some(value) = &overrides.jira_email {
            self.jira.email = Some(value.clone());
        }
        if let Some(value) = &overrides.jira_api_token {
            self.jira.api_token = Some(value.clone());
        }
        if let Some(value) = &overrides.jira_token {
            self.jira.token = Some(value.clone());
        }
        if let Some(value) = &overrides.jira_jql {
            self.jira.jql = value.clone();
        }
        if let Some(value) = &overrides.output_dir {
            self.dump.output_dir = value.clone();
        }
        if let Some(value) = overrides.logging_debug {
            self.logging.debug = value;
        }

        self.validate()
    }

    pub fn auth(&self) -> Auth {
        match (&self.jira.token, &self.jira.email, &self.jira.api_token) {
            (Some(token), _, _) => Auth::Bearer(token.clone()),
            (None, Some(email), Some(api_token)) => Auth::Basic {
                email: email.clone(),
                api_token: api_token.clone(),
            },
            _ => Auth::Anonymous,
        }
    }

    /// Default profile with the configured flags and column overlays applied.
    pub fn profile(&self) -> DumpProfile {
        let overrides = ProfileOverrides {
            issue: to_schema(&self.fields.issue),
            worklog: to_schema(&self.fields.worklog),
            history: to_schema(&self.fields.history),
            item: to_schema(&self.fields.item),
            comment: to_schema(&self.fields.comment),
            fix_version: to_schema(&self.fields.fix_version),
            sla_overview: to_schema(&self.fields.sla_overview),
        };
        let mut profile = DumpProfile::default()
            .apply_overrides(&overrides)
            .with_transitions(self.dump.transitions)
            .with_comments(self.dump.comments)
            .with_fix_versions(self.dump.fix_versions);
        profile.transition_field = self.dump.transition_field.clone();
        profile
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jira.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "jira.base_url must not be empty".into(),
            ));
        }
        if self.jira.jql.trim().is_empty() {
            return Err(ConfigError::Invalid("jira.jql must not be empty".into()));
        }
        if self.jira.email.is_some() != self.jira.api_token.is_some() {
            return Err(ConfigError::Invalid(
                "jira.email and jira.api_token must be set together".into(),
            ));
        }
        if self.dump.output_dir.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "dump.output_dir must not be empty".into(),
            ));
        }
        if self.dump.transition_field.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "dump.transition_field must not be empty".into(),
            ));
        }
        self.profile()
            .validate()
            .map_err(|err| ConfigError::Invalid(format!("fields: {err}")))?;

        Ok(())
    }
}

fn to_schema(columns: &ColumnPaths) -> FieldSchema {
    columns
        .iter()
        .map(|(column, keys)| (column.clone(), keys.clone()))
        .collect()
}

fn default_output_dir() -> String {
    "jira-dump".to_string()
}

fn default_transition_field() -> String {
    crate::profile::DEFAULT_TRANSITION_FIELD.to_string()
}

const fn enabled() -> bool {
    true
}
