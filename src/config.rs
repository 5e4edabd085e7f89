//! Application-level configuration loading, including the team roster.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::roster::{Roster, Team};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BATON_BACK_CONFIG_PATH";
/// Interval between two unconditional pulls of the remote snapshots.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3_500);
/// Actor recorded when neither the request nor the config names one.
pub const UNKNOWN_ACTOR: &str = "Desconhecido";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    roster: Roster,
    poll_interval: Duration,
    webhook_url: Option<String>,
    default_actor: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the built-in roster.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => match Self::try_from(raw) {
                    Ok(app_config) => {
                        info!(
                            path = %path.display(),
                            people = app_config.roster.len(),
                            "loaded configuration"
                        );
                        app_config
                    }
                    Err(err) => {
                        warn!(
                            path = %path.display(),
                            error = %err,
                            "invalid roster in config; falling back to defaults"
                        );
                        Self::default()
                    }
                },
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

    /// Configuration with an explicit roster and defaults elsewhere.
    pub fn with_roster(roster: Roster) -> Self {
        Self {
            roster,
            ..Self::default()
        }
    }

    /// Override the pull interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override the automation webhook target.
    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    /// Static team membership.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Interval of the fallback pull.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Automation endpoint notified on token passes, if any.
    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url.as_deref()
    }

    /// Actor used when a request does not identify itself.
    pub fn default_actor(&self) -> &str {
        self.default_actor.as_deref().unwrap_or(UNKNOWN_ACTOR)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            roster: Roster::builtin(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            webhook_url: None,
            default_actor: None,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    roster: Option<Vec<RawMember>>,
    #[serde(default)]
    poll_interval_ms: Option<u64>,
    #[serde(default)]
    webhook_url: Option<String>,
    #[serde(default)]
    default_actor: Option<String>,
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single roster entry.
struct RawMember {
    name: String,
    #[serde(default)]
    team: Option<String>,
}

impl TryFrom<RawConfig> for AppConfig {
    type Error = crate::state::roster::UnknownTeam;

    fn try_from(value: RawConfig) -> Result<Self, Self::Error> {
        let roster = match value.roster {
            Some(members) => {
                let entries = members
                    .into_iter()
                    .map(|member| {
                        let team = member.team.as_deref().map(str::parse::<Team>).transpose()?;
                        Ok((member.name, team))
                    })
                    .collect::<Result<Vec<_>, Self::Error>>()?;
                Roster::new(entries)
            }
            None => Roster::builtin(),
        };

        Ok(Self {
            roster,
            poll_interval: value
                .poll_interval_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            webhook_url: value.webhook_url.filter(|url| !url.trim().is_empty()),
            default_actor: value.default_actor.filter(|actor| !actor.trim().is_empty()),
        })
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_config_overrides_roster_and_interval() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "roster": [
                    {"name": "Ana", "team": "EPROC"},
                    {"name": "Diego", "team": "Legados"},
                    {"name": "Gilberto"}
                ],
                "poll_interval_ms": 1000,
                "webhook_url": "  ",
                "default_actor": "Painel"
            }"#,
        )
        .unwrap();
        let config = AppConfig::try_from(raw).unwrap();
        assert_eq!(config.roster().team_of("Ana"), Some(Team::Eproc));
        assert_eq!(config.roster().team_of("Diego"), Some(Team::Jpe));
        assert_eq!(config.roster().team_of("Gilberto"), None);
        assert_eq!(config.poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.webhook_url(), None);
        assert_eq!(config.default_actor(), "Painel");
    }

    #[test]
    fn missing_fields_use_defaults() {
        let raw: RawConfig = serde_json::from_str("{}").unwrap();
        let config = AppConfig::try_from(raw).unwrap();
        assert_eq!(config.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert_eq!(config.default_actor(), UNKNOWN_ACTOR);
        assert!(!config.roster().is_empty());
    }

    #[test]
    fn unknown_team_is_rejected() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"roster": [{"name": "Ana", "team": "Finance"}]}"#).unwrap();
        assert!(AppConfig::try_from(raw).is_err());
    }
}
