use crate::roster::Roster;
use reqwest::Url;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("class {class_id} has invalid seat count {seat_count}")]
    InvalidSeatCount { class_id: String, seat_count: i64 },

    #[error("duplicate class id: {0}")]
    DuplicateClass(String),

    #[error("duplicate period id: {0}")]
    DuplicatePeriod(String),

    #[error("period {period_id} has an invalid score weight")]
    InvalidScoreWeight { period_id: String },

    #[error("layout override names unknown class: {0}")]
    UnknownOverrideClass(String),

    #[error("class {0} has more than one layout override")]
    DuplicateOverride(String),

    #[error("layout override for {class_id} moves seat {seat}, outside 1..={seat_count}")]
    OverrideSeatOutOfRange {
        class_id: String,
        seat: u32,
        seat_count: i64,
    },

    #[error("layout override for {class_id} moves seat {seat} twice")]
    DuplicateOverrideSeat { class_id: String, seat: u32 },

    #[error("roster has no classes")]
    EmptyRoster,

    #[error("invalid roster json: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for {var}: {value}")]
    InvalidVar { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Remote web app URL (env: ROLLCALL_ENDPOINT). Remote calls fail when unset.
    pub endpoint: Option<Url>,
    /// Per-request timeout in seconds (env: ROLLCALL_TIMEOUT_SECS)
    pub timeout_secs: u64,
    /// Roster file (env: ROLLCALL_ROSTER); built-in roster when unset
    pub roster_path: Option<PathBuf>,
    /// Cache directory opened at startup (env: ROLLCALL_WORKSPACE)
    pub workspace: Option<PathBuf>,
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = match non_empty_var("ROLLCALL_ENDPOINT") {
            Some(raw) => Some(Url::parse(raw.trim()).map_err(|_| ConfigError::InvalidVar {
                var: "ROLLCALL_ENDPOINT",
                value: raw.clone(),
            })?),
            None => None,
        };
        let timeout_secs = match non_empty_var("ROLLCALL_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or(ConfigError::InvalidVar {
                    var: "ROLLCALL_TIMEOUT_SECS",
                    value: raw,
                })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            endpoint,
            timeout_secs,
            roster_path: non_empty_var("ROLLCALL_ROSTER").map(PathBuf::from),
            workspace: non_empty_var("ROLLCALL_WORKSPACE").map(PathBuf::from),
        })
    }

    pub fn load_roster(&self) -> Result<Roster, ConfigError> {
        let Some(path) = self.roster_path.as_ref() else {
            return Ok(Roster::builtin());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Roster::from_json_str(&raw)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            roster_path: None,
            workspace: None,
        }
    }
}
