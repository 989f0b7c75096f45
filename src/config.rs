use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use time::macros::format_description;
use time::UtcOffset;

use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LedgerConfig {
    pub db_path: Option<String>,
}

/// Role-id tiers as configured for the org's chat server. Tiers nest:
/// admin and manager hold every capability, closers may also close and
/// schedule installs, setters may record sets and view stats.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RolesConfig {
    #[serde(default)]
    pub admin: Vec<String>,
    #[serde(default)]
    pub manager: Vec<String>,
    #[serde(default)]
    pub closer: Vec<String>,
    #[serde(default)]
    pub setter: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WorkflowSection {
    pub confirm_timeout_secs: Option<u64>,
    pub list_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub ledger: Option<LedgerConfig>,
    /// Civil-day boundary offset, e.g. "-05:00". Falls back to the host's
    /// local offset, then UTC.
    pub utc_offset: Option<String>,
    pub roles: Option<RolesConfig>,
    pub workflow: Option<WorkflowSection>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| LedgerError::Config(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| LedgerError::Config(e.to_string()))?;
        Ok(config)
    }

    pub fn db_path(&self) -> String {
        self.ledger
            .as_ref()
            .and_then(|l| l.db_path.clone())
            .unwrap_or_else(default_db_path)
    }

    pub fn resolve_offset(&self) -> UtcOffset {
        if let Some(raw) = self.utc_offset.as_deref() {
            match parse_offset(raw) {
                Some(offset) => return offset,
                None => {
                    tracing::warn!(raw, "unparseable utc_offset in config, falling back");
                }
            }
        }
        UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
    }
}

pub fn parse_offset(raw: &str) -> Option<UtcOffset> {
    let format = format_description!("[offset_hour sign:mandatory]:[offset_minute]");
    UtcOffset::parse(raw.trim(), format).ok()
}

pub fn default_db_path() -> String {
    "./data/suntally.db".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_offsets() {
        assert_eq!(parse_offset("-05:00"), UtcOffset::from_hms(-5, 0, 0).ok());
        assert_eq!(parse_offset("+05:30"), UtcOffset::from_hms(5, 30, 0).ok());
        assert_eq!(parse_offset("central"), None);
    }

    #[test]
    fn defaults_apply_when_sections_missing() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.db_path(), "./data/suntally.db");
        assert!(config.roles.is_none());
    }
}
