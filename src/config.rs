use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::LedgerError;
use crate::ledger::digest::DIGEST_HEX_LEN;
use crate::ledger::miner::{DEFAULT_DIFFICULTY, DEFAULT_MAX_ITERATIONS};

/// Difficulty above which interactive recording gets noticeably slow
const INTERACTIVE_DIFFICULTY_LIMIT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    pub difficulty: usize,
    pub max_mining_iterations: u64,
    pub journal_path: Option<String>,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            max_mining_iterations: DEFAULT_MAX_ITERATIONS,
            journal_path: None,
        }
    }
}

impl LedgerSettings {
    /// Load ledger settings from a YAML file
    pub fn load_yaml(path: &Path) -> Result<Self, LedgerError> {
        if !path.exists() {
            return Err(LedgerError::Config(format!(
                "Configuration file not found: {:?}",
                path
            )));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("Failed to read {:?}: {}", path, e)))?;

        serde_yaml::from_str(&contents)
            .map_err(|e| LedgerError::Config(format!("Failed to parse {:?}: {}", path, e)))
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.difficulty > DIGEST_HEX_LEN {
            return Err(LedgerError::Config(format!(
                "difficulty {} exceeds digest length {}",
                self.difficulty, DIGEST_HEX_LEN
            )));
        }
        if self.max_mining_iterations == 0 {
            return Err(LedgerError::Config(
                "max_mining_iterations must be positive".to_string(),
            ));
        }
        if self.difficulty > INTERACTIVE_DIFFICULTY_LIMIT {
            warn!(
                "Difficulty {} expects ~16^{} attempts per block; recording will be slow",
                self.difficulty, self.difficulty
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub ledger: LedgerSettings,
}

fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T, LedgerError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| LedgerError::Config(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    /// Load configuration from the environment.
    ///
    /// `LEDGER_CONFIG_FILE` names an optional YAML file providing the ledger
    /// section; individual `LEDGER_*` variables override it.
    pub fn load() -> Result<Self, LedgerError> {
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = parse_env("SERVER_PORT", 3000u16)?;

        let mut ledger = match env::var("LEDGER_CONFIG_FILE") {
            Ok(path) => {
                info!("Loading ledger settings from {}", path);
                LedgerSettings::load_yaml(Path::new(&path))?
            }
            Err(_) => LedgerSettings::default(),
        };

        ledger.difficulty = parse_env("LEDGER_DIFFICULTY", ledger.difficulty)?;
        ledger.max_mining_iterations =
            parse_env("LEDGER_MAX_MINING_ITERATIONS", ledger.max_mining_iterations)?;
        if let Ok(path) = env::var("LEDGER_JOURNAL_PATH") {
            ledger.journal_path = Some(path).filter(|p| !p.trim().is_empty());
        }

        ledger.validate()?;

        Ok(AppConfig {
            server_host,
            server_port,
            ledger,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let settings = LedgerSettings::default();
        assert_eq!(settings.difficulty, 2);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_bounds() {
        let too_hard = LedgerSettings {
            difficulty: 65,
            ..LedgerSettings::default()
        };
        assert!(too_hard.validate().is_err());

        let no_budget = LedgerSettings {
            max_mining_iterations: 0,
            ..LedgerSettings::default()
        };
        assert!(no_budget.validate().is_err());
    }

    #[test]
    fn test_yaml_partial_override() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.yml");
        fs::write(&path, "difficulty: 3\njournal_path: /var/lib/tenders/ledger.jsonl\n").unwrap();

        let settings = LedgerSettings::load_yaml(&path).unwrap();
        assert_eq!(settings.difficulty, 3);
        assert_eq!(settings.max_mining_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(
            settings.journal_path.as_deref(),
            Some("/var/lib/tenders/ledger.jsonl")
        );
    }

    #[test]
    fn test_missing_yaml_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            LedgerSettings::load_yaml(&dir.path().join("missing.yml")),
            Err(LedgerError::Config(_))
        ));
    }
}
