use crate::matcher::ACCEPTANCE_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Import and matching settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Currency assumed when the export leaves the column blank
    pub home_currency: String,

    /// Minimum name-match confidence, clamped to [0, 1]
    pub match_threshold: f64,

    /// SQLite file for imported transactions and matches
    pub database_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            home_currency: "EUR".to_string(),
            match_threshold: ACCEPTANCE_THRESHOLD,
            database_path: None,
        }
    }
}

impl AppConfig {
    /// Load from `FEE_HOME_CURRENCY`, `FEE_MATCH_THRESHOLD`, `FEE_DATABASE_PATH`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            home_currency: lookup("FEE_HOME_CURRENCY")
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or(defaults.home_currency),
            match_threshold: lookup("FEE_MATCH_THRESHOLD")
                .and_then(|t| t.trim().parse::<f64>().ok())
                .filter(|t| t.is_finite())
                .map(|t| t.clamp(0.0, 1.0))
                .unwrap_or(defaults.match_threshold),
            database_path: lookup("FEE_DATABASE_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]);
        assert_eq!(config.home_currency, "EUR");
        assert_eq!(config.match_threshold, 0.5);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("FEE_HOME_CURRENCY", "CHF"),
            ("FEE_MATCH_THRESHOLD", "0.7"),
            ("FEE_DATABASE_PATH", "/tmp/fees.db"),
        ]);
        assert_eq!(config.home_currency, "CHF");
        assert_eq!(config.match_threshold, 0.7);
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/fees.db")));
    }

    #[test]
    fn test_threshold_is_clamped_and_validated() {
        assert_eq!(load(&[("FEE_MATCH_THRESHOLD", "3")]).match_threshold, 1.0);
        assert_eq!(load(&[("FEE_MATCH_THRESHOLD", "abc")]).match_threshold, 0.5);
        assert_eq!(load(&[("FEE_MATCH_THRESHOLD", "NaN")]).match_threshold, 0.5);
    }
}
