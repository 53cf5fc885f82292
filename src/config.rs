use crate::sim::SimulatorParams;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub simulator: SimulatorParams,
    /// Fixed simulator seed for reproducible runs; None seeds from entropy.
    pub sim_seed: Option<u64>,
    pub validation_mode: ValidationMode,
    pub break_clear_policy: BreakClearPolicy,
}

/// How a batch containing an invalid trade input is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// The first invalid input aborts the whole batch before any write.
    RejectBatch,
    /// Invalid inputs are skipped with a warning; the rest ingest.
    SkipInvalid,
}

/// Which break categories are cleared ahead of each detection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakClearPolicy {
    /// Quantity/missing breaks are replaced; NegativePosition accumulates.
    Mixed,
    /// Every category is replaced wholesale.
    ClearAll,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let missing_rate = parse_f64(&env_map, "SIM_MISSING_RATE", 0.10)?;
        let alter_rate = parse_f64(&env_map, "SIM_ALTER_RATE", 0.10)?;
        let delta_lo = parse_i64(&env_map, "SIM_DELTA_LO", -20)?;
        let delta_hi = parse_i64(&env_map, "SIM_DELTA_HI", 20)?;

        let simulator = SimulatorParams {
            missing_rate,
            alter_rate,
            delta_lo,
            delta_hi,
        }
        .validated()
        .map_err(|e| ConfigError::InvalidValue("SIM_*".to_string(), e.to_string()))?;

        let sim_seed = match env_map.get("SIM_SEED") {
            Some(s) => Some(s.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue("SIM_SEED".to_string(), "must be a valid u64".to_string())
            })?),
            None => None,
        };

        let validation_mode = match env_map
            .get("VALIDATION_MODE")
            .map(|s| s.as_str())
            .unwrap_or("reject")
        {
            "reject" => ValidationMode::RejectBatch,
            "skip" => ValidationMode::SkipInvalid,
            other => {
                return Err(ConfigError::InvalidValue(
                    "VALIDATION_MODE".to_string(),
                    format!("must be reject or skip, got {}", other),
                ))
            }
        };

        let break_clear_policy = match env_map
            .get("BREAK_CLEAR_POLICY")
            .map(|s| s.as_str())
            .unwrap_or("mixed")
        {
            "mixed" => BreakClearPolicy::Mixed,
            "all" => BreakClearPolicy::ClearAll,
            other => {
                return Err(ConfigError::InvalidValue(
                    "BREAK_CLEAR_POLICY".to_string(),
                    format!("must be mixed or all, got {}", other),
                ))
            }
        };

        Ok(Config {
            port,
            database_path,
            simulator,
            sim_seed,
            validation_mode,
            break_clear_policy,
        })
    }
}

fn parse_f64(
    env_map: &HashMap<String, String>,
    key: &str,
    default: f64,
) -> Result<f64, ConfigError> {
    match env_map.get(key) {
        Some(s) => s.parse::<f64>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a valid f64".to_string())
        }),
        None => Ok(default),
    }
}

fn parse_i64(
    env_map: &HashMap<String, String>,
    key: &str,
    default: i64,
) -> Result<i64, ConfigError> {
    match env_map.get(key) {
        Some(s) => s.parse::<i64>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a valid i64".to_string())
        }),
        None => Ok(default),
    }
}
