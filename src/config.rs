//! Server configuration from the environment

use crate::runtime::TurnLimits;
use crate::state_machine::state::DEFAULT_MAX_STEPS;
use crate::tools::DEFAULT_TOOL_TIMEOUT;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_DECISION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_LOCK_WAIT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub max_steps: u32,
    pub tool_timeout: Duration,
    pub decision_timeout: Duration,
    pub lock_wait: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup("TRIP_PLANNER_DB_PATH")
            .filter(|p| !p.trim().is_empty())
            .map_or_else(
                || {
                    let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                    PathBuf::from(home).join(".trip-planner").join("plans.db")
                },
                PathBuf::from,
            );

        Self {
            port: parse_var(&lookup, "TRIP_PLANNER_PORT").unwrap_or(DEFAULT_PORT),
            db_path,
            max_steps: parse_var(&lookup, "TRIP_PLANNER_MAX_STEPS")
                .filter(|n: &u32| *n > 0)
                .unwrap_or(DEFAULT_MAX_STEPS),
            tool_timeout: parse_var(&lookup, "TRIP_PLANNER_TOOL_TIMEOUT_SECS")
                .map_or(DEFAULT_TOOL_TIMEOUT, Duration::from_secs),
            decision_timeout: Duration::from_secs(
                parse_var(&lookup, "TRIP_PLANNER_DECISION_TIMEOUT_SECS")
                    .unwrap_or(DEFAULT_DECISION_TIMEOUT_SECS),
            ),
            lock_wait: Duration::from_secs(
                parse_var(&lookup, "TRIP_PLANNER_LOCK_WAIT_SECS").unwrap_or(DEFAULT_LOCK_WAIT_SECS),
            ),
        }
    }

    pub fn turn_limits(&self) -> TurnLimits {
        TurnLimits {
            max_steps: self.max_steps,
            decision_timeout: self.decision_timeout,
            lock_wait: self.lock_wait,
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let value = lookup(name)?;
    let parsed = value.trim().parse().ok();
    if parsed.is_none() {
        tracing::warn!(var = name, value = %value, "Ignoring unparseable setting");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[("HOME", "/home/ana")]);
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.db_path, PathBuf::from("/home/ana/.trip-planner/plans.db"));
        assert_eq!(cfg.max_steps, 50);
        assert_eq!(cfg.tool_timeout, Duration::from_secs(30));
        assert_eq!(cfg.decision_timeout, Duration::from_secs(120));
        assert_eq!(cfg.lock_wait, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let cfg = config(&[
            ("TRIP_PLANNER_PORT", "9090"),
            ("TRIP_PLANNER_DB_PATH", "/data/plans.db"),
            ("TRIP_PLANNER_MAX_STEPS", "0"),
            ("TRIP_PLANNER_TOOL_TIMEOUT_SECS", "ten"),
            ("TRIP_PLANNER_LOCK_WAIT_SECS", " 2 "),
        ]);
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.db_path, PathBuf::from("/data/plans.db"));
        assert_eq!(cfg.max_steps, 50);
        assert_eq!(cfg.tool_timeout, Duration::from_secs(30));
        assert_eq!(cfg.turn_limits().lock_wait, Duration::from_secs(2));
    }
}
