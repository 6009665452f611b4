//! Process configuration, read from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use wgrid_ai::{DetectorConfig, DEFAULT_COOLDOWN_MINUTES, DEFAULT_RETENTION_HOURS};
use wgrid_core::{EngineError, EngineResult};
use wgrid_negotiation::NegotiationConfig;
use wgrid_routing::OptimizerConfig;

pub const DEV_JWT_SECRET: &str = "dev-secret";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub negotiation: NegotiationConfig,
    pub optimizer: OptimizerConfig,
    pub detector: DetectorConfig,
    /// Background anomaly scan cadence. Zero disables the scanner.
    pub scan_interval: Duration,
    pub anomaly_cooldown: chrono::Duration,
    /// How long resolved anomalies are kept before pruning.
    pub anomaly_retention: chrono::Duration,
    pub seed_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            negotiation: NegotiationConfig::default(),
            optimizer: OptimizerConfig::default(),
            detector: DetectorConfig::default(),
            scan_interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
            anomaly_cooldown: chrono::Duration::minutes(DEFAULT_COOLDOWN_MINUTES),
            anomaly_retention: chrono::Duration::hours(DEFAULT_RETENTION_HOURS),
            seed_file: None,
        }
    }
}

impl EngineConfig {
    /// Read `WGRID_*` and `JWT_SECRET` from the process environment.
    pub fn from_env() -> EngineResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> EngineResult<Self> {
        let mut cfg = Self::default();

        if let Some(addr) = lookup("WGRID_BIND_ADDR") {
            cfg.bind_addr = addr;
        }

        match lookup("JWT_SECRET") {
            Some(secret) if !secret.trim().is_empty() => cfg.jwt_secret = secret,
            _ => warn!("JWT_SECRET not set; using insecure dev default"),
        }

        if let Some(raw) = lookup("WGRID_BASE_RATE_PER_KM") {
            let rate: f64 = parse("WGRID_BASE_RATE_PER_KM", &raw)?;
            if !(rate.is_finite() && rate >= 0.0) {
                return Err(EngineError::validation(
                    "WGRID_BASE_RATE_PER_KM must be a non-negative number",
                ));
            }
            cfg.negotiation.base_rate_per_km = rate;
        }

        if let Some(raw) = lookup("WGRID_SCAN_INTERVAL_SECS") {
            cfg.scan_interval = Duration::from_secs(parse("WGRID_SCAN_INTERVAL_SECS", &raw)?);
        }

        if let Some(raw) = lookup("WGRID_ANOMALY_COOLDOWN_SECS") {
            let secs: i64 = parse("WGRID_ANOMALY_COOLDOWN_SECS", &raw)?;
            if secs < 0 {
                return Err(EngineError::validation(
                    "WGRID_ANOMALY_COOLDOWN_SECS must not be negative",
                ));
            }
            cfg.anomaly_cooldown = chrono::Duration::seconds(secs);
        }

        if let Some(raw) = lookup("WGRID_ANOMALY_RETENTION_SECS") {
            let secs: i64 = parse("WGRID_ANOMALY_RETENTION_SECS", &raw)?;
            if secs < 0 {
                return Err(EngineError::validation(
                    "WGRID_ANOMALY_RETENTION_SECS must not be negative",
                ));
            }
            cfg.anomaly_retention = chrono::Duration::seconds(secs);
        }

        cfg.seed_file = lookup("WGRID_SEED_FILE")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        cfg.detector.validate().map_err(EngineError::validation)?;
        Ok(cfg)
    }
}

fn parse<T: core::str::FromStr>(key: &str, raw: &str) -> EngineResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| EngineError::validation(format!("{key}: cannot parse '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wgrid_core::ErrorKind;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(cfg.negotiation.base_rate_per_km, 5.0);
        assert_eq!(cfg.scan_interval, Duration::from_secs(60));
        assert_eq!(cfg.anomaly_cooldown, chrono::Duration::minutes(30));
        assert_eq!(cfg.anomaly_retention, chrono::Duration::days(7));
        assert!(cfg.seed_file.is_none());
    }

    #[test]
    fn reads_overrides() {
        let cfg = EngineConfig::from_lookup(lookup(&[
            ("WGRID_BIND_ADDR", "127.0.0.1:9000"),
            ("JWT_SECRET", "prod"),
            ("WGRID_BASE_RATE_PER_KM", "7.5"),
            ("WGRID_SCAN_INTERVAL_SECS", "0"),
            ("WGRID_ANOMALY_COOLDOWN_SECS", "90"),
            ("WGRID_ANOMALY_RETENTION_SECS", "3600"),
            ("WGRID_SEED_FILE", "/etc/wgrid/seed.json"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.jwt_secret, "prod");
        assert_eq!(cfg.negotiation.base_rate_per_km, 7.5);
        assert_eq!(cfg.scan_interval, Duration::ZERO);
        assert_eq!(cfg.anomaly_cooldown, chrono::Duration::seconds(90));
        assert_eq!(cfg.anomaly_retention, chrono::Duration::hours(1));
        assert_eq!(cfg.seed_file, Some(PathBuf::from("/etc/wgrid/seed.json")));
    }

    #[test]
    fn rejects_garbage() {
        let err = EngineConfig::from_lookup(lookup(&[("WGRID_BASE_RATE_PER_KM", "cheap")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        let err = EngineConfig::from_lookup(lookup(&[("WGRID_ANOMALY_COOLDOWN_SECS", "-5")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }
}
