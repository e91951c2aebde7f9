//! Demo settings loaded from an optional JSON file.

use std::ops::RangeInclusive;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use wire::Limits;

const TICK_HZ: RangeInclusive<u32> = 1..=1000;
const ENEMY_INTERVAL: RangeInclusive<f32> = 0.01..=3600.0;
const REPORT_INTERVAL: RangeInclusive<f32> = 0.1..=3600.0;

/// Settings shared by both roles. Command-line flags override these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    pub host: String,
    pub port: u16,
    pub tick_hz: u32,
    /// Seconds between enemy spawns on the server.
    pub enemy_interval: f32,
    /// Seconds between status reports.
    pub report_interval: f32,
    pub seed: u64,
    pub max_frame_bytes: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 7777,
            tick_hz: 60,
            enemy_interval: 1.0,
            report_interval: 2.0,
            seed: 1,
            max_frame_bytes: Limits::default().max_frame_bytes,
        }
    }
}

impl DemoConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            TICK_HZ.contains(&self.tick_hz),
            "tick_hz must be within {TICK_HZ:?}, got {}",
            self.tick_hz
        );
        // NaN fails `contains`.
        ensure!(
            ENEMY_INTERVAL.contains(&self.enemy_interval),
            "enemy_interval must be within {ENEMY_INTERVAL:?} seconds, got {}",
            self.enemy_interval
        );
        ensure!(
            REPORT_INTERVAL.contains(&self.report_interval),
            "report_interval must be within {REPORT_INTERVAL:?} seconds, got {}",
            self.report_interval
        );
        ensure!(self.max_frame_bytes > 0, "max_frame_bytes must be positive");
        Ok(())
    }

    #[must_use]
    pub fn limits(&self) -> Limits {
        Limits {
            max_frame_bytes: self.max_frame_bytes,
            ..Limits::default()
        }
    }

    /// Fixed simulation step in seconds.
    #[must_use]
    pub fn tick_seconds(&self) -> f32 {
        1.0 / self.tick_hz as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: DemoConfig = serde_json::from_str(r#"{"port": 9000, "seed": 42}"#).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.seed, 42);
        assert_eq!(config.tick_hz, DemoConfig::default().tick_hz);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(serde_json::from_str::<DemoConfig>(r#"{"prot": 9000}"#).is_err());
    }

    #[test]
    fn zero_tick_rate_is_invalid() {
        let config = DemoConfig {
            tick_hz: 0,
            ..DemoConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn intervals_are_bounded() {
        for (enemy, report) in [
            (1e-9, 2.0),
            (1.0, 1e20),
            (f32::NAN, 2.0),
            (1.0, f32::INFINITY),
            (1.0, 0.0),
        ] {
            let config = DemoConfig {
                enemy_interval: enemy,
                report_interval: report,
                ..DemoConfig::default()
            };
            assert!(config.validate().is_err(), "{enemy} / {report}");
        }
        let config = DemoConfig {
            enemy_interval: 0.01,
            report_interval: 3600.0,
            ..DemoConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn absurd_tick_rate_is_invalid() {
        let config = DemoConfig {
            tick_hz: 1_000_000,
            ..DemoConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn limits_follow_frame_size() {
        let config = DemoConfig {
            max_frame_bytes: 2048,
            ..DemoConfig::default()
        };
        assert_eq!(config.limits().max_frame_bytes, 2048);
        assert_eq!(config.limits().max_kind_len, Limits::default().max_kind_len);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = DemoConfig::load(Path::new("/nonexistent/mpnet-demo.json")).unwrap_err();
        assert!(err.to_string().contains("read config"));
    }
}
