//! 工作单元配置
//!
//! 优先级：环境变量 > 默认值。无法解析的环境变量记录警告后忽略。

use crate::thermal::ThermalConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const ENV_MEASURE_INTERVAL_MS: &str = "NONCE_WORKER_MEASURE_INTERVAL_MS";
pub const ENV_COOLDOWN_MS: &str = "NONCE_WORKER_COOLDOWN_MS";
pub const ENV_THROTTLE_RATIO: &str = "NONCE_WORKER_THROTTLE_RATIO";
pub const ENV_YIELD_FREQUENCY: &str = "NONCE_WORKER_YIELD_FREQUENCY";
pub const ENV_TURBO: &str = "NONCE_WORKER_TURBO";

/// 配置错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("测量间隔必须大于0")]
    ZeroMeasureInterval,
    #[error("降温比例必须在 (0, 1] 范围内: {0}")]
    InvalidThrottleRatio(f64),
    #[error("让出频率必须大于0")]
    ZeroYieldFrequency,
}

/// 工作单元配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// 热管理配置
    pub thermal: ThermalConfig,
    /// 每处理多少个nonce让出一次运行时
    pub yield_frequency: u64,
    /// 启动时是否开启Turbo模式
    pub turbo: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thermal: ThermalConfig::default(),
            yield_frequency: platform_yield_frequency(),
            turbo: false,
        }
    }
}

impl WorkerConfig {
    /// 从环境变量读取配置
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过自定义查找函数读取配置
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var::<u64, _>(&lookup, ENV_MEASURE_INTERVAL_MS) {
            config.thermal.measure_interval_ms = v;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, ENV_COOLDOWN_MS) {
            config.thermal.cooldown_ms = v;
        }
        if let Some(v) = parse_var::<f64, _>(&lookup, ENV_THROTTLE_RATIO) {
            config.thermal.throttle_ratio = v;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, ENV_YIELD_FREQUENCY) {
            config.yield_frequency = v;
        }
        if let Some(v) = parse_var::<bool, _>(&lookup, ENV_TURBO) {
            config.turbo = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thermal.measure_interval_ms == 0 {
            return Err(ConfigError::ZeroMeasureInterval);
        }
        let ratio = self.thermal.throttle_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(ConfigError::InvalidThrottleRatio(ratio));
        }
        if self.yield_frequency == 0 {
            return Err(ConfigError::ZeroYieldFrequency);
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => {
            info!("从环境变量读取 {} = {}", key, raw.trim());
            Some(value)
        }
        Err(_) => {
            warn!("环境变量 {} 的值 {:?} 无法解析，使用默认值", key, raw);
            None
        }
    }
}

/// 平台相关的默认让出频率
pub fn platform_yield_frequency() -> u64 {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("macos", "aarch64") => 10_000, // Apple Silicon 高效核心，较少让出
        ("macos", "x86_64") => 8_000,
        ("linux", "x86_64") => 5_000,
        ("linux", "aarch64") => 6_000,
        ("windows", "x86_64") => 7_000,
        _ => 10_000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.thermal, ThermalConfig::default());
        assert!(!config.turbo);
        assert!(config.yield_frequency > 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = WorkerConfig::from_lookup(lookup_from(&[
            (ENV_MEASURE_INTERVAL_MS, "500"),
            (ENV_COOLDOWN_MS, "250"),
            (ENV_THROTTLE_RATIO, "0.5"),
            (ENV_YIELD_FREQUENCY, "128"),
            (ENV_TURBO, "true"),
        ]))
        .unwrap();

        assert_eq!(config.thermal.measure_interval_ms, 500);
        assert_eq!(config.thermal.cooldown_ms, 250);
        assert_eq!(config.thermal.throttle_ratio, 0.5);
        assert_eq!(config.yield_frequency, 128);
        assert!(config.turbo);
    }

    #[test]
    fn test_unparsable_env_falls_back_to_default() {
        let config = WorkerConfig::from_lookup(lookup_from(&[
            (ENV_COOLDOWN_MS, "soon"),
            (ENV_TURBO, "maybe"),
        ]))
        .unwrap();

        assert_eq!(config.thermal.cooldown_ms, 1000);
        assert!(!config.turbo);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert_eq!(
            WorkerConfig::from_lookup(lookup_from(&[(ENV_MEASURE_INTERVAL_MS, "0")])),
            Err(ConfigError::ZeroMeasureInterval)
        );
        assert_eq!(
            WorkerConfig::from_lookup(lookup_from(&[(ENV_THROTTLE_RATIO, "1.5")])),
            Err(ConfigError::InvalidThrottleRatio(1.5))
        );
        assert_eq!(
            WorkerConfig::from_lookup(lookup_from(&[(ENV_YIELD_FREQUENCY, "0")])),
            Err(ConfigError::ZeroYieldFrequency)
        );
    }
}
