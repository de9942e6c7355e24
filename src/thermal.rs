//! 热管理模块
//!
//! 基于算力采样的自适应降温调度：按固定测量间隔统计已处理数量，
//! 首个窗口记录基准算力，之后若当前算力低于基准的一定比例，
//! 则在下一次调用时插入一次降温暂停。
//!
//! 基准算力在调度器生命周期内只记录一次，降温后不会重新设定基准。
//! 开启Turbo模式后调度器完全跳过：不计数、不测量、不暂停。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// 热管理配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalConfig {
    /// 测量间隔（毫秒）
    pub measure_interval_ms: u64,
    /// 降温暂停时长（毫秒）
    pub cooldown_ms: u64,
    /// 降温触发比例：当前算力 / 基准算力 低于该值时触发
    pub throttle_ratio: f64,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            measure_interval_ms: 2000,
            cooldown_ms: 1000,
            throttle_ratio: 0.7,
        }
    }
}

impl ThermalConfig {
    pub fn measure_interval(&self) -> Duration {
        Duration::from_millis(self.measure_interval_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// 单次采样的窗口判定
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowOutcome {
    /// Turbo模式，未计数
    Bypassed,
    /// 测量窗口尚未结束
    Open,
    /// 首个窗口，记录基准算力
    Baseline { rate: f64 },
    /// 算力正常
    Normal { rate: f64, ratio: f64 },
    /// 算力下降，需要降温
    Throttled { rate: f64, ratio: f64 },
}

impl fmt::Display for WindowOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowOutcome::Bypassed => write!(f, "Turbo跳过"),
            WindowOutcome::Open => write!(f, "采样中"),
            WindowOutcome::Baseline { rate } => write!(f, "基准 {:.2} H/s", rate),
            WindowOutcome::Normal { rate, ratio } => {
                write!(f, "正常 {:.2} H/s ({:.0}%)", rate, ratio * 100.0)
            }
            WindowOutcome::Throttled { rate, ratio } => {
                write!(f, "降温 {:.2} H/s ({:.0}%)", rate, ratio * 100.0)
            }
        }
    }
}

/// 热管理调度器
#[derive(Debug)]
pub struct ThermalGovernor {
    config: ThermalConfig,
    /// 当前窗口内已处理数量
    units_processed: u64,
    window_start: Instant,
    baseline_rate: Option<f64>,
    cooldown_pending: bool,
    turbo: bool,
    /// 累计降温次数
    cooldowns_taken: u64,
}

impl ThermalGovernor {
    /// 创建热管理调度器，测量窗口从当前时刻开始
    pub fn new(config: ThermalConfig) -> Self {
        Self::with_window_start(config, Instant::now())
    }

    /// 以指定时刻作为首个测量窗口起点
    pub fn with_window_start(config: ThermalConfig, window_start: Instant) -> Self {
        Self {
            config,
            units_processed: 0,
            window_start,
            baseline_rate: None,
            cooldown_pending: false,
            turbo: false,
            cooldowns_taken: 0,
        }
    }

    /// 切换Turbo模式，下一次调用时生效
    pub fn set_turbo(&mut self, enabled: bool) {
        if self.turbo != enabled {
            info!("🔥 Turbo模式: {}", if enabled { "开启" } else { "关闭" });
        }
        self.turbo = enabled;
    }

    pub fn is_turbo(&self) -> bool {
        self.turbo
    }

    pub fn baseline_rate(&self) -> Option<f64> {
        self.baseline_rate
    }

    pub fn is_cooldown_pending(&self) -> bool {
        self.cooldown_pending
    }

    pub fn units_processed(&self) -> u64 {
        self.units_processed
    }

    pub fn cooldowns_taken(&self) -> u64 {
        self.cooldowns_taken
    }

    /// 记录一个已处理单位，并在窗口结束时更新降温标记
    pub fn record_unit(&mut self, now: Instant) -> WindowOutcome {
        if self.turbo {
            return WindowOutcome::Bypassed;
        }

        self.units_processed += 1;

        // 零时长窗口无法计算算力，保持采样
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed.is_zero() || elapsed < self.config.measure_interval() {
            return WindowOutcome::Open;
        }

        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let rate = self.units_processed as f64 * 1000.0 / elapsed_ms;

        let outcome = match self.baseline_rate {
            None => {
                self.baseline_rate = Some(rate);
                WindowOutcome::Baseline { rate }
            }
            Some(baseline) => {
                let ratio = rate / baseline;
                self.cooldown_pending = ratio < self.config.throttle_ratio;
                if self.cooldown_pending {
                    WindowOutcome::Throttled { rate, ratio }
                } else {
                    WindowOutcome::Normal { rate, ratio }
                }
            }
        };

        debug!("热管理窗口: {} ({} 个 / {:.0} ms)", outcome, self.units_processed, elapsed_ms);

        self.units_processed = 0;
        self.window_start = now;
        outcome
    }

    /// 取出待执行的降温时长，一次触发只降温一次
    pub fn take_cooldown(&mut self) -> Option<Duration> {
        if !self.cooldown_pending {
            return None;
        }
        self.cooldown_pending = false;
        self.cooldowns_taken += 1;
        Some(self.config.cooldown())
    }

    /// 每个候选值调用一次；需要降温时挂起调用方
    ///
    /// 返回是否执行了降温暂停。
    pub async fn pace(&mut self) -> bool {
        if self.turbo {
            return false;
        }

        self.record_unit(Instant::now());

        match self.take_cooldown() {
            Some(cooldown) => {
                debug!("❄️ 算力下降，降温 {} ms", cooldown.as_millis());
                tokio::time::sleep(cooldown).await;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    /// 在一个测量窗口内均匀记录 `units` 个单位
    fn run_window(governor: &mut ThermalGovernor, start: Instant, units: u64) -> WindowOutcome {
        for _ in 1..units {
            assert_eq!(governor.record_unit(start + ms(1)), WindowOutcome::Open);
        }
        governor.record_unit(start + ms(2000))
    }

    #[test]
    fn test_thermal_config_default() {
        let config = ThermalConfig::default();
        assert_eq!(config.measure_interval_ms, 2000);
        assert_eq!(config.cooldown_ms, 1000);
        assert_eq!(config.throttle_ratio, 0.7);
    }

    #[test]
    fn test_first_window_sets_baseline_only() {
        let t0 = Instant::now();
        let mut governor = ThermalGovernor::with_window_start(ThermalConfig::default(), t0);

        // 即使首个窗口算力极低，也只记录基准
        let outcome = governor.record_unit(t0 + ms(2000));
        assert!(matches!(outcome, WindowOutcome::Baseline { .. }));
        assert_eq!(governor.baseline_rate(), Some(0.5));
        assert!(!governor.is_cooldown_pending());
        assert_eq!(governor.units_processed(), 0);
    }

    #[test]
    fn test_window_stays_open_before_interval() {
        let t0 = Instant::now();
        let mut governor = ThermalGovernor::with_window_start(ThermalConfig::default(), t0);

        assert_eq!(governor.record_unit(t0 + ms(1999)), WindowOutcome::Open);
        assert_eq!(governor.units_processed(), 1);
        assert_eq!(governor.baseline_rate(), None);
    }

    #[test]
    fn test_throttle_trigger_below_ratio() {
        let t0 = Instant::now();
        let mut governor = ThermalGovernor::with_window_start(ThermalConfig::default(), t0);

        // 基准: 100个 / 2s = 50 H/s
        let outcome = run_window(&mut governor, t0, 100);
        assert_eq!(outcome, WindowOutcome::Baseline { rate: 50.0 });

        // 60个 / 2s = 30 H/s, 比例0.6 < 0.7
        let t1 = t0 + ms(2000);
        let outcome = run_window(&mut governor, t1, 60);
        assert!(matches!(outcome, WindowOutcome::Throttled { .. }));
        assert!(governor.is_cooldown_pending());

        assert_eq!(governor.take_cooldown(), Some(ms(1000)));
        assert!(!governor.is_cooldown_pending());
        assert_eq!(governor.take_cooldown(), None);
        assert_eq!(governor.cooldowns_taken(), 1);
    }

    #[test]
    fn test_recovered_rate_clears_pending() {
        let t0 = Instant::now();
        let mut governor = ThermalGovernor::with_window_start(ThermalConfig::default(), t0);

        run_window(&mut governor, t0, 100);
        run_window(&mut governor, t0 + ms(2000), 10);
        assert!(governor.is_cooldown_pending());

        // 比例 0.7 不低于阈值
        let outcome = run_window(&mut governor, t0 + ms(4000), 70);
        assert!(matches!(outcome, WindowOutcome::Normal { .. }));
        assert!(!governor.is_cooldown_pending());
        // 基准不会被重新设定
        assert_eq!(governor.baseline_rate(), Some(50.0));
    }

    #[test]
    fn test_zero_interval_never_yields_infinite_rate() {
        let t0 = Instant::now();
        let config = ThermalConfig {
            measure_interval_ms: 0,
            ..Default::default()
        };
        let mut governor = ThermalGovernor::with_window_start(config, t0);

        assert_eq!(governor.record_unit(t0), WindowOutcome::Open);
        match governor.record_unit(t0 + ms(1)) {
            WindowOutcome::Baseline { rate } => assert!((rate - 2000.0).abs() < 1e-6),
            other => panic!("unexpected outcome: {:?}", other),
        }

        // 同一时刻的采样留在新窗口内
        assert_eq!(governor.record_unit(t0 + ms(1)), WindowOutcome::Open);
        match governor.record_unit(t0 + ms(2)) {
            WindowOutcome::Normal { rate, ratio } => {
                assert!(rate.is_finite());
                assert_eq!(ratio, 1.0);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_turbo_skips_counting() {
        let t0 = Instant::now();
        let mut governor = ThermalGovernor::with_window_start(ThermalConfig::default(), t0);
        governor.set_turbo(true);

        assert_eq!(governor.record_unit(t0 + ms(5000)), WindowOutcome::Bypassed);
        assert_eq!(governor.units_processed(), 0);
        assert_eq!(governor.baseline_rate(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pace_sleeps_for_cooldown_after_throttle() {
        let t0 = Instant::now();
        let mut governor = ThermalGovernor::with_window_start(ThermalConfig::default(), t0);

        run_window(&mut governor, t0, 100);
        run_window(&mut governor, t0 + ms(2000), 10);
        assert!(governor.is_cooldown_pending());

        let before = Instant::now();
        assert!(governor.pace().await);
        assert!(before.elapsed() >= ms(1000));
        assert!(!governor.is_cooldown_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_turbo_never_sleeps() {
        let t0 = Instant::now();
        let mut governor = ThermalGovernor::with_window_start(ThermalConfig::default(), t0);

        run_window(&mut governor, t0, 100);
        run_window(&mut governor, t0 + ms(2000), 1);
        assert!(governor.is_cooldown_pending());

        governor.set_turbo(true);
        let before = Instant::now();
        for _ in 0..1000 {
            assert!(!governor.pace().await);
        }
        assert_eq!(before.elapsed(), Duration::ZERO);
        assert_eq!(governor.cooldowns_taken(), 0);
    }
}
