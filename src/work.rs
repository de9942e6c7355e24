//! 工作数据模型
//!
//! - [`Task`]: 当前搜索的任务参数，由协调器整体替换
//! - [`NonceRange`]: 半开区间 `[start, end)` 的nonce范围
//! - [`MiningResult`]: 命中份额或完整解时上报的结果

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// 搜索任务
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// 序号
    pub index: u64,
    /// 前一摘要
    pub previous_hash: String,
    /// 任务负载
    pub data: String,
    /// 主阈值：摘要值低于该值即为完整解
    #[serde(with = "threshold")]
    pub main_factor: BigUint,
    /// 份额阈值
    #[serde(with = "threshold")]
    pub share_factor: BigUint,
    /// 矿工标识
    pub miner_id: String,
}

/// nonce搜索区间 `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonceRange {
    #[serde(rename = "startNonce")]
    pub start: u64,
    #[serde(rename = "endNonce")]
    pub end: u64,
}

impl NonceRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// 区间内nonce数量，反转区间视为空
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// 起点大于终点
    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    pub fn nonces(&self) -> Range<u64> {
        self.start..self.end
    }
}

impl fmt::Display for NonceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// 结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultState {
    /// 完整解
    Valid,
    /// 份额
    Share,
}

/// 挖矿结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningResult {
    pub state: ResultState,
    pub hash: String,
    pub data: String,
    pub nonce: u64,
    pub timestamp: i64,
    pub miner_id: String,
}

impl MiningResult {
    pub fn new(state: ResultState, task: &Task, hash: String, nonce: u64, timestamp: i64) -> Self {
        Self {
            state,
            hash,
            data: task.data.clone(),
            nonce,
            timestamp,
            miner_id: task.miner_id.clone(),
        }
    }

    pub fn is_solution(&self) -> bool {
        self.state == ResultState::Valid
    }
}

/// 解析阈值：非负整数、十进制字符串或 `0x` 前缀的十六进制字符串
pub fn parse_threshold(value: &serde_json::Value) -> Result<BigUint, String> {
    use num_traits::FromPrimitive;

    match value {
        serde_json::Value::Number(number) => {
            if let Some(v) = number.as_u64() {
                return Ok(BigUint::from(v));
            }
            match number.as_f64() {
                Some(v) if v >= 0.0 && v.fract() == 0.0 => BigUint::from_f64(v)
                    .ok_or_else(|| format!("阈值超出范围: {}", number)),
                _ => Err(format!("阈值必须是非负整数: {}", number)),
            }
        }
        serde_json::Value::String(text) => {
            let text = text.trim();
            let (digits, radix) = match text
                .strip_prefix("0x")
                .or_else(|| text.strip_prefix("0X"))
            {
                Some(hex_digits) => (hex_digits, 16),
                None => (text, 10),
            };

            if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
                return Err(format!("无法解析阈值: {:?}", text));
            }

            BigUint::parse_bytes(digits.as_bytes(), radix)
                .ok_or_else(|| format!("无法解析阈值: {:?}", text))
        }
        other => Err(format!("阈值类型无效: {}", other)),
    }
}

mod threshold {
    use num_bigint::BigUint;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        super::parse_threshold(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::{One, Zero};
    use serde_json::json;

    #[test]
    fn test_task_from_wire_json() {
        let task: Task = serde_json::from_value(json!({
            "index": 3,
            "previousHash": "abc",
            "data": "hello",
            "mainFactor": "0x10",
            "shareFactor": 4096,
            "minerId": "m-1",
        }))
        .unwrap();

        assert_eq!(task.index, 3);
        assert_eq!(task.previous_hash, "abc");
        assert_eq!(task.main_factor, BigUint::from(16u32));
        assert_eq!(task.share_factor, BigUint::from(4096u32));
        assert_eq!(task.miner_id, "m-1");
    }

    #[test]
    fn test_threshold_parsing() {
        let max = (BigUint::one() << 256u32) - BigUint::one();
        let max_hex = format!("0x{}", "f".repeat(64));
        assert_eq!(parse_threshold(&json!(max_hex)), Ok(max.clone()));
        assert_eq!(parse_threshold(&json!(max.to_string())), Ok(max));
        assert_eq!(parse_threshold(&json!(0)), Ok(BigUint::zero()));
        assert_eq!(parse_threshold(&json!(1e20)), Ok(BigUint::from(100_000_000_000_000_000_000u128)));

        assert!(parse_threshold(&json!(-1)).is_err());
        assert!(parse_threshold(&json!(1.5)).is_err());
        assert!(parse_threshold(&json!("")).is_err());
        assert!(parse_threshold(&json!("-5")).is_err());
        assert!(parse_threshold(&json!("0xzz")).is_err());
        assert!(parse_threshold(&json!(null)).is_err());
    }

    #[test]
    fn test_task_serialization_keeps_thresholds_exact() {
        let task = Task {
            index: 1,
            previous_hash: "p".into(),
            data: "d".into(),
            main_factor: BigUint::one() << 200u32,
            share_factor: BigUint::one() << 250u32,
            miner_id: "m".into(),
        };
        let text = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&text).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_nonce_range_bounds() {
        let range = NonceRange::new(5, 8);
        assert_eq!(range.len(), 3);
        assert_eq!(range.nonces().collect::<Vec<_>>(), vec![5, 6, 7]);

        assert!(NonceRange::new(4, 4).is_empty());

        let inverted = NonceRange::new(9, 2);
        assert!(inverted.is_inverted());
        assert!(inverted.is_empty());
        assert_eq!(inverted.len(), 0);
        assert_eq!(inverted.nonces().count(), 0);
    }

    #[test]
    fn test_mining_result_wire_shape() {
        let result = MiningResult {
            state: ResultState::Share,
            hash: "00ff".into(),
            data: "d".into(),
            nonce: 12,
            timestamp: 1_700_000_000_000,
            miner_id: "m".into(),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "state": "share",
                "hash": "00ff",
                "data": "d",
                "nonce": 12,
                "timestamp": 1_700_000_000_000i64,
                "minerId": "m",
            })
        );
    }
}
