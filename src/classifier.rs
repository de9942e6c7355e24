//! 摘要判定模块
//!
//! 将十六进制摘要解析为任意精度无符号整数，与主阈值、份额阈值比较：
//! - `V < main`  → [`Outcome::Accepted`] 完整解
//! - `V < share` → [`Outcome::ShareAccepted`] 份额
//! - 其他        → [`Outcome::Rejected`]

use num_bigint::BigUint;
use std::fmt;
use thiserror::Error;

/// 判定错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("无效摘要: {0:?}")]
    InvalidDigest(String),
}

/// 判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// 低于主阈值 - 完整解
    Accepted,
    /// 低于份额阈值 - 部分工作量证明
    ShareAccepted,
    Rejected,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Accepted => write!(f, "完整解"),
            Outcome::ShareAccepted => write!(f, "份额"),
            Outcome::Rejected => write!(f, "未命中"),
        }
    }
}

/// 解析十六进制摘要为无符号大整数
pub fn parse_digest(digest_hex: &str) -> Result<BigUint, ClassifyError> {
    if digest_hex.is_empty() || !digest_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ClassifyError::InvalidDigest(digest_hex.to_string()));
    }

    BigUint::parse_bytes(digest_hex.as_bytes(), 16)
        .ok_or_else(|| ClassifyError::InvalidDigest(digest_hex.to_string()))
}

/// 按主阈值和份额阈值对摘要进行判定
///
/// `share_threshold` 预期不小于 `main_threshold`，这里不强制检查。
pub fn classify(
    digest_hex: &str,
    main_threshold: &BigUint,
    share_threshold: &BigUint,
) -> Result<Outcome, ClassifyError> {
    let value = parse_digest(digest_hex)?;

    let outcome = if &value < main_threshold {
        Outcome::Accepted
    } else if &value < share_threshold {
        Outcome::ShareAccepted
    } else {
        Outcome::Rejected
    };

    Ok(outcome)
}
