//! 摘要计算模块
//!
//! 候选记录按固定顺序和固定分隔符拼接为文本后计算SHA256，输出64位小写十六进制字符串。
//! 拼接格式: `{index}-{previous_hash}-{data}-{nonce}-{timestamp}-{miner_id}`
//!
//! 修改字段顺序或分隔符会改变所有摘要，属于破坏性的格式变更。

use crate::work::Task;
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// 摘要十六进制长度 (SHA256 = 32字节)
pub const DIGEST_HEX_LEN: usize = 64;

/// 候选记录 - 实际参与哈希的字段元组
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub index: u64,
    pub previous_hash: &'a str,
    pub data: &'a str,
    pub nonce: u64,
    /// 评估时刻的Unix毫秒时间戳
    pub timestamp: i64,
    pub miner_id: &'a str,
}

impl<'a> Candidate<'a> {
    /// 基于任务字段构建候选记录
    pub fn from_task(task: &'a Task, nonce: u64, timestamp: i64) -> Self {
        Self {
            index: task.index,
            previous_hash: &task.previous_hash,
            data: &task.data,
            nonce,
            timestamp,
            miner_id: &task.miner_id,
        }
    }

    /// 规范化文本表示
    pub fn canonical_text(&self) -> String {
        let mut text = String::with_capacity(
            self.previous_hash.len() + self.data.len() + self.miner_id.len() + 64,
        );
        // 写入String不会失败
        let _ = write!(
            text,
            "{}-{}-{}-{}-{}-{}",
            self.index, self.previous_hash, self.data, self.nonce, self.timestamp, self.miner_id
        );
        text
    }
}

/// 计算候选记录的SHA256摘要（小写十六进制）
#[inline]
pub fn digest(candidate: &Candidate<'_>) -> String {
    let hash = Sha256::digest(candidate.canonical_text().as_bytes());
    hex::encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(nonce: u64, timestamp: i64) -> Candidate<'static> {
        Candidate {
            index: 7,
            previous_hash: "00ab",
            data: "payload",
            nonce,
            timestamp,
            miner_id: "miner-1",
        }
    }

    #[test]
    fn test_canonical_text_layout() {
        let candidate = sample(42, 1_700_000_000_000);
        assert_eq!(
            candidate.canonical_text(),
            "7-00ab-payload-42-1700000000000-miner-1"
        );
    }

    #[test]
    fn test_digest_known_vector() {
        let candidate = Candidate {
            index: 0,
            previous_hash: "",
            data: "",
            nonce: 0,
            timestamp: 0,
            miner_id: "",
        };
        let expected = hex::encode(Sha256::digest(b"0---0-0-"));
        assert_eq!(candidate.canonical_text(), "0---0-0-");
        assert_eq!(digest(&candidate), expected);
    }

    #[test]
    fn test_digest_is_deterministic() {
        let a = digest(&sample(1, 1000));
        let b = digest(&sample(1, 1000));
        assert_eq!(a, b);
        assert_eq!(a.len(), DIGEST_HEX_LEN);
        assert!(a.bytes().all(|c| c.is_ascii_digit() || (b'a'..=b'f').contains(&c)));
    }

    #[test]
    fn test_digest_changes_with_any_field() {
        let base = digest(&sample(1, 1000));
        assert_ne!(base, digest(&sample(2, 1000)));
        assert_ne!(base, digest(&sample(1, 1001)));

        let mut other = sample(1, 1000);
        other.data = "payload2";
        assert_ne!(base, digest(&other));

        let mut other = sample(1, 1000);
        other.miner_id = "miner-2";
        assert_ne!(base, digest(&other));
    }
}
