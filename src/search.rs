//! 范围搜索循环
//!
//! 按递增顺序遍历 `[start, end)`，每个nonce：
//! 1. 应用待处理的入站消息，若任务已更新（或已请求关闭）立即中断
//! 2. 调用热管理调度器（可能挂起）
//! 3. 以当前时间戳构建候选记录，计算摘要并判定
//!
//! 完整解立即返回；份额直接上报后继续搜索。取消检查每个nonce只做一次，
//! 不会打断正在进行的摘要计算。

use crate::classifier::{classify, Outcome};
use crate::digest::{digest, Candidate};
use crate::message::OutboundMessage;
use crate::work::{MiningResult, NonceRange, ResultState, Task};
use crate::worker::Worker;
use chrono::Utc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// 算力日志输出间隔
const STATS_REPORT_INTERVAL: Duration = Duration::from_secs(5);

impl Worker {
    /// 搜索单个范围
    ///
    /// 返回 `Some` 表示找到完整解；`None` 表示范围耗尽或被中断。
    pub async fn search_range(&mut self, task: &Task, range: NonceRange) -> Option<MiningResult> {
        if range.is_empty() {
            debug!("工作单元 {} 范围 {} 为空，跳过", self.id, range);
            self.stats.exhausted_ranges += 1;
            return None;
        }

        debug!("工作单元 {} 开始搜索范围 {} ({} 个nonce)", self.id, range, range.len());

        let yield_frequency = self.config.yield_frequency;
        let mut last_report = Instant::now();
        let mut processed = 0u64;

        for nonce in range.nonces() {
            self.pump_inbox();
            if self.task_updated || self.shutdown.is_cancelled() {
                debug!("工作单元 {} 范围 {} 在nonce {} 处中断", self.id, range, nonce);
                self.stats.cancelled_ranges += 1;
                return None;
            }

            self.governor.pace().await;

            let timestamp = Utc::now().timestamp_millis();
            let hash = digest(&Candidate::from_task(task, nonce, timestamp));
            self.stats.hashes += 1;
            processed += 1;

            if let Some(solution) = self.record_candidate(task, nonce, timestamp, hash) {
                return Some(solution);
            }

            if processed % yield_frequency == 0 {
                tokio::task::yield_now().await;
            }

            if last_report.elapsed() >= STATS_REPORT_INTERVAL {
                debug!(
                    "工作单元 {} 算力: {:.2} H/s, 哈希={}, 份额={}",
                    self.id,
                    self.stats.hashrate(),
                    self.stats.hashes,
                    self.stats.shares
                );
                last_report = Instant::now();
            }
        }

        debug!("工作单元 {} 范围 {} 搜索完毕", self.id, range);
        self.stats.exhausted_ranges += 1;
        None
    }

    /// 判定单个候选摘要并记录结果
    ///
    /// 份额直接上报；完整解返回给调用方。无法判定的摘要计数后按未命中处理。
    pub(crate) fn record_candidate(
        &mut self,
        task: &Task,
        nonce: u64,
        timestamp: i64,
        hash: String,
    ) -> Option<MiningResult> {
        match classify(&hash, &task.main_factor, &task.share_factor) {
            Ok(Outcome::Accepted) => {
                self.stats.solutions += 1;
                info!("💎 工作单元 {} 找到完整解: nonce={}", self.id, nonce);
                Some(MiningResult::new(ResultState::Valid, task, hash, nonce, timestamp))
            }
            Ok(Outcome::ShareAccepted) => {
                self.stats.shares += 1;
                debug!("工作单元 {} 找到份额: nonce={} hash={}", self.id, nonce, hash);
                let share = MiningResult::new(ResultState::Share, task, hash, nonce, timestamp);
                self.emit(OutboundMessage::Share(share));
                None
            }
            Ok(Outcome::Rejected) => {
                trace!("nonce={} hash={}", nonce, hash);
                None
            }
            Err(e) => {
                self.stats.invalid_digests += 1;
                warn!("工作单元 {} nonce {} 判定失败，按未命中处理: {}", self.id, nonce, e);
                None
            }
        }
    }
}
