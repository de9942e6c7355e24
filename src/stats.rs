//! 工作单元统计信息
//!
//! 只保留吞吐计数器，不保存历史结果。

use tokio::time::Instant;

/// 工作单元统计
#[derive(Debug, Clone)]
pub struct WorkerStats {
    /// 已计算摘要数
    pub hashes: u64,
    /// 已上报份额数
    pub shares: u64,
    /// 找到的完整解数
    pub solutions: u64,
    /// 无效摘要数
    pub invalid_digests: u64,
    /// 搜索完毕的范围数
    pub exhausted_ranges: u64,
    /// 因任务更新或关闭中断的范围数
    pub cancelled_ranges: u64,
    /// 已发送的范围请求数
    pub requested_ranges: u64,
    pub started_at: Instant,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self {
            hashes: 0,
            shares: 0,
            solutions: 0,
            invalid_digests: 0,
            exhausted_ranges: 0,
            cancelled_ranges: 0,
            requested_ranges: 0,
            started_at: Instant::now(),
        }
    }

    /// 平均算力 (H/s)
    pub fn hashrate(&self) -> f64 {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.hashes as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl Default for WorkerStats {
    fn default() -> Self {
        Self::new()
    }
}
