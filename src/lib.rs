//! nonce-worker-core - CPU nonce范围搜索工作单元
//!
//! 单个计算单元在外部协调器分配的nonce范围内反复搜索，
//! 寻找摘要低于主阈值（完整解）或份额阈值（份额）的nonce。
//!
//! ## 架构特点
//!
//! ### 工作协调
//! - 任务整体替换，更新时丢弃当前范围和排队范围
//! - 范围按到达顺序（FIFO）处理
//! - 入站消息只在让出点应用，单写者，无锁
//!
//! ### 搜索循环
//! - 每个nonce检查一次取消信号
//! - 份额立即上报，完整解终止搜索
//! - 256位无截断阈值比较
//!
//! ### 热管理
//! - 基于算力采样的自适应降温
//! - Turbo模式完全跳过
//!
//! ## 使用示例
//!
//! ```no_run
//! use nonce_worker_core::{Worker, WorkerConfig};
//!
//! # async fn demo() -> Result<(), nonce_worker_core::WorkerError> {
//! let (mut worker, handle, mut outbound) = Worker::new(WorkerConfig::default())?;
//! handle.send_frame(r#"{"index":1,"previousHash":"00","data":"block","mainFactor":"0x1","shareFactor":"0x10","minerId":"w1"}"#)?;
//! handle.grant_range(0, 1_000_000)?;
//!
//! tokio::spawn(async move {
//!     while let Some(message) = outbound.recv().await {
//!         if let Ok(frame) = message.encode() {
//!             println!("{}", frame);
//!         }
//!     }
//! });
//!
//! let solution = worker.run().await?;
//! # let _ = solution;
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod config;
pub mod digest;
pub mod message;
pub mod search;
pub mod stats;
pub mod thermal;
pub mod work;
pub mod worker;


// 重新导出主要类型
pub use classifier::{classify, ClassifyError, Outcome};
pub use config::{ConfigError, WorkerConfig};
pub use digest::{digest, Candidate};
pub use message::{InboundMessage, MessageError, OutboundMessage, REQUEST_RANGE};
pub use stats::WorkerStats;
pub use thermal::{ThermalConfig, ThermalGovernor, WindowOutcome};
pub use work::{MiningResult, NonceRange, ResultState, Task};
pub use worker::{Worker, WorkerError, WorkerHandle, WorkerPhase};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
