//! 基本搜索演示
//!
//! 模拟外部协调器：按CPU核心数创建工作单元，切分nonce空间并按请求分配范围，
//! 收到第一个完整解后关闭所有工作单元。

use nonce_worker_core::{OutboundMessage, Task, Worker, WorkerConfig, WorkerHandle};
use num_bigint::BigUint;
use num_traits::One;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// 每次分配的范围大小
const CHUNK_SIZE: u64 = 50_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("🚀 nonce范围搜索演示");

    let worker_count = num_cpus::get();
    info!("💻 检测到 {} 个CPU核心，创建 {} 个工作单元", worker_count, worker_count);

    let space = BigUint::one() << 256u32;
    let task = Task {
        index: 1,
        previous_hash: "0000000000000000000000000000000000000000000000000000000000000000".to_string(),
        data: "demo block payload".to_string(),
        main_factor: &space >> 18u32,
        share_factor: &space >> 10u32,
        miner_id: String::new(),
    };

    let config = WorkerConfig::from_env()?;
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<(usize, OutboundMessage)>();
    let mut handles: Vec<WorkerHandle> = Vec::with_capacity(worker_count);
    let mut next_nonce = 0u64;

    for i in 0..worker_count {
        let (mut worker, handle, mut outbound) = Worker::new(config.clone())?;

        handle.assign_task(Task {
            miner_id: format!("demo-worker-{}", i),
            ..task.clone()
        })?;
        handle.grant_range(next_nonce, next_nonce + CHUNK_SIZE)?;
        next_nonce += CHUNK_SIZE;

        let events = events_tx.clone();
        tokio::spawn(async move {
            while let Some(message) = outbound.recv().await {
                if events.send((i, message)).is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            if let Err(e) = worker.run().await {
                warn!("工作单元 {} 异常结束: {}", i, e);
            }
        });

        handles.push(handle);
    }
    drop(events_tx);

    let start = Instant::now();
    let mut shares = 0u64;

    while let Some((i, message)) = events_rx.recv().await {
        match message {
            OutboundMessage::RequestRange => {
                handles[i].grant_range(next_nonce, next_nonce + CHUNK_SIZE)?;
                next_nonce += CHUNK_SIZE;
            }
            OutboundMessage::Share(share) => {
                shares += 1;
                info!("📦 工作单元 {} 份额: nonce={} hash={}", i, share.nonce, share.hash);
            }
            OutboundMessage::Solution(solution) => {
                info!("💎 工作单元 {} 找到完整解: {}", i, message_frame(&OutboundMessage::Solution(solution.clone())));
                break;
            }
            OutboundMessage::Error { message } => {
                warn!("工作单元 {} 报告错误: {}", i, message);
            }
        }
    }

    for handle in &handles {
        handle.shutdown();
    }

    info!(
        "✅ 演示完成: 用时 {:.2}s, 已分配nonce {}, 份额 {}",
        start.elapsed().as_secs_f64(),
        next_nonce,
        shares
    );
    Ok(())
}

fn message_frame(message: &OutboundMessage) -> String {
    message.encode().unwrap_or_else(|e| format!("<编码失败: {}>", e))
}
