//! 标准输入输出驱动
//!
//! 每行一条JSON入站消息，出站消息逐行写到标准输出，日志写到标准错误。
//!
//! ```text
//! $ cargo run --example stdio_worker
//! {"index":1,"previousHash":"00","data":"block","mainFactor":"0x1","shareFactor":"0x0fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff","minerId":"w1"}
//! {"startNonce":0,"endNonce":100}
//! ```

use nonce_worker_core::{MiningResult, Worker, WorkerConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = WorkerConfig::from_env()?;
    let (mut worker, handle, mut outbound) = Worker::new(config)?;
    info!("工作单元 {} 就绪，从标准输入读取消息", handle.id());

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = outbound.recv().await {
            let finished = message.result().map_or(false, MiningResult::is_solution);
            match message.encode() {
                Ok(frame) => {
                    if stdout.write_all(format!("{}\n", frame).as_bytes()).await.is_err() {
                        break;
                    }
                    let _ = stdout.flush().await;
                }
                Err(e) => warn!("出站消息编码失败: {}", e),
            }
            if finished {
                break;
            }
        }
    });

    let reader_handle = handle;
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            // 解析失败已由句柄记录并回报
            let _ = reader_handle.send_frame(&line);
        }
        info!("标准输入已关闭");
    });

    let result = worker.run().await?;
    // 等待完整解写出
    let _ = writer.await;

    if let Some(solution) = result {
        info!("💎 完整解: nonce={}", solution.nonce);
    }
    Ok(())
}
