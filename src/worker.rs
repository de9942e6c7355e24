//! # 工作协调器
//!
//! 工作单元的外层控制循环，独占任务、范围队列和更新标记，驱动范围搜索循环。
//! 所有状态由单个异步任务持有（actor模式），外部输入通过一个持久的入站通道
//! 到达，只在明确的让出点（每个nonce之前、等待范围期间）被应用，因此不需要锁。
//!
//! ## 状态机
//!
//! ```text
//! Idle ──(任务+范围)──► Searching ──(完整解)──► Done
//!                        │   ▲
//!          (范围耗尽,队列空)│   │(收到范围 / 队列非空)
//!                        ▼   │
//!                   AwaitingRange
//!                        ▲
//!     (任务更新) Draining ┘  丢弃当前范围和队列，重新请求范围
//! ```
//!
//! 任务更新是边沿触发的：消息处理设置标记，协调器消费时清除；
//! 多次更新只保留最后一次任务数据。

use crate::config::{ConfigError, WorkerConfig};
use crate::message::{InboundMessage, MessageError, OutboundMessage};
use crate::stats::WorkerStats;
use crate::thermal::ThermalGovernor;
use crate::work::{MiningResult, NonceRange, Task};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 工作单元错误类型
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("入站通道已关闭")]
    InboxClosed,
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    #[error("消息错误: {0}")]
    Message(#[from] MessageError),
}

/// 协调器阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// 等待首个任务和范围
    Idle,
    /// 已请求范围，等待分配
    AwaitingRange,
    /// 正在搜索当前范围
    Searching,
    /// 任务已更新，丢弃旧范围
    Draining,
    /// 已找到完整解
    Done,
    /// 已关闭
    Stopped,
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerPhase::Idle => write!(f, "空闲"),
            WorkerPhase::AwaitingRange => write!(f, "等待范围"),
            WorkerPhase::Searching => write!(f, "搜索中"),
            WorkerPhase::Draining => write!(f, "清空中"),
            WorkerPhase::Done => write!(f, "已完成"),
            WorkerPhase::Stopped => write!(f, "已停止"),
        }
    }
}

/// 工作单元句柄 - 外部协调器通过它投递消息
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    worker_id: Uuid,
    inbox: mpsc::UnboundedSender<InboundMessage>,
    outbox: mpsc::UnboundedSender<OutboundMessage>,
    shutdown: CancellationToken,
}

impl WorkerHandle {
    pub fn id(&self) -> Uuid {
        self.worker_id
    }

    /// 投递强类型消息
    pub fn send(&self, message: InboundMessage) -> Result<(), WorkerError> {
        self.inbox.send(message).map_err(|_| WorkerError::InboxClosed)
    }

    /// 投递原始JSON帧；解析失败时记录错误并向外部回报，不影响工作单元运行
    pub fn send_frame(&self, frame: &str) -> Result<(), WorkerError> {
        match InboundMessage::decode(frame) {
            Ok(message) => self.send(message),
            Err(e) => {
                error!("工作单元 {} 收到无法解析的消息: {}", self.worker_id, e);
                let _ = self.outbox.send(OutboundMessage::Error {
                    message: e.to_string(),
                });
                Err(WorkerError::Message(e))
            }
        }
    }

    pub fn assign_task(&self, task: Task) -> Result<(), WorkerError> {
        self.send(InboundMessage::AssignOrUpdateTask(task))
    }

    pub fn grant_range(&self, start: u64, end: u64) -> Result<(), WorkerError> {
        self.send(InboundMessage::GrantRange(NonceRange::new(start, end)))
    }

    pub fn set_turbo(&self, enabled: bool) -> Result<(), WorkerError> {
        self.send(InboundMessage::ToggleTurbo(enabled))
    }

    /// 请求关闭，工作单元在下一个让出点停止
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// 工作单元
pub struct Worker {
    pub(crate) id: Uuid,
    pub(crate) config: WorkerConfig,
    /// 当前任务，更新时整体替换
    pub(crate) task: Option<Arc<Task>>,
    pub(crate) current_range: Option<NonceRange>,
    pub(crate) queued_ranges: VecDeque<NonceRange>,
    /// 任务更新标记
    pub(crate) task_updated: bool,
    pub(crate) governor: ThermalGovernor,
    pub(crate) stats: WorkerStats,
    phase: WorkerPhase,
    inbox: mpsc::UnboundedReceiver<InboundMessage>,
    inbox_closed: bool,
    outbox: mpsc::UnboundedSender<OutboundMessage>,
    pub(crate) shutdown: CancellationToken,
}

impl Worker {
    /// 创建工作单元，返回工作单元、句柄和出站消息接收端
    pub fn new(
        config: WorkerConfig,
    ) -> Result<(Self, WorkerHandle, mpsc::UnboundedReceiver<OutboundMessage>), WorkerError> {
        config.validate()?;

        let id = Uuid::new_v4();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let mut governor = ThermalGovernor::new(config.thermal.clone());
        governor.set_turbo(config.turbo);

        let worker = Self {
            id,
            config,
            task: None,
            current_range: None,
            queued_ranges: VecDeque::new(),
            task_updated: false,
            governor,
            stats: WorkerStats::new(),
            phase: WorkerPhase::Idle,
            inbox: inbox_rx,
            inbox_closed: false,
            outbox: outbox_tx.clone(),
            shutdown: shutdown.clone(),
        };

        let handle = WorkerHandle {
            worker_id: id,
            inbox: inbox_tx,
            outbox: outbox_tx,
            shutdown,
        };

        debug!("创建工作单元 {}", id);
        Ok((worker, handle, outbox_rx))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    pub fn governor(&self) -> &ThermalGovernor {
        &self.governor
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.task.as_deref()
    }

    pub fn queued_ranges(&self) -> impl Iterator<Item = &NonceRange> {
        self.queued_ranges.iter()
    }

    /// 运行直到找到完整解或被关闭
    ///
    /// 找到完整解时先发出 [`OutboundMessage::Solution`]，再返回 `Ok(Some(result))`；
    /// 关闭时返回 `Ok(None)`。
    pub async fn run(&mut self) -> Result<Option<MiningResult>, WorkerError> {
        info!("工作单元 {} 启动，等待任务和范围", self.id);
        self.phase = WorkerPhase::Idle;

        self.pump_inbox();
        while self.task.is_none() || self.queued_ranges.is_empty() {
            if !self.wait_for_input().await? {
                return Ok(self.stop());
            }
        }
        self.current_range = self.queued_ranges.pop_front();

        loop {
            if self.shutdown.is_cancelled() {
                return Ok(self.stop());
            }

            if self.task_updated {
                self.drain();
                self.request_range();
                if !self.await_range().await? {
                    return Ok(self.stop());
                }
                continue;
            }

            let range = match self.current_range.take() {
                Some(range) => range,
                None => {
                    self.request_range();
                    if !self.await_range().await? {
                        return Ok(self.stop());
                    }
                    continue;
                }
            };

            let task = match self.task.clone() {
                Some(task) => task,
                None => {
                    // 任务仅在Idle阶段可能为空
                    warn!("工作单元 {} 没有任务，丢弃范围 {}", self.id, range);
                    continue;
                }
            };

            self.phase = WorkerPhase::Searching;
            match self.search_range(&task, range).await {
                Some(result) => {
                    info!(
                        "🎯 工作单元 {} 上报完整解: nonce={} hash={}",
                        self.id, result.nonce, result.hash
                    );
                    self.emit(OutboundMessage::Solution(result.clone()));
                    self.phase = WorkerPhase::Done;
                    return Ok(Some(result));
                }
                None => {
                    if self.task_updated || self.shutdown.is_cancelled() {
                        continue;
                    }
                    if let Some(next) = self.queued_ranges.pop_front() {
                        debug!("工作单元 {} 从队列取出范围 {}", self.id, next);
                        self.current_range = Some(next);
                    } else {
                        self.request_range();
                        if !self.await_range().await? {
                            return Ok(self.stop());
                        }
                    }
                }
            }
        }
    }

    /// 应用一条入站消息
    pub(crate) fn apply(&mut self, message: InboundMessage) {
        match message {
            InboundMessage::ToggleTurbo(enabled) => {
                self.governor.set_turbo(enabled);
            }
            InboundMessage::GrantRange(range) => {
                debug!("工作单元 {} 收到范围 {}", self.id, range);
                self.queued_ranges.push_back(range);
            }
            InboundMessage::AssignOrUpdateTask(task) => {
                if self.task.is_some() {
                    info!("工作单元 {} 任务已更新: index={}", self.id, task.index);
                    self.task_updated = true;
                } else {
                    info!("工作单元 {} 收到初始任务: index={}", self.id, task.index);
                }
                self.task = Some(Arc::new(task));
            }
        }
    }

    /// 非阻塞地应用所有待处理的入站消息
    pub(crate) fn pump_inbox(&mut self) {
        loop {
            match self.inbox.try_recv() {
                Ok(message) => self.apply(message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.inbox_closed {
                        debug!("工作单元 {} 入站通道已断开", self.id);
                        self.inbox_closed = true;
                    }
                    break;
                }
            }
        }
    }

    /// 挂起直到收到一条消息；返回 `false` 表示已请求关闭
    async fn wait_for_input(&mut self) -> Result<bool, WorkerError> {
        if self.inbox_closed {
            return Err(WorkerError::InboxClosed);
        }

        let shutdown = self.shutdown.clone();
        let message = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(false),
            message = self.inbox.recv() => message,
        };

        match message {
            Some(message) => {
                self.apply(message);
                Ok(true)
            }
            None => {
                self.inbox_closed = true;
                Err(WorkerError::InboxClosed)
            }
        }
    }

    /// 等待新范围或任务更新；返回 `false` 表示已请求关闭
    async fn await_range(&mut self) -> Result<bool, WorkerError> {
        self.phase = WorkerPhase::AwaitingRange;
        self.pump_inbox();

        loop {
            if self.task_updated {
                return Ok(true);
            }
            if let Some(range) = self.queued_ranges.pop_front() {
                self.current_range = Some(range);
                return Ok(true);
            }
            if !self.wait_for_input().await? {
                return Ok(false);
            }
        }
    }

    /// 任务更新后丢弃当前范围和全部排队范围
    fn drain(&mut self) {
        self.phase = WorkerPhase::Draining;
        let discarded = self.queued_ranges.len() + usize::from(self.current_range.is_some());
        self.queued_ranges.clear();
        self.current_range = None;
        self.task_updated = false;
        debug!("工作单元 {} 任务更新，丢弃 {} 个范围", self.id, discarded);
    }

    fn request_range(&mut self) {
        self.stats.requested_ranges += 1;
        debug!("工作单元 {} 请求新范围", self.id);
        self.emit(OutboundMessage::RequestRange);
    }

    pub(crate) fn emit(&self, message: OutboundMessage) {
        if self.outbox.send(message).is_err() {
            debug!("工作单元 {} 出站通道已关闭", self.id);
        }
    }

    fn stop(&mut self) -> Option<MiningResult> {
        self.phase = WorkerPhase::Stopped;
        info!(
            "工作单元 {} 已停止: 哈希={}, 份额={}, 平均算力={:.2} H/s",
            self.id,
            self.stats.hashes,
            self.stats.shares,
            self.stats.hashrate()
        );
        None
    }
}
