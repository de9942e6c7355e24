//! 消息边界
//!
//! 外部协调器与工作单元之间的逻辑消息。入站JSON帧按字段形状解析为带标签的
//! [`InboundMessage`]，之后内部只处理强类型消息：
//!
//! ```text
//! {"turboMode": bool}              → ToggleTurbo
//! {"startNonce": n, "endNonce": m} → GrantRange
//! 其他对象                           → AssignOrUpdateTask
//! ```
//!
//! 出站消息中，范围请求为字面量 `requestRange`，结果为JSON序列化的 [`MiningResult`]。

use crate::work::{MiningResult, NonceRange, Task};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// 请求新范围的出站信号
pub const REQUEST_RANGE: &str = "requestRange";

/// 入站消息错误
#[derive(Error, Debug)]
pub enum MessageError {
    #[error("消息不是有效的JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("消息不是JSON对象")]
    NotAnObject,
    #[error("turboMode 必须是布尔值: {0}")]
    InvalidTurbo(Value),
    #[error("无效的nonce范围: {0}")]
    InvalidRange(String),
    #[error("无效的任务数据: {0}")]
    InvalidTask(String),
}

/// 入站消息
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// 切换Turbo模式
    ToggleTurbo(bool),
    /// 分配nonce范围
    GrantRange(NonceRange),
    /// 首次分配或更新任务
    AssignOrUpdateTask(Task),
}

impl InboundMessage {
    /// 解析入站JSON帧
    pub fn decode(frame: &str) -> Result<Self, MessageError> {
        let value: Value = serde_json::from_str(frame)?;
        Self::from_value(value)
    }

    /// 按字段形状解析JSON值
    pub fn from_value(value: Value) -> Result<Self, MessageError> {
        let object = value.as_object().ok_or(MessageError::NotAnObject)?;

        if let Some(turbo) = object.get("turboMode") {
            return turbo
                .as_bool()
                .map(InboundMessage::ToggleTurbo)
                .ok_or_else(|| MessageError::InvalidTurbo(turbo.clone()));
        }

        if object.contains_key("startNonce") && object.contains_key("endNonce") {
            let range: NonceRange = serde_json::from_value(value)
                .map_err(|e| MessageError::InvalidRange(e.to_string()))?;
            if range.is_inverted() {
                warn!("收到反转的nonce范围 {}，按空范围处理", range);
            }
            return Ok(InboundMessage::GrantRange(range));
        }

        let task: Task =
            serde_json::from_value(value).map_err(|e| MessageError::InvalidTask(e.to_string()))?;
        Ok(InboundMessage::AssignOrUpdateTask(task))
    }
}

/// 出站消息
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// 请求新范围
    RequestRange,
    /// 份额结果，不终止搜索
    Share(MiningResult),
    /// 完整解，工作单元随后停止
    Solution(MiningResult),
    /// 入站消息解析失败
    Error { message: String },
}

impl OutboundMessage {
    /// 编码为出站文本帧
    pub fn encode(&self) -> Result<String, MessageError> {
        let frame = match self {
            OutboundMessage::RequestRange => REQUEST_RANGE.to_string(),
            OutboundMessage::Share(result) | OutboundMessage::Solution(result) => {
                serde_json::to_string(result)?
            }
            OutboundMessage::Error { message } => {
                serde_json::to_string(&serde_json::json!({ "error": message }))?
            }
        };
        Ok(frame)
    }

    pub fn result(&self) -> Option<&MiningResult> {
        match self {
            OutboundMessage::Share(result) | OutboundMessage::Solution(result) => Some(result),
            _ => None,
        }
    }
}
