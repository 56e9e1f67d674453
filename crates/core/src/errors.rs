use thiserror::Error;

use crate::models::CallFailure;

/// 中继服务错误类型定义
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("无效的出口路径: {input} - {message}")]
    InvalidEgressPath { input: String, message: String },

    #[error("审计日志错误: {0}")]
    AuditLog(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("调度闸门已关闭")]
    GateClosed,
}

/// 一次调度的失败结果
///
/// `Call` 原样携带调用方返回的失败，其余变体表示调用根本没有发生。
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("上游调用失败: {0}")]
    Call(CallFailure),

    #[error("调度闸门已关闭，调用未执行")]
    GateClosed,

    #[error("出口路径池中没有健康路径 (共 {pool_size} 条)")]
    NoHealthyPath { pool_size: usize },
}

impl DispatchError {
    /// 调用方返回的原始失败（仅 `Call` 变体）
    pub fn call_failure(&self) -> Option<&CallFailure> {
        match self {
            DispatchError::Call(failure) => Some(failure),
            _ => None,
        }
    }
}
