use crate::models::AuditRecord;
use crate::RelayResult;

/// 审计日志写入端
///
/// `append` 不能阻塞调度路径：实现应当只做入队或内存写入，
/// 真正的持久化放到后台完成。
pub trait AuditSink: Send + Sync {
    fn append(&self, record: AuditRecord) -> RelayResult<()>;
}

/// 丢弃所有记录的写入端（审计关闭时使用）
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn append(&self, _record: AuditRecord) -> RelayResult<()> {
        Ok(())
    }
}
