//! Append-only JSON-lines audit log
//!
//! Records are queued on an unbounded channel and written by a single
//! background task, so callers never block on disk I/O and lines from
//! concurrent dispatches never interleave.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use relay_core::{AuditRecord, AuditSink, RelayError, RelayResult};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::observability::MetricsCollector;

enum AuditCommand {
    Append(AuditRecord),
    Flush(oneshot::Sender<()>),
}

/// JSON-lines 审计日志写入端
#[derive(Clone)]
pub struct JsonLinesAuditLog {
    path: Arc<PathBuf>,
    sender: mpsc::UnboundedSender<AuditCommand>,
}

impl JsonLinesAuditLog {
    /// 启动后台写入任务
    ///
    /// 所有克隆都被丢弃后写入任务处理完剩余记录并退出。必须在 tokio 运行时内调用。
    pub fn spawn(path: impl Into<PathBuf>, metrics: MetricsCollector) -> (Self, JoinHandle<()>) {
        let path = Arc::new(path.into());
        let (sender, receiver) = mpsc::unbounded_channel();

        let writer = AuditWriter {
            path: Arc::clone(&path),
            file: None,
            pending_newline: false,
            metrics,
        };
        let handle = tokio::spawn(writer.run(receiver));

        info!("审计日志写入任务已启动: {}", path.display());
        (Self { path, sender }, handle)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 等待此前入队的记录全部写入
    pub async fn flush(&self) -> RelayResult<()> {
        let (reply, done) = oneshot::channel();
        self.sender
            .send(AuditCommand::Flush(reply))
            .map_err(|_| RelayError::AuditLog("审计日志写入任务已停止".to_string()))?;
        done.await
            .map_err(|_| RelayError::AuditLog("审计日志写入任务已停止".to_string()))
    }
}

impl AuditSink for JsonLinesAuditLog {
    fn append(&self, record: AuditRecord) -> RelayResult<()> {
        self.sender
            .send(AuditCommand::Append(record))
            .map_err(|_| RelayError::AuditLog("审计日志写入任务已停止".to_string()))
    }
}

struct AuditWriter {
    path: Arc<PathBuf>,
    file: Option<File>,
    /// 文件末尾是一条未写完的记录，下一条记录需要另起一行
    pending_newline: bool,
    metrics: MetricsCollector,
}

impl AuditWriter {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<AuditCommand>) {
        while let Some(command) = receiver.recv().await {
            match command {
                AuditCommand::Append(record) => {
                    if let Err(e) = self.write(&record).await {
                        error!("写入审计日志失败 {}: {}", self.path.display(), e);
                        self.metrics.record_audit_write_failure();
                        // 下一条记录重新打开文件，并检查是否留下了半行
                        self.file = None;
                    }
                }
                AuditCommand::Flush(reply) => {
                    let _ = reply.send(());
                }
            }
        }

        debug!("审计日志写入任务退出: {}", self.path.display());
    }

    async fn write(&mut self, record: &AuditRecord) -> RelayResult<()> {
        let mut line = record.to_json_line()?;

        if self.file.is_none() {
            let mut file = open_append(&self.path).await?;
            self.pending_newline = ends_mid_line(&mut file).await?;
            self.file = Some(file);
        }
        if self.pending_newline {
            line.insert(0, '\n');
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(line.as_bytes())
                .await
                .map_err(|e| RelayError::AuditLog(e.to_string()))?;
            file.flush()
                .await
                .map_err(|e| RelayError::AuditLog(e.to_string()))?;
        }
        self.pending_newline = false;
        Ok(())
    }
}

/// 非空文件的最后一个字节不是换行符
async fn ends_mid_line(file: &mut File) -> RelayResult<bool> {
    let len = file
        .metadata()
        .await
        .map_err(|e| RelayError::AuditLog(e.to_string()))?
        .len();
    if len == 0 {
        return Ok(false);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))
        .await
        .map_err(|e| RelayError::AuditLog(e.to_string()))?;
    file.read_exact(&mut last)
        .await
        .map_err(|e| RelayError::AuditLog(e.to_string()))?;
    Ok(last[0] != b'\n')
}

async fn open_append(path: &Path) -> RelayResult<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| RelayError::AuditLog(format!("创建审计日志目录失败: {e}")))?;
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| RelayError::AuditLog(format!("打开审计日志失败: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use relay_core::{CallOutcome, EgressPath};

    fn record(status: u16, success: bool) -> AuditRecord {
        let path = EgressPath::new("http", "p1", 8080).unwrap();
        let outcome = if success {
            CallOutcome::succeeded(Some(status))
        } else {
            CallOutcome::failed(Some(status), Some("ERR_BAD_RESPONSE".to_string()))
        };
        AuditRecord::from_outcome(
            Some(&path),
            &outcome,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_records_are_appended_as_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("proxy-usage.log");

        let (audit, _handle) = JsonLinesAuditLog::spawn(&path, MetricsCollector::new());
        audit.append(record(200, true)).unwrap();
        audit.append(record(418, false)).unwrap();
        audit.flush().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["status"], 418);
        assert_eq!(second["success"], false);
        assert_eq!(second["proxy"], "http://p1:8080");
        assert_eq!(second["errorCode"], "ERR_BAD_RESPONSE");
    }

    #[tokio::test]
    async fn test_existing_content_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy-usage.log");
        tokio::fs::write(&path, "{\"old\":true}\n").await.unwrap();

        let (audit, _handle) = JsonLinesAuditLog::spawn(&path, MetricsCollector::new());
        audit.append(record(200, true)).unwrap();
        audit.flush().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.starts_with("{\"old\":true}\n"));
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy-usage.log");
        let (audit, _handle) = JsonLinesAuditLog::spawn(&path, MetricsCollector::new());

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let audit = audit.clone();
                tokio::spawn(async move {
                    for _ in 0..10 {
                        audit.append(record(200 + i, true)).unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        audit.flush().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 200);
        for line in content.lines() {
            serde_json::from_str::<serde_json::Value>(line).unwrap();
        }
    }

    #[tokio::test]
    async fn test_truncated_last_line_is_not_joined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy-usage.log");
        tokio::fs::write(&path, "{\"old\":true}\n{\"timestamp\":\"2024-")
            .await
            .unwrap();

        let (audit, _handle) = JsonLinesAuditLog::spawn(&path, MetricsCollector::new());
        audit.append(record(200, true)).unwrap();
        audit.append(record(429, false)).unwrap();
        audit.flush().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "{\"timestamp\":\"2024-");
        let third: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(third["status"], 200);
        let fourth: serde_json::Value = serde_json::from_str(lines[3]).unwrap();
        assert_eq!(fourth["status"], 429);
    }

    // 单线程运行时上写入任务与测试在同一线程，线程本地的记录器对两者都生效
    #[tokio::test]
    async fn test_unwritable_path_is_reported_not_fatal() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);

        let dir = tempfile::tempdir().unwrap();
        // 目录本身不能作为文件打开
        let (audit, _writer) = JsonLinesAuditLog::spawn(dir.path(), MetricsCollector::new());

        assert!(audit.append(record(200, true)).is_ok());
        assert!(audit.append(record(418, false)).is_ok());
        assert!(audit.flush().await.is_ok());

        assert!(handle
            .render()
            .contains("relay_audit_write_failures_total 2"));
    }

    #[tokio::test]
    async fn test_writer_exits_after_all_handles_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy-usage.log");
        let (audit, handle) = JsonLinesAuditLog::spawn(&path, MetricsCollector::new());

        audit.append(record(200, true)).unwrap();
        drop(audit);
        handle.await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
