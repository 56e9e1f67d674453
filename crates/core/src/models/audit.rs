use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{CallOutcome, EgressPath};

/// 审计记录 - 单次调用结果的不可变快照
///
/// 序列化为一行 JSON：`time`, `proxy`, `success`, `status`, `errorCode`, `note`，
/// 缺失的字段写为 `null`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub time: String,
    pub proxy: Option<String>,
    pub success: bool,
    pub status: Option<u16>,
    pub error_code: Option<String>,
    pub note: Option<String>,
}

impl AuditRecord {
    pub fn from_outcome(
        path: Option<&EgressPath>,
        outcome: &CallOutcome,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            time: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            proxy: path.map(EgressPath::redacted),
            success: outcome.success,
            status: outcome.status_code,
            error_code: outcome.error_code.clone(),
            note: outcome.note.clone(),
        }
    }

    /// 以换行结尾的完整日志行
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
