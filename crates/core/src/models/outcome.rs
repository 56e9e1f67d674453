use std::fmt;

use serde::{Deserialize, Serialize};

/// 一次调用的结果摘要，交给结果记录器
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOutcome {
    pub success: bool,
    pub status_code: Option<u16>,
    pub error_code: Option<String>,
    pub note: Option<String>,
}

impl CallOutcome {
    pub fn succeeded(status_code: Option<u16>) -> Self {
        Self {
            success: true,
            status_code,
            error_code: None,
            note: None,
        }
    }

    pub fn failed(status_code: Option<u16>, error_code: Option<String>) -> Self {
        Self {
            success: false,
            status_code,
            error_code,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// 调用方返回的成功结果
#[derive(Debug, Clone)]
pub struct CallSuccess<T> {
    pub value: T,
    pub status_code: Option<u16>,
    pub note: Option<String>,
}

impl<T> CallSuccess<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            status_code: None,
            note: None,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallSuccess<U> {
        CallSuccess {
            value: f(self.value),
            status_code: self.status_code,
            note: self.note,
        }
    }

    pub fn outcome(&self) -> CallOutcome {
        CallOutcome {
            success: true,
            status_code: self.status_code,
            error_code: None,
            note: self.note.clone(),
        }
    }
}

/// 调用方返回的失败结果
///
/// `payload` 保存上游返回的原始响应体（如有），核心层只透传不解析。
#[derive(Debug, Clone, Default)]
pub struct CallFailure {
    pub message: String,
    pub status_code: Option<u16>,
    pub error_code: Option<String>,
    pub note: Option<String>,
    pub payload: Option<serde_json::Value>,
}

impl CallFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_error_code(mut self, error_code: impl Into<String>) -> Self {
        self.error_code = Some(error_code.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn outcome(&self) -> CallOutcome {
        CallOutcome {
            success: false,
            status_code: self.status_code,
            error_code: self.error_code.clone(),
            note: self.note.clone(),
        }
    }
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(status) = self.status_code {
            write!(f, " (status={status})")?;
        }
        if let Some(code) = &self.error_code {
            write!(f, " (code={code})")?;
        }
        Ok(())
    }
}

impl std::error::Error for CallFailure {}

/// `perform_call` 的返回类型
pub type CallResult<T> = Result<CallSuccess<T>, CallFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_outcome_keeps_status_and_note() {
        let success = CallSuccess::new(42).with_status(200).with_note("OK in 12ms");
        let outcome = success.outcome();
        assert!(outcome.success);
        assert_eq!(outcome.status_code, Some(200));
        assert_eq!(outcome.note.as_deref(), Some("OK in 12ms"));
        assert_eq!(success.map(|v| v + 1).value, 43);
    }

    #[test]
    fn test_failure_display_and_outcome() {
        let failure = CallFailure::new("Request failed")
            .with_status(429)
            .with_error_code("ERR_BAD_RESPONSE");
        assert_eq!(
            failure.to_string(),
            "Request failed (status=429) (code=ERR_BAD_RESPONSE)"
        );

        let outcome = failure.outcome();
        assert!(!outcome.success);
        assert_eq!(outcome.status_code, Some(429));
        assert_eq!(outcome.error_code.as_deref(), Some("ERR_BAD_RESPONSE"));
    }
}
