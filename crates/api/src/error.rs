use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use relay_core::CallFailure;

/// 418/429 的补充说明
pub fn block_note(status: Option<u16>) -> Option<&'static str> {
    match status {
        Some(429) => Some(
            "Rate limited by the upstream API; slow down requests or switch to another proxy.",
        ),
        Some(418) => Some(
            "The upstream API is temporarily restricting access from this IP (HTTP 418). \
             This usually happens after too many requests, from certain VPN/proxy exits, \
             or when the access pattern is detected as a bot.",
        ),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("缺少url参数")]
    MissingUrl,

    #[error("无效的上游URL: {target_url}")]
    InvalidTarget { target_url: String },

    #[error("上游调用失败: {0}")]
    Upstream(CallFailure),

    #[error("调度被拒绝: {0}")]
    DispatchRejected(String),

    #[error("未找到资源")]
    NotFound,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingUrl | ApiError::InvalidTarget { .. } => StatusCode::BAD_REQUEST,
            ApiError::Upstream(failure) => failure
                .status_code
                .and_then(|status| StatusCode::from_u16(status).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::DispatchRejected(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    fn body(&self, status: StatusCode) -> Value {
        match self {
            ApiError::MissingUrl => json!({
                "success": false,
                "error": "Missing \"url\" query parameter",
                "hint": "Send a \"url\" parameter holding the base search API URL, \
                         e.g. ...paged-composite-cards?cursor=1&pageSize=50&...",
            }),
            ApiError::InvalidTarget { target_url } => json!({
                "success": false,
                "error": "Invalid paged-composite-cards URL",
                "hint": "Make sure \"url\" points at the paged-composite-cards search API.",
                "targetUrl": target_url,
            }),
            ApiError::Upstream(failure) => {
                let mut body = json!({
                    "success": false,
                    "error": "Failed to fetch upstream API",
                    "status": status.as_u16(),
                    "details": failure.message,
                    "code": failure.error_code,
                });
                if let Some(note) = block_note(failure.status_code) {
                    body["note"] = json!(note);
                }
                if let Some(payload) = &failure.payload {
                    body["upstreamResponse"] = payload.clone();
                }
                body
            }
            ApiError::DispatchRejected(reason) => json!({
                "success": false,
                "error": "Dispatch rejected",
                "details": reason,
            }),
            ApiError::NotFound => json!({
                "success": false,
                "error": "Not found",
            }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.body(status);
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
