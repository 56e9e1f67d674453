use axum::Json;
use serde_json::{json, Value};

/// 根路径处理器 - 存活探测
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "ok": true,
        "message": "Search relay API up & running"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_root_handler() {
        let response = root_handler().await;
        assert_eq!(response.0["ok"], true);
        assert!(response.0["message"].as_str().unwrap().contains("up & running"));
    }
}
