//! Target URL assembly and allow-listing for the relay endpoint.

use url::Url;

use crate::error::{ApiError, ApiResult};

/// 由查询参数组装上游URL
///
/// `url` 参数为基础地址，其余参数按原顺序追加到查询串。
pub fn compose_target_url(params: &[(String, String)]) -> ApiResult<String> {
    let base = params
        .iter()
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.as_str())
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::MissingUrl)?;

    let mut extra = url::form_urlencoded::Serializer::new(String::new());
    let mut has_extra = false;
    for (key, value) in params.iter().filter(|(key, _)| key != "url") {
        extra.append_pair(key, value);
        has_extra = true;
    }

    if !has_extra {
        return Ok(base.to_string());
    }

    let separator = if base.contains('?') { '&' } else { '?' };
    Ok(format!("{base}{separator}{}", extra.finish()))
}

/// 主机名包含 `allowed_host` 且路径包含 `required_path` 的URL才允许中继
pub fn is_allowed_target(target_url: &str, allowed_host: &str, required_path: &str) -> bool {
    match Url::parse(target_url) {
        Ok(url) => {
            url.host_str()
                .map(|host| host.contains(allowed_host))
                .unwrap_or(false)
                && url.path().contains(required_path)
        }
        Err(_) => false,
    }
}
