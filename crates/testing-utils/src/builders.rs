//! Builders for egress paths, pools and call results.

use relay_core::{CallFailure, CallSuccess, EgressPath, EgressPool};

/// `http://<name>:8080` proxy path
pub fn proxy(name: &str) -> EgressPath {
    EgressPath::new("http", name, 8080).unwrap()
}

/// Enabled pool made of `http://<name>:8080` proxies
pub fn pool_of(names: &[&str]) -> EgressPool {
    EgressPool::new(names.iter().map(|name| proxy(name)).collect())
}

/// Successful upstream call carrying HTTP 200
pub fn ok_call<T>(value: T) -> CallSuccess<T> {
    CallSuccess::new(value).with_status(200)
}

/// Failed upstream call rejected with the given HTTP status
pub fn rejected_call(status: u16) -> CallFailure {
    CallFailure::new(format!("Request failed with status code {status}"))
        .with_status(status)
        .with_error_code("ERR_BAD_RESPONSE")
}

/// Failed upstream call that never got a response
pub fn transport_failure(error_code: &str) -> CallFailure {
    CallFailure::new(format!("connect failed: {error_code}")).with_error_code(error_code)
}
