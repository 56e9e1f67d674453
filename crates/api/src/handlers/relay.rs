use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use relay_core::DispatchError;

use crate::error::{block_note, ApiError, ApiResult};
use crate::fingerprint::random_headers;
use crate::mapper::{map_products, PageMeta, Product};
use crate::routes::AppState;
use crate::transport::UpstreamRequest;
use crate::validation::{compose_target_url, is_allowed_target};

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    pub url: String,
    pub meta: PageMeta,
    pub products: Vec<Product>,
}

/// 中继搜索请求
///
/// 校验目标URL后经调度控制器发出一次受治理的上游调用，并把结果映射为商品列表。
pub async fn relay_search(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Json<SearchResponse>> {
    let started = Instant::now();

    let target_url = compose_target_url(&params)?;
    if !is_allowed_target(
        &target_url,
        &state.upstream.allowed_host,
        &state.upstream.required_path,
    ) {
        return Err(ApiError::InvalidTarget { target_url });
    }

    let headers = random_headers(state.random.as_ref(), &state.upstream.referer);
    let transport = Arc::clone(&state.transport);
    let url = target_url.clone();

    let result = state
        .controller
        .with_dispatch(&state.pool, move |egress| async move {
            let request = UpstreamRequest {
                url,
                headers,
                egress,
            };
            match transport.fetch_json(request).await {
                Ok(success) => {
                    let page = map_products(&success.value);
                    let note = format!(
                        "OK in {}ms, products={}",
                        started.elapsed().as_millis(),
                        page.products.len()
                    );
                    Ok(success.map(|_| page).with_note(note))
                }
                Err(failure) => {
                    let note = block_note(failure.status_code)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("ERROR in {}ms", started.elapsed().as_millis()));
                    Err(failure.with_note(note))
                }
            }
        })
        .await;

    match result {
        Ok(success) => {
            info!(
                "上游请求成功: 耗时 {}ms, 商品数 {}",
                started.elapsed().as_millis(),
                success.value.products.len()
            );
            Ok(Json(SearchResponse {
                success: true,
                url: target_url,
                meta: success.value.meta,
                products: success.value.products,
            }))
        }
        Err(DispatchError::Call(failure)) => {
            warn!(
                "上游请求失败: 耗时 {}ms, {}",
                started.elapsed().as_millis(),
                failure
            );
            Err(ApiError::Upstream(failure))
        }
        Err(rejected) => Err(ApiError::DispatchRejected(rejected.to_string())),
    }
}
