use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use reqwest::Client;
use serde_json::Value;

const DEFAULT_TARGET_URL: &str = "https://search.shopping.naver.com/ns/v1/search/paged-composite-cards\
?cursor=1&pageSize=50&query=iphone&searchMethod=all.basic&isFreshCategory=false\
&isOriginalQuerySearch=false&isCatalogDiversifyOff=false&listPage=1\
&categoryIdsForPromotions=50000204&categoryIdsForPromotions=50000205\
&categoryIdsForPromotions=50000209&hiddenNonProductCard=true&hasMoreAd=true\
&hasMore=true&score=4.8%7C5";

/// 成功后的间隔 (毫秒)
const SUCCESS_PAUSE_MS: (u64, u64) = (1500, 4000);
/// 失败后的间隔 (毫秒)
const FAILURE_PAUSE_MS: (u64, u64) = (3000, 7000);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = LoadTestArgs::parse();
    let client = Client::builder()
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()
        .context("构建HTTP客户端失败")?;

    let endpoint = format!("{}/naver", args.base.trim_end_matches('/'));
    let mut summary = Summary::default();

    for i in 1..=args.total {
        let start = Instant::now();
        let result = call_relay(&client, &endpoint, &args.url).await;
        let elapsed = start.elapsed();

        let pause = match result {
            Ok(products) => {
                summary.record(true, elapsed);
                println!("#{i} OK in {}ms, products: {products}", elapsed.as_millis());
                SUCCESS_PAUSE_MS
            }
            Err(failure) => {
                summary.record(false, elapsed);
                println!(
                    "#{i} ERROR in {}ms: status={}, msg={}",
                    elapsed.as_millis(),
                    failure
                        .status
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "none".to_string()),
                    failure.message
                );
                if let Some(body) = failure.body {
                    println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
                }
                FAILURE_PAUSE_MS
            }
        };

        if i < args.total {
            tokio::time::sleep(random_pause(pause)).await;
        }
    }

    summary.print();
    Ok(())
}

/// 中继服务压测工具
#[derive(Parser, Debug)]
#[command(name = "relay-loadtest")]
#[command(version)]
#[command(about = "按顺序反复调用中继接口并统计成功率与延迟")]
struct LoadTestArgs {
    /// 中继服务基础URL
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    base: String,

    /// 转发给中继服务的上游URL
    #[arg(long, default_value = DEFAULT_TARGET_URL)]
    url: String,

    /// 请求总数
    #[arg(long, default_value_t = 1000)]
    total: u64,

    /// 单次请求超时 (秒)
    #[arg(long, default_value_t = 20)]
    timeout_secs: u64,
}

#[derive(Debug)]
struct CallFailure {
    status: Option<u16>,
    message: String,
    body: Option<Value>,
}

/// 调用一次中继接口，成功时返回商品数量描述
async fn call_relay(client: &Client, endpoint: &str, target: &str) -> Result<String, CallFailure> {
    let response = client
        .get(endpoint)
        .query(&[("url", target)])
        .send()
        .await
        .map_err(|e| CallFailure {
            status: None,
            message: e.to_string(),
            body: None,
        })?;

    let status = response.status();
    let body: Option<Value> = response.json().await.ok();

    if !status.is_success() {
        return Err(CallFailure {
            status: Some(status.as_u16()),
            message: format!("Request failed with status code {}", status.as_u16()),
            body,
        });
    }

    Ok(body
        .as_ref()
        .and_then(product_count)
        .map(|n| n.to_string())
        .unwrap_or_else(|| "n/a".to_string()))
}

fn product_count(body: &Value) -> Option<usize> {
    body.get("products")
        .and_then(Value::as_array)
        .map(Vec::len)
}

fn random_pause((min_ms, max_ms): (u64, u64)) -> Duration {
    Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
}

#[derive(Debug, Default)]
struct Summary {
    total: u64,
    success: u64,
    fail: u64,
    total_time: Duration,
}

impl Summary {
    fn record(&mut self, success: bool, elapsed: Duration) {
        self.total += 1;
        if success {
            self.success += 1;
        } else {
            self.fail += 1;
        }
        self.total_time += elapsed;
    }

    fn error_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.fail as f64 / self.total as f64 * 100.0
    }

    fn avg_latency_ms(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.total_time.as_millis() as f64 / self.total as f64
    }

    fn print(&self) {
        println!("==== SUMMARY ====");
        println!("Total: {}", self.total);
        println!("Success: {}", self.success);
        println!("Fail: {}", self.fail);
        println!("Error rate: {:.2} %", self.error_rate());
        println!("Avg latency: {:.1} ms", self.avg_latency_ms());
    }
}
