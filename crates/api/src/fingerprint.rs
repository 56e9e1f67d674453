//! Browser-like request headers drawn from small fixed pools.

use relay_core::RandomSource;

pub const USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36",
];

pub const ACCEPT_LANGUAGES: [&str; 2] = [
    "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7",
    "en-US,en;q=0.9,ko-KR;q=0.8,ko;q=0.7",
];

pub const SEC_CH_UA: [&str; 2] = [
    r#""Chromium";v="130", "Not=A?Brand";v="24""#,
    r#""Google Chrome";v="130", "Chromium";v="130", "Not=A?Brand";v="24""#,
];

pub const SEC_CH_UA_MOBILE: [&str; 2] = ["?0", "?1"];

pub const SEC_CH_UA_PLATFORM: [&str; 3] = [r#""Windows""#, r#""macOS""#, r#""Linux""#];

pub const ACCEPT: &str = "application/json, text/plain, */*";

fn pick<'a>(random: &dyn RandomSource, items: &[&'a str]) -> &'a str {
    items[random.pick_index(items.len())]
}

/// 生成一组随机浏览器请求头
pub fn random_headers(random: &dyn RandomSource, referer: &str) -> Vec<(String, String)> {
    let headers = [
        ("User-Agent", pick(random, &USER_AGENTS)),
        ("Accept", ACCEPT),
        ("Accept-Language", pick(random, &ACCEPT_LANGUAGES)),
        ("Referer", referer),
        ("sec-ch-ua", pick(random, &SEC_CH_UA)),
        ("sec-ch-ua-mobile", pick(random, &SEC_CH_UA_MOBILE)),
        ("sec-ch-ua-platform", pick(random, &SEC_CH_UA_PLATFORM)),
        ("Connection", "keep-alive"),
    ];

    headers
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}
