//! Maps the upstream `paged-composite-cards` payload to a flat product list.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Value,
    pub name: Value,
    pub price: Value,
    pub image_url: Value,
    pub product_url: Value,
    pub mall_name: Value,
    pub mall_url: Value,
    pub rating: Value,
    pub review_count: Value,
    pub is_ad: bool,
    pub is_oversea_product: bool,
    pub categories: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: Value,
    pub cursor: Value,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPage {
    pub meta: PageMeta,
    pub products: Vec<Product>,
}

/// 按 JSON 真值规则判断：null、false、0、空串为假，数组和对象总为真
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// 第一个真值，都不是时为 null
fn first_truthy<'a>(candidates: impl IntoIterator<Item = &'a Value>) -> Value {
    candidates
        .into_iter()
        .find(|v| truthy(v))
        .cloned()
        .unwrap_or(Value::Null)
}

/// 第一个非 null 值
fn first_present<'a>(candidates: impl IntoIterator<Item = &'a Value>) -> Value {
    candidates
        .into_iter()
        .find(|v| !v.is_null())
        .cloned()
        .unwrap_or(Value::Null)
}

fn first_image(product: &Value) -> Value {
    let image = if truthy(&product["images"]) {
        product["images"].get(0)
    } else if truthy(&product["productImages"]) {
        product["productImages"].get(0)
    } else {
        // imageUrls 是纯字符串数组
        return product["imageUrls"]
            .get(0)
            .filter(|url| truthy(url))
            .cloned()
            .unwrap_or(Value::Null);
    };

    match image {
        Some(image) => first_truthy([&image["imageUrl"], &image["url"]]),
        None => Value::Null,
    }
}

fn link(value: &Value) -> Value {
    if !truthy(value) {
        return Value::Null;
    }
    first_truthy([&value["pcUrl"], &value["mobileUrl"]])
}

fn map_product(product: &Value) -> Option<Product> {
    if !truthy(&product["nvMid"]) && !truthy(&product["productName"]) {
        return None;
    }

    Some(Product {
        id: first_truthy([&product["nvMid"]]),
        name: first_truthy([&product["productName"]]),
        price: first_present([
            &product["discountedSalePrice"],
            &product["salePrice"],
            &product["lowPrice"],
            &product["mobilePrice"],
        ]),
        image_url: first_image(product),
        product_url: link(&product["productUrl"]),
        mall_name: first_truthy([&product["mallName"]]),
        mall_url: link(&product["mallUrl"]),
        rating: match &product["averageReviewScore"] {
            Value::Number(n) => Value::Number(n.clone()),
            _ => Value::Null,
        },
        review_count: match &product["totalReviewCount"] {
            Value::Number(n) => Value::Number(n.clone()),
            _ => Value::from(0),
        },
        is_ad: truthy(&product["adId"]),
        is_oversea_product: truthy(&product["isOverseaProduct"]),
        categories: ["lCatId", "mCatId", "sCatId", "dCatId"]
            .iter()
            .map(|key| &product[*key])
            .filter(|v| truthy(v))
            .cloned()
            .collect(),
    })
}

/// 提取 `data.data[*].card.product` 中的商品和分页信息
pub fn map_products(raw: &Value) -> ProductPage {
    let inner = &raw["data"];
    let products: Vec<Product> = inner["data"]
        .as_array()
        .map(|cards| {
            cards
                .iter()
                .filter_map(|card| map_product(&card["card"]["product"]))
                .collect()
        })
        .unwrap_or_default();

    let total = match &inner["total"] {
        Value::Number(n) => Value::Number(n.clone()),
        _ => Value::from(products.len()),
    };

    ProductPage {
        meta: PageMeta {
            total,
            cursor: inner["cursor"].clone(),
            has_more: truthy(&inner["hasMore"]),
        },
        products,
    }
}
