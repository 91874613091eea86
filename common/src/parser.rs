//! 入力レポート・カタログレスポンスのパーサー

use crate::error::{Error, Result};
use crate::types::{CatalogProduct, MissingProfile};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MissingReport {
    missing_profiles: Option<Vec<MissingProfile>>,
}

/// 外部レポートの `missingProfiles` 配列をパース
///
/// # Arguments
/// * `json` - レポートJSON文字列
///
/// # Returns
/// * `Ok(Vec<MissingProfile>)` - `key` 未指定の要素は `<collection>/<design>` を補完
/// * `Err` - JSON不正、または `missingProfiles` が無い場合
pub fn parse_missing_profiles(json: &str) -> Result<Vec<MissingProfile>> {
    let report: MissingReport = serde_json::from_str(json)
        .map_err(|e| Error::InvalidReport(format!("JSONパースエラー: {}", e)))?;

    let profiles = report
        .missing_profiles
        .ok_or_else(|| Error::InvalidReport("missingProfiles がありません".into()))?;

    Ok(profiles
        .into_iter()
        .map(MissingProfile::with_default_key)
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProductPage {
    Wrapped { data: Vec<CatalogProduct> },
    Bare(Vec<CatalogProduct>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProductDetail {
    Wrapped { data: CatalogProduct },
    Bare(CatalogProduct),
}

/// 一覧レスポンス（`{data: [...]}` または配列）をパース
pub fn parse_product_page(body: &str) -> Result<Vec<CatalogProduct>> {
    let page: ProductPage = serde_json::from_str(body)?;
    Ok(match page {
        ProductPage::Wrapped { data } => data,
        ProductPage::Bare(items) => items,
    })
}

/// 詳細レスポンス（`{data: {...}}` または商品オブジェクト）をパース
pub fn parse_product_detail(body: &str) -> Result<CatalogProduct> {
    let detail: ProductDetail = serde_json::from_str(body)?;
    Ok(match detail {
        ProductDetail::Wrapped { data } => data,
        ProductDetail::Bare(product) => product,
    })
}
