//! カタログプロキシAPIクライアント
//!
//! - `GET <base>/store-products?storeId&limit&offset`
//! - `GET <base>/store-product?storeId&productId`
//!
//! 認証は Bearer トークン + `apikey` ヘッダー。

use super::CatalogSource;
use crate::config::CatalogSettings;
use crate::error::{CalibError, Result};
use crate::retry::{retry_transient, RetryPolicy};
use async_trait::async_trait;
use gelato_calib_common::{parse_product_detail, parse_product_page, CatalogProduct};
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("gelato-calib/", env!("CARGO_PKG_VERSION"));

/// エラーメッセージに含めるレスポンス本文の最大文字数
const ERROR_BODY_LIMIT: usize = 500;

pub struct HttpCatalogClient {
    http: Client,
    base_url: String,
    token: String,
    api_key: String,
    retry: RetryPolicy,
}

impl HttpCatalogClient {
    pub fn new(settings: &CatalogSettings, timeout: Option<Duration>, retry: RetryPolicy) -> Result<Self> {
        let http = build_client(timeout)?;
        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
            token: settings.token.clone(),
            api_key: settings.api_key.clone(),
            retry,
        })
    }

    async fn get_text(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let url = &format!("{}/{}", self.base_url, path);

        retry_transient(self.retry, path, move || async move {
            let response = self
                .http
                .get(url)
                .query(query)
                .header("apikey", &self.api_key)
                .bearer_auth(&self.token)
                .send()
                .await?;
            read_success_body(response).await
        })
        .await
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogClient {
    async fn list_page(&self, store_id: &str, limit: usize, offset: usize) -> Result<Vec<CatalogProduct>> {
        let body = self
            .get_text(
                "store-products",
                &[
                    ("storeId", store_id.to_string()),
                    ("limit", limit.to_string()),
                    ("offset", offset.to_string()),
                ],
            )
            .await?;
        Ok(parse_product_page(&body)?)
    }

    async fn get_product(&self, store_id: &str, product_id: &str) -> Result<CatalogProduct> {
        let body = self
            .get_text(
                "store-product",
                &[
                    ("storeId", store_id.to_string()),
                    ("productId", product_id.to_string()),
                ],
            )
            .await?;
        Ok(parse_product_detail(&body)?)
    }
}

/// 接続の上限時間
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTPクライアント（`timeout` が `None` ならリクエスト全体の上限なし）
pub(crate) fn build_client(timeout: Option<Duration>) -> Result<Client> {
    let mut builder = Client::builder().user_agent(USER_AGENT);
    builder = match timeout {
        Some(limit) => builder.timeout(limit).connect_timeout(limit.min(CONNECT_TIMEOUT)),
        None => builder.connect_timeout(CONNECT_TIMEOUT),
    };
    builder
        .build()
        .map_err(|e| CalibError::Config(format!("HTTPクライアント生成エラー: {}", e)))
}

/// 2xx以外は本文付きの `Http` エラーにする
pub(crate) async fn read_success_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let url = response.url().to_string();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(CalibError::Http {
            status: status.as_u16(),
            url,
            body: truncate(&body, ERROR_BODY_LIMIT),
        });
    }
    Ok(body)
}

/// 2xx以外は `Http` エラー、成功時は本文バイト列
pub(crate) async fn read_success_bytes(response: reqwest::Response) -> Result<Vec<u8>> {
    let status = response.status();
    let url = response.url().to_string();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        return Err(CalibError::Http {
            status: status.as_u16(),
            url,
            body: truncate(&String::from_utf8_lossy(&bytes), ERROR_BODY_LIMIT),
        });
    }
    Ok(bytes.to_vec())
}

pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}…", head)
    }
}
