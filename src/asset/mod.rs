//! プレビュー画像取得モジュール
//!
//! URLから画像をダウンロードし、シグネチャで形式を判定してPNGに揃える。

use crate::catalog::client::{build_client, read_success_bytes};
use crate::error::{CalibError, Result};
use crate::retry::{retry_transient, RetryPolicy};
use async_trait::async_trait;
use image::ImageFormat;
use reqwest::Client;
use std::io::Cursor;
use std::time::Duration;

const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SOI: &[u8] = &[0xFF, 0xD8, 0xFF];

/// 先頭バイトから判定した画像形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffedFormat {
    Png,
    Jpeg,
    Webp,
    Unknown,
}

/// バイナリシグネチャで形式を判定
pub fn sniff_format(bytes: &[u8]) -> SniffedFormat {
    if bytes.starts_with(PNG_MAGIC) {
        SniffedFormat::Png
    } else if bytes.starts_with(JPEG_SOI) {
        SniffedFormat::Jpeg
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        SniffedFormat::Webp
    } else {
        SniffedFormat::Unknown
    }
}

/// PNGはそのまま、それ以外はデコードしてPNGに再エンコード
pub fn normalize_to_png(bytes: &[u8]) -> Result<Vec<u8>> {
    let format = sniff_format(bytes);
    if format == SniffedFormat::Png {
        return Ok(bytes.to_vec());
    }

    let decoded = match format {
        SniffedFormat::Jpeg => image::load_from_memory_with_format(bytes, ImageFormat::Jpeg),
        SniffedFormat::Webp => image::load_from_memory_with_format(bytes, ImageFormat::WebP),
        _ => image::load_from_memory(bytes),
    }
    .map_err(|e| CalibError::ImageDecode(format!("{:?} のデコードに失敗: {}", format, e)))?;

    let mut out = Cursor::new(Vec::new());
    decoded
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| CalibError::ImageDecode(format!("PNGエンコードに失敗: {}", e)))?;

    tracing::debug!(?format, png_bytes = out.get_ref().len(), "プレビュー画像をPNGに変換");
    Ok(out.into_inner())
}

/// 画像取得の境界
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// ダウンロードしてPNGに揃える
pub async fn fetch_and_normalize_image<A>(source: &A, url: &str) -> Result<Vec<u8>>
where
    A: AssetSource + ?Sized,
{
    let bytes = source.fetch(url).await?;
    normalize_to_png(&bytes)
}

pub struct HttpAssetFetcher {
    http: Client,
    retry: RetryPolicy,
}

impl HttpAssetFetcher {
    pub fn new(timeout: Option<Duration>, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            retry,
        })
    }
}

#[async_trait]
impl AssetSource for HttpAssetFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let http = &self.http;
        retry_transient(self.retry, "image_download", move || async move {
            let response = http.get(url).send().await?;
            read_success_bytes(response).await
        })
        .await
    }
}
