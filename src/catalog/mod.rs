//! カタログ取得モジュール
//!
//! プロキシAPIからストアの商品一覧をページングで全件取得する。

pub(crate) mod client;

pub use client::HttpCatalogClient;

use crate::error::Result;
use async_trait::async_trait;
use gelato_calib_common::CatalogProduct;

/// 1ページあたりの件数
pub const PAGE_SIZE: usize = 100;

/// ページ数の上限（ページングが終わらない場合の安全弁）
pub const MAX_PAGES: usize = 50;

/// カタログへのアクセス境界
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// `offset` から最大 `limit` 件を取得
    async fn list_page(&self, store_id: &str, limit: usize, offset: usize) -> Result<Vec<CatalogProduct>>;

    /// 商品詳細を取得
    async fn get_product(&self, store_id: &str, product_id: &str) -> Result<CatalogProduct>;
}

/// 全件取得の結果
#[derive(Debug, Clone, Default)]
pub struct CatalogListing {
    pub products: Vec<CatalogProduct>,
    pub pages_fetched: usize,
    /// 上限ページ数に達して打ち切ったか
    pub page_cap_reached: bool,
}

/// 全商品をページングで取得
///
/// ページが `PAGE_SIZE` 未満なら終了。`MAX_PAGES` に達した場合は警告を出して打ち切る。
/// ページ取得の失敗はそのまま返す（呼び出し側で致命的エラー）。
pub async fn list_all_products<C>(source: &C, store_id: &str) -> Result<CatalogListing>
where
    C: CatalogSource + ?Sized,
{
    let mut listing = CatalogListing::default();

    for page in 0..MAX_PAGES {
        let offset = page * PAGE_SIZE;
        let items = source.list_page(store_id, PAGE_SIZE, offset).await?;
        let received = items.len();
        listing.pages_fetched += 1;
        listing.products.extend(items);

        tracing::debug!(page, offset, received, "カタログページ取得");

        if received < PAGE_SIZE {
            return Ok(listing);
        }
    }

    listing.page_cap_reached = true;
    tracing::warn!(
        pages = MAX_PAGES,
        products = listing.products.len(),
        "カタログのページ上限に達したため取得を打ち切りました"
    );
    Ok(listing)
}
