//! パイプライン全体の制御
//!
//! ## 処理フロー
//! 1. カタログ全件取得（失敗は致命的）
//! 2. プロファイルごとにインク判定 → 照合 → 計画（`limit` 件まで）
//! 3. 計画ごとにプレビュー取得 → スイープ → 合意解決（失敗はプロファイル単位で記録）
//! 4. レポート確定
//!
//! プロファイルは1件ずつ順番に処理する。

pub mod profiles;
pub mod report;

pub use profiles::{load_profiles, skip_reason, ProfileSource};
pub use report::{
    CatalogStats, MatchSummary, OutputEntry, PlanEntry, ReportAccumulator, RunParams, RunReport,
    SkipEntry, UnmatchedEntry,
};

use crate::asset::{fetch_and_normalize_image, AssetSource};
use crate::catalog::{list_all_products, CatalogSource};
use crate::error::{CalibError, Result};
use crate::sweep::{clear_stale_candidates, pick_consensus, SweepRunner};
use gelato_calib_common::{
    find_best_match, CatalogProduct, MatchContext, MissingProfile, OptionAliases,
};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub const PREVIEW_FILE_NAME: &str = "preview.png";
pub const MATCH_FILE_NAME: &str = "match.json";
pub const UNMATCHED_REASON: &str = "no_catalog_match";

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub report_path: Option<PathBuf>,
    pub out_root: PathBuf,
    pub limit: Option<usize>,
    pub scale: f64,
    pub dry_run: bool,
    pub prefix: String,
    pub store_id: String,
    pub supported_inks: Vec<String>,
    pub aliases: OptionAliases,
}

pub struct Pipeline<'a, C: ?Sized, A: ?Sized, S: ?Sized> {
    catalog: &'a C,
    assets: &'a A,
    sweep: &'a S,
    options: PipelineOptions,
}

impl<'a, C, A, S> Pipeline<'a, C, A, S>
where
    C: CatalogSource + ?Sized,
    A: AssetSource + ?Sized,
    S: SweepRunner + ?Sized,
{
    pub fn new(catalog: &'a C, assets: &'a A, sweep: &'a S, options: PipelineOptions) -> Self {
        Self {
            catalog,
            assets,
            sweep,
            options,
        }
    }

    /// 全プロファイルを処理してレポートを返す
    pub async fn run(&self, profiles: &[MissingProfile]) -> Result<RunReport> {
        let opts = &self.options;

        tracing::info!("[1/4] カタログを取得中...");
        let listing = list_all_products(self.catalog, &opts.store_id).await?;
        tracing::info!(
            products = listing.products.len(),
            pages = listing.pages_fetched,
            "✔ カタログ取得完了"
        );

        tracing::info!("[2/4] {}件のプロファイルを照合中...", profiles.len());
        let ctx = MatchContext::for_profiles(profiles, opts.aliases.clone());
        let mut acc = ReportAccumulator::default();
        let mut work: Vec<(PlanEntry, &CatalogProduct)> = Vec::new();

        for profile in profiles {
            if opts.limit.map(|l| acc.planned_len() >= l).unwrap_or(false) {
                tracing::info!(limit = ?opts.limit, "上限件数に達したため照合を終了");
                break;
            }

            if let Some(reason) = skip_reason(profile, &opts.supported_inks) {
                tracing::debug!(key = %profile.key, %reason, "スキップ");
                acc.skip(profile, reason);
                continue;
            }

            let outcome = match find_best_match(profile, &listing.products, &ctx)? {
                Some(outcome) => outcome,
                None => {
                    tracing::debug!(key = %profile.key, "一致する商品なし");
                    acc.unmatched(profile, UNMATCHED_REASON);
                    continue;
                }
            };

            let out_dir = opts.out_root.join(profile.dir_name());
            let entry = PlanEntry::new(profile, &outcome, out_dir);
            write_match_file(&entry)?;

            tracing::info!(
                key = %entry.key,
                product = %entry.product_id,
                forced = outcome.is_forced(),
                "✔ 照合"
            );
            acc.plan(entry.clone());
            work.push((entry, outcome.product()));
        }

        if opts.dry_run {
            tracing::info!("[3/4] ドライランのためダウンロード・スイープを省略");
        } else {
            tracing::info!("[3/4] {}件をキャリブレーション中...", work.len());
            for (index, (entry, product)) in work.iter().enumerate() {
                tracing::info!("  ({}/{}) {}", index + 1, work.len(), entry.key);
                let output = self.process_profile(entry, product).await;
                if !output.ok {
                    tracing::warn!(
                        key = %output.key,
                        reason = output.reason.as_deref().unwrap_or(""),
                        error = output.error.as_deref().unwrap_or(""),
                        "プロファイル処理失敗"
                    );
                }
                acc.output(output);
            }
        }

        tracing::info!("[4/4] レポートを作成中...");
        Ok(acc.finish(
            RunParams {
                report_path: opts.report_path.clone(),
                out_root: opts.out_root.clone(),
                limit: opts.limit,
                dry_run: opts.dry_run,
                scale: opts.scale,
                store_id: opts.store_id.clone(),
            },
            CatalogStats {
                products: listing.products.len(),
                pages_fetched: listing.pages_fetched,
                page_cap_reached: listing.page_cap_reached,
            },
        ))
    }

    /// 1プロファイル分の処理（失敗は `ok: false` として返す）
    async fn process_profile(&self, plan: &PlanEntry, product: &CatalogProduct) -> OutputEntry {
        let preview_url = match self.resolve_preview_url(product).await {
            Ok(Some(url)) => url,
            Ok(None) => return OutputEntry::failed(plan, "no_preview_url", None),
            Err(e) => return OutputEntry::failed(plan, "product_detail_failed", Some(e.to_string())),
        };

        match self.calibrate(plan, &preview_url).await {
            Ok(output) => output,
            Err(e) => {
                let mut output = OutputEntry::failed(plan, e.reason_code(), Some(e.to_string()));
                output.preview_url = Some(preview_url);
                output
            }
        }
    }

    /// 一覧のURLを優先し、無ければ詳細を取得して探す
    async fn resolve_preview_url(&self, product: &CatalogProduct) -> Result<Option<String>> {
        if let Some(url) = product.usable_preview_url() {
            return Ok(Some(url.to_string()));
        }

        tracing::debug!(product = %product.id, "一覧にプレビューURLが無いため詳細を取得");
        let detail = self
            .catalog
            .get_product(&self.options.store_id, &product.id)
            .await?;
        Ok(detail.usable_preview_url().map(str::to_string))
    }

    async fn calibrate(&self, plan: &PlanEntry, preview_url: &str) -> Result<OutputEntry> {
        let opts = &self.options;
        let dir = plan.out_dir.as_path();
        std::fs::create_dir_all(dir)?;

        let png = fetch_and_normalize_image(self.assets, preview_url).await?;
        let preview_path = dir.join(PREVIEW_FILE_NAME);
        std::fs::write(&preview_path, &png)?;
        let preview_sha256 = hex::encode(Sha256::digest(&png));

        clear_stale_candidates(dir, &opts.prefix)?;
        self.sweep
            .run_sweep(&preview_path, dir, &opts.prefix, opts.scale)
            .await?;

        let consensus = pick_consensus(dir, &opts.prefix)?
            .ok_or_else(|| CalibError::NoConsensus(dir.display().to_string()))?;

        Ok(OutputEntry::succeeded(
            plan,
            preview_url,
            preview_path,
            preview_sha256,
            consensus,
        ))
    }
}

/// 計画内容をプロファイルのディレクトリに書き出す
fn write_match_file(entry: &PlanEntry) -> Result<()> {
    std::fs::create_dir_all(&entry.out_dir)?;
    let path: &Path = &entry.out_dir.join(MATCH_FILE_NAME);
    std::fs::write(path, serde_json::to_string_pretty(entry)?)?;
    Ok(())
}
