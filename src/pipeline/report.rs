//! 実行レポート
//!
//! 実行中は `ReportAccumulator` に結果を積み、最後に一度だけ `RunReport` に確定する。

use crate::error::Result;
use crate::sweep::ConsensusResult;
use gelato_calib_common::{BBox, CatalogProduct, MatchOutcome, MatchResult, MissingProfile};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// 照合の種別
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MatchSummary {
    Forced,
    Scored(MatchResult),
}

impl From<&MatchOutcome<'_>> for MatchSummary {
    fn from(outcome: &MatchOutcome<'_>) -> Self {
        match outcome {
            MatchOutcome::Forced(_) => MatchSummary::Forced,
            MatchOutcome::Scored(_, result) => MatchSummary::Scored(result.clone()),
        }
    }
}

/// 処理予定のプロファイル
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    pub key: String,
    pub collection: String,
    pub design: String,
    pub product_id: String,
    pub product_title: String,
    pub handle: String,
    pub template_name: String,
    #[serde(rename = "match")]
    pub match_summary: MatchSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    pub out_dir: PathBuf,
}

impl PlanEntry {
    pub fn new(profile: &MissingProfile, outcome: &MatchOutcome<'_>, out_dir: PathBuf) -> Self {
        let product: &CatalogProduct = outcome.product();
        Self {
            key: profile.key.clone(),
            collection: profile.collection.clone(),
            design: profile.design.clone(),
            product_id: product.id.clone(),
            product_title: product.title.clone(),
            handle: product.handle.clone(),
            template_name: product.template_name.clone(),
            match_summary: MatchSummary::from(outcome),
            selected_option: gelato_calib_common::matcher::selected_option(product),
            preview_url: product.usable_preview_url().map(str::to_string),
            out_dir,
        }
    }
}

/// 照合前に除外したプロファイル
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipEntry {
    pub key: String,
    pub collection: String,
    pub design: String,
    pub reason: String,
}

/// 一致する商品が無かったプロファイル
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedEntry {
    pub key: String,
    pub collection: String,
    pub design: String,
    pub reason: String,
}

/// プロファイルごとの処理結果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputEntry {
    pub key: String,
    pub product_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub png_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_json_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_png_path: Option<PathBuf>,
}

impl OutputEntry {
    pub fn failed(plan: &PlanEntry, reason: &str, error: Option<String>) -> Self {
        Self {
            key: plan.key.clone(),
            product_id: plan.product_id.clone(),
            ok: false,
            reason: Some(reason.to_string()),
            error,
            ..Default::default()
        }
    }

    pub fn succeeded(
        plan: &PlanEntry,
        preview_url: &str,
        preview_path: PathBuf,
        preview_sha256: String,
        consensus: ConsensusResult,
    ) -> Self {
        Self {
            key: plan.key.clone(),
            product_id: plan.product_id.clone(),
            ok: true,
            preview_url: Some(preview_url.to_string()),
            preview_path: Some(preview_path),
            preview_sha256: Some(preview_sha256),
            bbox: Some(consensus.bbox),
            count: Some(consensus.count),
            total: Some(consensus.total),
            json_path: Some(consensus.json_path),
            png_path: Some(consensus.png_path),
            alias_json_path: Some(consensus.alias_json_path),
            alias_png_path: Some(consensus.alias_png_path),
            ..Default::default()
        }
    }
}

/// 実行パラメータ（レポートにそのまま記録）
#[derive(Debug, Clone, Default)]
pub struct RunParams {
    pub report_path: Option<PathBuf>,
    pub out_root: PathBuf,
    pub limit: Option<usize>,
    pub dry_run: bool,
    pub scale: f64,
    pub store_id: String,
}

/// カタログ取得の統計
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogStats {
    pub products: usize,
    pub pages_fetched: usize,
    pub page_cap_reached: bool,
}

/// 実行中に結果を積み上げる
#[derive(Debug, Default)]
pub struct ReportAccumulator {
    planned: Vec<PlanEntry>,
    skipped: Vec<SkipEntry>,
    unmatched: Vec<UnmatchedEntry>,
    outputs: Vec<OutputEntry>,
}

impl ReportAccumulator {
    pub fn plan(&mut self, entry: PlanEntry) {
        self.planned.push(entry);
    }

    pub fn skip(&mut self, profile: &MissingProfile, reason: String) {
        self.skipped.push(SkipEntry {
            key: profile.key.clone(),
            collection: profile.collection.clone(),
            design: profile.design.clone(),
            reason,
        });
    }

    pub fn unmatched(&mut self, profile: &MissingProfile, reason: &str) {
        self.unmatched.push(UnmatchedEntry {
            key: profile.key.clone(),
            collection: profile.collection.clone(),
            design: profile.design.clone(),
            reason: reason.to_string(),
        });
    }

    pub fn output(&mut self, entry: OutputEntry) {
        self.outputs.push(entry);
    }

    pub fn planned_len(&self) -> usize {
        self.planned.len()
    }

    /// レポートを確定
    pub fn finish(self, params: RunParams, catalog: CatalogStats) -> RunReport {
        RunReport {
            generated_at: chrono::Utc::now().to_rfc3339(),
            report_path: params.report_path,
            out_root: params.out_root,
            limit: params.limit,
            dry_run: params.dry_run,
            scale: params.scale,
            store_id: params.store_id,
            gelato_products_count: catalog.products,
            catalog_pages_fetched: catalog.pages_fetched,
            catalog_page_cap_reached: catalog.page_cap_reached,
            planned_count: self.planned.len(),
            skipped_count: self.skipped.len(),
            unmatched_count: self.unmatched.len(),
            planned: self.planned,
            skipped: self.skipped,
            unmatched: self.unmatched,
            outputs: self.outputs,
        }
    }
}

/// 最終レポート
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub generated_at: String,
    pub report_path: Option<PathBuf>,
    pub out_root: PathBuf,
    pub limit: Option<usize>,
    pub dry_run: bool,
    pub scale: f64,
    pub store_id: String,
    pub gelato_products_count: usize,
    pub catalog_pages_fetched: usize,
    pub catalog_page_cap_reached: bool,
    pub planned_count: usize,
    pub skipped_count: usize,
    pub unmatched_count: usize,
    pub planned: Vec<PlanEntry>,
    pub skipped: Vec<SkipEntry>,
    pub unmatched: Vec<UnmatchedEntry>,
    pub outputs: Vec<OutputEntry>,
}

impl RunReport {
    /// JSONファイルとして保存
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
