//! スイープ出力の合意（多数決）解決
//!
//! `<prefix>_*.json` を読み、完全一致する bbox の最頻出グループを採用して
//! 固定名（`bbox.*` と旧名 `calibration.*`）で書き出す。
//! パースできない候補は黙って読み飛ばす。

use super::is_sweep_file;
use crate::error::Result;
use gelato_calib_common::{candidate_bbox, select_majority, BBox};
use serde::Serialize;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const PRIMARY_STEM: &str = "bbox";
pub const LEGACY_STEM: &str = "calibration";

/// 合意結果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusResult {
    pub bbox: BBox,
    pub count: usize,
    pub total: usize,
    /// 勝者グループで最初に見つかった候補
    pub source_json_path: PathBuf,
    pub json_path: PathBuf,
    pub png_path: PathBuf,
    pub alias_json_path: PathBuf,
    pub alias_png_path: PathBuf,
}

/// 候補ファイルを `<n>` の数値順に列挙（数値でないものは後ろに名前順）
pub fn list_candidate_files(out_dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(out_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && is_sweep_file(p, prefix, "json"))
        .collect();

    files.sort_by(|a, b| compare_candidates(a, b, prefix));
    files
}

fn candidate_index(path: &Path, prefix: &str) -> Option<u64> {
    path.file_stem()?
        .to_str()?
        .strip_prefix(prefix)?
        .strip_prefix('_')?
        .parse()
        .ok()
}

fn compare_candidates(a: &Path, b: &Path, prefix: &str) -> Ordering {
    match (candidate_index(a, prefix), candidate_index(b, prefix)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.file_name().cmp(&b.file_name()),
    }
}

fn read_candidate(path: &Path) -> Option<BBox> {
    let content = std::fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&content).ok()?;
    candidate_bbox(&value)
}

/// 多数決で1件に絞り、固定名で書き出す
///
/// 有効な候補が1件も無ければ `Ok(None)`。書き出し時のIOエラーは返す。
pub fn pick_consensus(out_dir: &Path, prefix: &str) -> Result<Option<ConsensusResult>> {
    let files = list_candidate_files(out_dir, prefix);
    let scanned = files.len();

    let candidates = files.into_iter().filter_map(|path| match read_candidate(&path) {
        Some(bbox) => Some((bbox, path)),
        None => {
            tracing::debug!(path = %path.display(), "候補を読み飛ばし");
            None
        }
    });

    let vote = match select_majority(candidates) {
        Some(vote) => vote,
        None => {
            tracing::warn!(dir = %out_dir.display(), scanned, "有効なスイープ候補がありません");
            return Ok(None);
        }
    };

    let source_json = vote.representative;
    let source_png = source_json.with_extension("png");

    let json_path = out_dir.join(format!("{}.json", PRIMARY_STEM));
    let png_path = out_dir.join(format!("{}.png", PRIMARY_STEM));
    let alias_json_path = out_dir.join(format!("{}.json", LEGACY_STEM));
    let alias_png_path = out_dir.join(format!("{}.png", LEGACY_STEM));

    std::fs::copy(&source_json, &json_path)?;
    std::fs::copy(&source_json, &alias_json_path)?;
    std::fs::copy(&source_png, &png_path)?;
    std::fs::copy(&source_png, &alias_png_path)?;

    tracing::info!(
        bbox = ?vote.bbox,
        count = vote.count,
        total = vote.total,
        source = %source_json.display(),
        "合意bboxを決定"
    );

    Ok(Some(ConsensusResult {
        bbox: vote.bbox,
        count: vote.count,
        total: vote.total,
        source_json_path: source_json,
        json_path,
        png_path,
        alias_json_path,
        alias_png_path,
    }))
}
