//! 処理対象プロファイルの読み込みと事前フィルタ

use crate::error::{CalibError, Result};
use gelato_calib_common::text::normalize;
use gelato_calib_common::{parse_missing_profiles, MissingProfile};
use std::path::PathBuf;

/// プロファイルの入手元
#[derive(Debug, Clone)]
pub enum ProfileSource {
    /// 外部レポートの `missingProfiles`
    Report(PathBuf),
    /// 手動指定の1件
    Manual(MissingProfile),
}

/// プロファイル一覧を読み込む（レポートが読めなければ致命的エラー）
pub fn load_profiles(source: &ProfileSource) -> Result<Vec<MissingProfile>> {
    match source {
        ProfileSource::Manual(profile) => Ok(vec![profile.clone().with_default_key()]),
        ProfileSource::Report(path) => {
            if !path.exists() {
                return Err(CalibError::FileNotFound(path.display().to_string()));
            }
            let content = std::fs::read_to_string(path)?;
            parse_missing_profiles(&content).map_err(|e| {
                CalibError::InvalidReport(format!("{}: {}", path.display(), e))
            })
        }
    }
}

/// 対応外のインクを1つ返す（空欄は無視）
pub fn unsupported_ink<'p>(profile: &'p MissingProfile, supported: &[String]) -> Option<&'p str> {
    let supported: Vec<String> = supported.iter().map(|s| normalize(s)).collect();
    profile
        .inks
        .iter()
        .map(String::as_str)
        .filter(|ink| !normalize(ink).is_empty())
        .find(|ink| !supported.contains(&normalize(ink)))
}

/// スキップ理由
pub fn skip_reason(profile: &MissingProfile, supported: &[String]) -> Option<String> {
    unsupported_ink(profile, supported).map(|ink| format!("non_tshirt_profile (e.g. {})", ink))
}
