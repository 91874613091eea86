//! キャリブレーション・スイープ実行モジュール
//!
//! 外部のbboxキャリブレーションを `--sweep` 付きで1回起動し、
//! `<prefix>_<n>.json` / `<prefix>_<n>.png` の候補を出力ディレクトリに生成させる。

pub mod consensus;

pub use consensus::{pick_consensus, ConsensusResult};

use crate::error::{CalibError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use walkdir::WalkDir;

/// スイープ実行の境界
#[async_trait]
pub trait SweepRunner: Send + Sync {
    async fn run_sweep(&self, preview: &Path, out_dir: &Path, prefix: &str, scale: f64) -> Result<()>;
}

/// 外部コマンドによるスイープ
#[derive(Debug, Clone)]
pub struct CalibrationCommand {
    program: PathBuf,
    leading_args: Vec<String>,
    timeout: Option<Duration>,
}

impl CalibrationCommand {
    /// `command` はプログラム + 先頭引数（例: `["node", "tools/bbox-calibrate.mjs"]`）
    pub fn new(command: &[String], timeout: Option<Duration>) -> Result<Self> {
        let (program, rest) = command
            .split_first()
            .ok_or_else(|| CalibError::Config("キャリブレーションコマンドが空です".into()))?;
        Ok(Self {
            program: PathBuf::from(program),
            leading_args: rest.to_vec(),
            timeout,
        })
    }

    /// 渡す引数一式
    pub fn sweep_args(&self, preview: &Path, out_dir: &Path, prefix: &str, scale: f64) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.extend([
            "--preview".to_string(),
            preview.display().to_string(),
            "--sweep".to_string(),
            "--scale".to_string(),
            scale.to_string(),
            "--out-dir".to_string(),
            out_dir.display().to_string(),
            "--prefix".to_string(),
            prefix.to_string(),
        ]);
        args
    }
}

#[async_trait]
impl SweepRunner for CalibrationCommand {
    async fn run_sweep(&self, preview: &Path, out_dir: &Path, prefix: &str, scale: f64) -> Result<()> {
        let args = self.sweep_args(preview, out_dir, prefix, scale);
        tracing::info!(program = %self.program.display(), ?args, "キャリブレーション・スイープ開始");

        // 子プロセスの標準出力は stderr に流す（stdout はレポートJSON専用）
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(std::io::stderr()))
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CalibError::Sweep(format!("{} を起動できません: {}", self.program.display(), e)))?;

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    child.kill().await.ok();
                    return Err(CalibError::SweepTimeout(limit.as_secs()));
                }
            },
            None => child.wait().await?,
        };

        if !status.success() {
            return Err(CalibError::Sweep(format!(
                "終了コード {:?}",
                status.code()
            )));
        }
        Ok(())
    }
}

/// `<prefix>_` で始まる `.json` / `.png` か
pub(crate) fn is_sweep_file(path: &Path, prefix: &str, extension: &str) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };
    let stem_prefix = format!("{}_", prefix);
    name.starts_with(&stem_prefix)
        && path
            .extension()
            .map(|e| e.eq_ignore_ascii_case(extension))
            .unwrap_or(false)
}

/// 前回実行の候補ファイルを削除（古い候補が投票に混ざらないように）
pub fn clear_stale_candidates(out_dir: &Path, prefix: &str) -> Result<usize> {
    if !out_dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in WalkDir::new(out_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && (is_sweep_file(path, prefix, "json") || is_sweep_file(path, prefix, "png")) {
            std::fs::remove_file(path)?;
            removed += 1;
        }
    }

    if removed > 0 {
        tracing::debug!(dir = %out_dir.display(), removed, "古いスイープ候補を削除");
    }
    Ok(removed)
}
