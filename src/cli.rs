use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gelato-calib")]
#[command(about = "Gelatoカタログ照合・印刷範囲キャリブレーション計画ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 未調整プロファイルを照合してキャリブレーションを実行
    Run {
        /// 入力レポート（`missingProfiles` を含むJSON）
        #[arg(short, long, required_unless_present = "collection")]
        report: Option<PathBuf>,

        /// 出力ルートディレクトリ
        #[arg(short, long, default_value = "calibration-out")]
        out_root: PathBuf,

        /// 計画件数の上限
        #[arg(short, long)]
        limit: Option<usize>,

        /// スイープの拡大率
        #[arg(long, default_value = "1")]
        scale: f64,

        /// ドライラン（照合結果のみ書き出し、ダウンロード・スイープを省略）
        #[arg(long)]
        dry_run: bool,

        /// 手動指定: コレクション
        #[arg(short, long, requires = "design", conflicts_with = "report")]
        collection: Option<String>,

        /// 手動指定: デザイン
        #[arg(short, long, requires = "collection")]
        design: Option<String>,

        /// 手動指定: 選択オプションで絞り込む
        #[arg(long, requires = "collection")]
        force_option: Option<String>,

        /// 手動指定: 商品IDを固定
        #[arg(long, requires = "collection")]
        force_product_id: Option<String>,

        /// 手動指定: インク（複数可）
        #[arg(long = "ink", requires = "collection")]
        inks: Vec<String>,

        /// スイープ候補ファイルの接頭辞
        #[arg(long, default_value = "sweep")]
        prefix: String,

        /// 計画レポートの保存先（省略時: <out-root>/plan.json）
        #[arg(long)]
        plan_out: Option<PathBuf>,

        /// 追加のオプションエイリアス（JSON）
        #[arg(long)]
        alias: Option<PathBuf>,

        /// 対応インク（複数可、指定時は設定値を置き換え）
        #[arg(long = "supported-ink")]
        supported_inks: Vec<String>,
    },

    /// 既存のスイープ出力から合意bboxを再決定
    Consensus {
        /// スイープ出力ディレクトリ
        #[arg(required = true)]
        dir: PathBuf,

        /// スイープ候補ファイルの接頭辞
        #[arg(long, default_value = "sweep")]
        prefix: String,
    },

    /// 設定を表示
    Config {
        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
