use clap::Parser;
use gelato_calib::{asset, catalog, cli, config, error, pipeline, retry, sweep};
use gelato_calib_common::{MissingProfile, OptionAliases};
use cli::{Cli, Commands};
use config::{mask_secret, Config};
use error::Result;
use pipeline::{load_profiles, Pipeline, PipelineOptions, ProfileSource};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // RUST_LOG の設定に関係なく必ず表示する
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

/// ログは stderr（stdout はJSON出力専用）
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    match cli.command {
        Commands::Run {
            report,
            out_root,
            limit,
            scale,
            dry_run,
            collection,
            design,
            force_option,
            force_product_id,
            inks,
            prefix,
            plan_out,
            alias,
            supported_inks,
        } => {
            // 1. 入力プロファイル
            let source = match (collection, design) {
                (Some(collection), Some(design)) => ProfileSource::Manual(MissingProfile {
                    inks,
                    force_option,
                    force_product_id,
                    ..MissingProfile::new(collection, design)
                }),
                _ => match report.clone() {
                    Some(path) => ProfileSource::Report(path),
                    None => {
                        return Err(error::CalibError::Config(
                            "--report か --collection/--design を指定してください".into(),
                        ))
                    }
                },
            };
            let profiles = load_profiles(&source)?;
            tracing::info!("✔ {}件のプロファイルを読み込み", profiles.len());

            let mut aliases = OptionAliases::builtin();
            if let Some(path) = &alias {
                aliases.merge(OptionAliases::from_file(path)?);
            }

            // 2. 外部接続
            let settings = config.catalog_settings()?;
            let policy = retry::RetryPolicy::new(config.http_max_retries);
            let catalog_client =
                catalog::HttpCatalogClient::new(&settings, config.http_timeout(), policy)?;
            let assets = asset::HttpAssetFetcher::new(config.http_timeout(), policy)?;
            let sweeper =
                sweep::CalibrationCommand::new(&config.calibrate_command, config.sweep_timeout())?;

            let options = PipelineOptions {
                report_path: report,
                out_root: out_root.clone(),
                limit,
                scale,
                dry_run,
                prefix,
                store_id: settings.store_id.clone(),
                supported_inks: if supported_inks.is_empty() {
                    config.supported_inks.clone()
                } else {
                    supported_inks
                },
                aliases,
            };

            // 3. 実行
            let pipeline = Pipeline::new(&catalog_client, &assets, &sweeper, options);
            let run_report = pipeline.run(&profiles).await?;

            // 4. 保存と出力
            let plan_path = plan_out.unwrap_or_else(|| out_root.join("plan.json"));
            run_report.save(&plan_path)?;
            tracing::info!("✔ レポートを保存: {}", plan_path.display());

            println!("{}", serde_json::to_string_pretty(&run_report)?);
        }

        Commands::Consensus { dir, prefix } => {
            if !dir.is_dir() {
                return Err(error::CalibError::FileNotFound(dir.display().to_string()));
            }
            let result = sweep::pick_consensus(&dir, &prefix)?
                .ok_or_else(|| error::CalibError::NoConsensus(dir.display().to_string()))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Config { show } => {
            if show {
                println!("設定ファイル: {}", Config::config_path()?.display());
                println!("カタログURL: {}", config.proxy_url.as_deref().unwrap_or("未設定"));
                println!("ストアID: {}", config.store_id.as_deref().unwrap_or("未設定"));
                println!("トークン: {}", mask_secret(config.proxy_token.as_deref()));
                println!("APIキー: {}", mask_secret(config.proxy_api_key.as_deref()));
                println!("キャリブレーションコマンド: {}", config.calibrate_command.join(" "));
                println!("HTTPタイムアウト: {}秒", config.http_timeout_seconds);
                println!("スイープタイムアウト: {}秒", config.sweep_timeout_seconds);
                println!("HTTP再試行回数: {}", config.http_max_retries);
                println!("対応インク: {}", config.supported_inks.join(", "));
            }
        }
    }

    Ok(())
}
