use crate::error::{CalibError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_PROXY_URL: &str = "GELATO_PROXY_URL";
pub const ENV_STORE_ID: &str = "GELATO_STORE_ID";
pub const ENV_PROXY_TOKEN: &str = "GELATO_PROXY_TOKEN";
pub const ENV_PROXY_API_KEY: &str = "GELATO_PROXY_API_KEY";
pub const ENV_CALIBRATE_CMD: &str = "BBOX_CALIBRATE_CMD";
pub const ENV_HTTP_TIMEOUT: &str = "HTTP_TIMEOUT_SECS";
pub const ENV_SWEEP_TIMEOUT: &str = "SWEEP_TIMEOUT_SECS";
pub const ENV_HTTP_MAX_RETRIES: &str = "HTTP_MAX_RETRIES";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub proxy_url: Option<String>,
    pub store_id: Option<String>,
    pub proxy_token: Option<String>,
    pub proxy_api_key: Option<String>,
    /// キャリブレーション実行コマンド（プログラム + 先頭引数）
    pub calibrate_command: Vec<String>,
    pub http_timeout_seconds: u64,
    pub sweep_timeout_seconds: u64,
    pub http_max_retries: u32,
    pub supported_inks: Vec<String>,
}

/// カタログAPIへの接続情報（すべて必須）
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub base_url: String,
    pub store_id: String,
    pub token: String,
    pub api_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proxy_url: None,
            store_id: None,
            proxy_token: None,
            proxy_api_key: None,
            calibrate_command: vec!["bbox-calibrate".into()],
            http_timeout_seconds: 30,
            sweep_timeout_seconds: 600,
            http_max_retries: 3,
            supported_inks: vec!["tshirt".into(), "t-shirt".into(), "dtg".into(), "dtf".into()],
        }
    }
}

impl Config {
    /// 設定ファイル → 環境変数の順に読み込む
    pub fn load() -> Result<Self> {
        // .env は任意
        dotenvy::dotenv().ok();

        let config_path = Self::config_path()?;
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CalibError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("gelato-calib").join("config.json"))
    }

    /// 環境変数で上書き（テストでは任意の参照関数を渡す）
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty(ENV_PROXY_URL) {
            self.proxy_url = Some(v);
        }
        if let Some(v) = non_empty(ENV_STORE_ID) {
            self.store_id = Some(v);
        }
        if let Some(v) = non_empty(ENV_PROXY_TOKEN) {
            self.proxy_token = Some(v);
        }
        if let Some(v) = non_empty(ENV_PROXY_API_KEY) {
            self.proxy_api_key = Some(v);
        }
        if let Some(v) = non_empty(ENV_CALIBRATE_CMD) {
            self.calibrate_command = v.split_whitespace().map(str::to_string).collect();
        }
        if let Some(v) = non_empty(ENV_HTTP_TIMEOUT) {
            self.http_timeout_seconds = parse_number(ENV_HTTP_TIMEOUT, &v)?;
        }
        if let Some(v) = non_empty(ENV_SWEEP_TIMEOUT) {
            self.sweep_timeout_seconds = parse_number(ENV_SWEEP_TIMEOUT, &v)?;
        }
        if let Some(v) = non_empty(ENV_HTTP_MAX_RETRIES) {
            self.http_max_retries = parse_number(ENV_HTTP_MAX_RETRIES, &v)?;
        }
        Ok(())
    }

    /// カタログ接続情報を取り出す（不足は致命的エラー）
    pub fn catalog_settings(&self) -> Result<CatalogSettings> {
        let require = |value: &Option<String>, name: &str| {
            value
                .clone()
                .ok_or_else(|| CalibError::MissingEnv(name.to_string()))
        };

        Ok(CatalogSettings {
            base_url: require(&self.proxy_url, ENV_PROXY_URL)?
                .trim_end_matches('/')
                .to_string(),
            store_id: require(&self.store_id, ENV_STORE_ID)?,
            token: require(&self.proxy_token, ENV_PROXY_TOKEN)?,
            api_key: require(&self.proxy_api_key, ENV_PROXY_API_KEY)?,
        })
    }

    /// 0 はタイムアウトなし（スイープと同じ扱い）
    pub fn http_timeout(&self) -> Option<Duration> {
        (self.http_timeout_seconds > 0).then(|| Duration::from_secs(self.http_timeout_seconds))
    }

    /// 0 はタイムアウトなし
    pub fn sweep_timeout(&self) -> Option<Duration> {
        (self.sweep_timeout_seconds > 0).then(|| Duration::from_secs(self.sweep_timeout_seconds))
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CalibError::Config(format!("{} が数値ではありません: {}", name, value)))
}

/// 秘密値を伏せて表示用にする
pub fn mask_secret(value: Option<&str>) -> String {
    match value {
        None => "未設定".into(),
        Some(v) if v.chars().count() <= 4 => "****".into(),
        Some(v) => {
            let tail: String = v.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            format!("****{}", tail)
        }
    }
}
