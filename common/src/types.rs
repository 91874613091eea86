//! 共通データ型

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// バウンディングボックス未調整のプロファイル（作業単位）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingProfile {
    #[serde(default)]
    pub key: String,

    pub collection: String,

    pub design: String,

    #[serde(default)]
    pub inks: Vec<String>,

    /// 指定時はスコアリングを行わずこの商品に固定
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_product_id: Option<String>,

    /// 指定時は「選択オプション」が一致する商品に限定
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_option: Option<String>,
}

impl MissingProfile {
    pub fn new(collection: impl Into<String>, design: impl Into<String>) -> Self {
        let collection = collection.into();
        let design = design.into();
        Self {
            key: format!("{}/{}", collection, design),
            collection,
            design,
            ..Default::default()
        }
    }

    /// `key` が空なら `<collection>/<design>` を補う
    pub fn with_default_key(mut self) -> Self {
        if self.key.trim().is_empty() {
            self.key = format!("{}/{}", self.collection, self.design);
        }
        self
    }

    /// 出力ディレクトリ名（単一のパス要素に収める）
    ///
    /// 空文字や `.` / `..` のようにドットだけの名前は `_` を前置して、
    /// 出力ルートの外や出力ルート自身を指さないようにする。
    pub fn dir_name(&self) -> String {
        let name = self.key.replace(['/', '\\'], "__");
        if name.trim_matches('.').is_empty() {
            format!("_{}", name)
        } else {
            name
        }
    }
}

/// メタデータの `{key, value}` ペア
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataPair {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

/// カタログ商品のメタデータ
///
/// APIはペア配列・任意オブジェクト・スカラーのいずれかを返す。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Metadata {
    /// `{key, value}` 配列（形の合わない要素は `extra` に残し、検索テキストにだけ使う）
    Pairs {
        pairs: Vec<MetadataPair>,
        extra: Vec<Value>,
    },
    Object(Map<String, Value>),
    Scalar(String),
}

impl From<Value> for Metadata {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Metadata::Object(map),
            Value::Array(items) => {
                let mut pairs = Vec::new();
                let mut extra = Vec::new();
                for item in &items {
                    match serde_json::from_value::<MetadataPair>(item.clone()) {
                        Ok(pair) => pairs.push(pair),
                        Err(_) => extra.push(item.clone()),
                    }
                }
                if pairs.is_empty() {
                    Metadata::Scalar(Value::Array(items).to_string())
                } else {
                    Metadata::Pairs { pairs, extra }
                }
            }
            Value::String(s) => Metadata::Scalar(s),
            Value::Null => Metadata::Scalar(String::new()),
            other => Metadata::Scalar(other.to_string()),
        }
    }
}

impl From<Metadata> for Value {
    fn from(metadata: Metadata) -> Self {
        match metadata {
            Metadata::Pairs { pairs, extra } => Value::Array(
                pairs
                    .into_iter()
                    .map(|p| serde_json::json!({ "key": p.key, "value": p.value }))
                    .chain(extra)
                    .collect(),
            ),
            Metadata::Object(map) => Value::Object(map),
            Metadata::Scalar(s) => Value::String(s),
        }
    }
}

impl Metadata {
    /// キー・値をすべて空白区切りで連結した検索用テキスト
    pub fn to_searchable_text(&self) -> String {
        let mut parts = Vec::new();
        match self {
            Metadata::Pairs { pairs, extra } => {
                for pair in pairs {
                    parts.push(pair.key.clone());
                    collect_leaf_text(&pair.value, &mut parts);
                }
                for item in extra {
                    collect_leaf_text(item, &mut parts);
                }
            }
            Metadata::Object(map) => {
                for (key, value) in map {
                    parts.push(key.clone());
                    collect_leaf_text(value, &mut parts);
                }
            }
            Metadata::Scalar(s) => parts.push(s.clone()),
        }
        parts.retain(|p| !p.is_empty());
        parts.join(" ")
    }

    /// トップレベルのキーで値を文字列として取得
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match self {
            Metadata::Pairs { pairs, .. } => pairs.iter().find(|p| p.key == key).map(|p| &p.value),
            Metadata::Object(map) => map.get(key),
            Metadata::Scalar(_) => None,
        }?;
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

fn collect_leaf_text(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push(s.clone()),
        Value::Bool(b) => out.push(b.to_string()),
        Value::Number(n) => out.push(n.to_string()),
        Value::Array(items) => {
            for item in items {
                collect_leaf_text(item, out);
            }
        }
        Value::Object(map) => {
            for (key, value) in map {
                out.push(key.clone());
                collect_leaf_text(value, out);
            }
        }
    }
}

/// プリントオンデマンドカタログの商品
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub title: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub handle: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub template_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mockup_url: Option<String>,
}

impl CatalogProduct {
    /// 利用可能なプレビューURL（preview → image → mockup の順）
    pub fn usable_preview_url(&self) -> Option<&str> {
        [&self.preview_url, &self.image_url, &self.mockup_url]
            .into_iter()
            .filter_map(|u| u.as_deref())
            .map(str::trim)
            .find(|u| u.starts_with("http://") || u.starts_with("https://"))
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

fn nullable_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// どの検索面でデザインが見つかったか（監査用）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignHit {
    pub meta: bool,
    pub handle: bool,
    pub template: bool,
    pub option: bool,
}

impl DesignHit {
    pub fn any(&self) -> bool {
        self.meta || self.handle || self.template || self.option
    }
}

/// 1組 (プロファイル, 商品) のスコア
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub score: i64,
    pub raw_score: i64,
    pub collection_bonus: i64,
    pub design_bonus: i64,
    pub design_hit: DesignHit,
}

/// 照合結果
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome<'a> {
    /// `forceProductId` による固定
    Forced(&'a CatalogProduct),
    /// スコアリングで選ばれた商品
    Scored(&'a CatalogProduct, MatchResult),
}

impl<'a> MatchOutcome<'a> {
    pub fn product(&self) -> &'a CatalogProduct {
        match self {
            MatchOutcome::Forced(p) => p,
            MatchOutcome::Scored(p, _) => p,
        }
    }

    pub fn is_forced(&self) -> bool {
        matches!(self, MatchOutcome::Forced(_))
    }
}

/// 候補バウンディングボックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BBox {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

impl BBox {
    pub fn new(x: i64, y: i64, w: i64, h: i64) -> Self {
        Self { x, y, w, h }
    }
}
