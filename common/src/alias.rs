//! オプションエイリアスモジュール
//!
//! カタログの「選択オプション」表示名を社内デザインスラッグへ変換する。

use crate::error::Result;
use crate::text::{normalize, slugify};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// コレクション → (表示名 → デザインスラッグ)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionAliases {
    #[serde(flatten)]
    collections: HashMap<String, HashMap<String, String>>,
}

impl OptionAliases {
    /// 組み込みプリセット
    pub fn builtin() -> Self {
        let mut aliases = Self::default();
        for (label, slug) in CUBE_PRESET {
            aliases.insert("cube", label, slug);
        }
        aliases
    }

    /// JSONファイルから読み込み
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// JSON文字列から読み込み
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, HashMap<String, String>> = serde_json::from_str(json)?;
        let mut aliases = Self::default();
        for (collection, table) in raw {
            for (label, slug) in table {
                aliases.insert(&collection, &label, &slug);
            }
        }
        Ok(aliases)
    }

    /// 追加登録（キーは正規化して保持）
    pub fn insert(&mut self, collection: &str, label: &str, slug: &str) {
        self.collections
            .entry(normalize(collection))
            .or_default()
            .insert(normalize(label), slugify(slug));
    }

    /// 別テーブルを上書きマージ
    pub fn merge(&mut self, other: OptionAliases) {
        for (collection, table) in other.collections {
            self.collections.entry(collection).or_default().extend(table);
        }
    }

    /// 表示名を解決
    pub fn resolve(&self, collection: &str, label: &str) -> Option<&str> {
        self.collections
            .get(&normalize(collection))?
            .get(&normalize(label))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.collections.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// キューブコレクションの表示名
const CUBE_PRESET: &[(&str, &str)] = &[
    ("C-Cube-P0", "cube-3-p0"),
    ("Iron Kong", "iron-cube-08-iron-kong"),
];
