//! テキスト正規化モジュール
//!
//! カタログのタイトル・ハンドル・メタデータとデザイン名を比較可能な形に揃える。
//! すべて全域関数（失敗しない）。

use std::collections::BTreeSet;

/// 小文字化・トリム・区切り統一・記号除去
///
/// `_` と空白類は単一スペースに畳み込み、`[a-z0-9 -]` 以外は削除する。
/// 出力は再度 `normalize` しても変化しない。
pub fn normalize(s: &str) -> String {
    let lowered = s.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => Some(c),
            '_' => Some(' '),
            c if c.is_whitespace() => Some(' '),
            _ => None,
        })
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 正規化後にスペースで分割したトークン列
pub fn tokenize(s: &str) -> Vec<String> {
    normalize(s)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// スペースをハイフンに置き換えたスラッグ
pub fn slugify(s: &str) -> String {
    normalize(s).replace(' ', "-")
}

/// 空白・ハイフンを取り除いた比較用の形
pub fn compact(s: &str) -> String {
    normalize(s).chars().filter(|c| *c != ' ' && *c != '-').collect()
}

/// 部分一致検索用のニードル集合 `{normalized, compact}`
///
/// 空文字列は含めない（空ニードルはあらゆる文字列に一致してしまうため）。
pub fn compact_needles(s: &str) -> BTreeSet<String> {
    let normalized = normalize(s);
    let compacted = compact(&normalized);

    [normalized, compacted]
        .into_iter()
        .filter(|n| !n.is_empty())
        .collect()
}

/// 検索対象の面（メタデータ・ハンドル等）にニードルが含まれるか
pub fn surface_contains(surface: &str, needles: &BTreeSet<String>) -> bool {
    if needles.is_empty() {
        return false;
    }
    let normalized = normalize(surface);
    if normalized.is_empty() {
        return false;
    }
    let compacted = compact(&normalized);

    needles
        .iter()
        .any(|n| normalized.contains(n.as_str()) || compacted.contains(n.as_str()))
}
