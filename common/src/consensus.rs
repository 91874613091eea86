//! スイープ候補の多数決
//!
//! 完全一致する bbox ごとに件数を数え、最頻出の組を採用する。
//! 同数の場合は最初に現れた組が勝つ。

use crate::types::BBox;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// 候補JSON中の bbox 表現（オブジェクト or `[x, y, w, h]`）
#[derive(Deserialize)]
#[serde(untagged)]
enum BBoxRepr {
    Object { x: f64, y: f64, w: f64, h: f64 },
    Array([f64; 4]),
}

impl BBoxRepr {
    fn into_bbox(self) -> Option<BBox> {
        let [x, y, w, h] = match self {
            BBoxRepr::Object { x, y, w, h } => [x, y, w, h],
            BBoxRepr::Array(values) => values,
        };
        // 整数値のみ受け付ける（丸めると別の候補が同じ組に入ってしまう）
        if [x, y, w, h].iter().any(|v| !is_integral(*v)) {
            return None;
        }
        Some(BBox::new(x as i64, y as i64, w as i64, h as i64))
    }
}

fn is_integral(v: f64) -> bool {
    v.is_finite() && v.fract() == 0.0 && v.abs() <= MAX_EXACT_INTEGER
}

/// f64 で誤差なく表せる整数の上限（2^53）
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// 候補JSONから bbox を取り出す（`bboxPaddedScaled` 優先、なければ `bboxScaled`）
pub fn candidate_bbox(value: &Value) -> Option<BBox> {
    ["bboxPaddedScaled", "bboxScaled"]
        .iter()
        .filter_map(|key| value.get(*key))
        .find_map(|v| {
            BBoxRepr::deserialize(v)
                .ok()
                .and_then(BBoxRepr::into_bbox)
        })
}

/// 多数決の結果
#[derive(Debug, Clone, PartialEq)]
pub struct Vote<T> {
    pub bbox: BBox,
    /// 勝者グループの件数
    pub count: usize,
    /// 投票総数
    pub total: usize,
    /// 勝者グループで最初に現れた要素
    pub representative: T,
}

/// 最頻出の bbox を選ぶ
pub fn select_majority<T, I>(candidates: I) -> Option<Vote<T>>
where
    I: IntoIterator<Item = (BBox, T)>,
{
    let mut groups: Vec<(BBox, usize, T)> = Vec::new();
    let mut index: HashMap<BBox, usize> = HashMap::new();
    let mut total = 0;

    for (bbox, item) in candidates {
        total += 1;
        match index.get(&bbox) {
            Some(&i) => groups[i].1 += 1,
            None => {
                index.insert(bbox, groups.len());
                groups.push((bbox, 1, item));
            }
        }
    }

    let mut best: Option<(BBox, usize, T)> = None;
    for group in groups {
        // 厳密に多い場合のみ置き換える（同数は先勝ち）
        if best.as_ref().map(|b| group.1 > b.1).unwrap_or(true) {
            best = Some(group);
        }
    }

    best.map(|(bbox, count, representative)| Vote {
        bbox,
        count,
        total,
        representative,
    })
}
