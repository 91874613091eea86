//! プロファイル照合モジュール
//!
//! 不足プロファイル1件に対してカタログ全商品をスコアリングし、最良の1件を選ぶ。
//!
//! ## スコア
//! - タイトルとデザインのトークン重複数（raw）
//! - デザイン検出ボーナス: メタデータ +10 / ハンドル +6 / テンプレート +6 / オプション +10
//! - コレクション推定一致 +2
//!
//! デザイン検出ボーナスが0の候補は、タイトル重複がいくらあっても採用しない。

use crate::alias::OptionAliases;
use crate::error::{Error, Result};
use crate::text::{compact, compact_needles, normalize, slugify, surface_contains, tokenize};
use crate::types::{CatalogProduct, DesignHit, MatchOutcome, MatchResult, MissingProfile};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

pub const METADATA_BONUS: i64 = 10;
pub const HANDLE_BONUS: i64 = 6;
pub const TEMPLATE_BONUS: i64 = 6;
pub const OPTION_BONUS: i64 = 10;
pub const COLLECTION_BONUS: i64 = 2;

/// 選択オプションを含むメタデータキー
pub const OPTION_VARIANT_KEY: &str = "primaryPreviewProductVariantKey";

/// エイリアス変換を行うコレクション
const ALIAS_COLLECTION: &str = "cube";

/// 照合に使う補助情報
#[derive(Debug, Clone, Default)]
pub struct MatchContext {
    pub aliases: OptionAliases,
    /// タイトルからのコレクション推定に使う候補（先勝ち）
    pub known_collections: Vec<String>,
}

impl MatchContext {
    /// 組み込みエイリアス + `cube` + プロファイルに現れるコレクション
    pub fn for_profiles(profiles: &[MissingProfile], aliases: OptionAliases) -> Self {
        let mut seen = HashSet::new();
        let known_collections = std::iter::once(ALIAS_COLLECTION.to_string())
            .chain(profiles.iter().map(|p| normalize(&p.collection)))
            .filter(|c| !c.is_empty() && seen.insert(c.clone()))
            .collect();

        Self {
            aliases,
            known_collections,
        }
    }
}

/// メタデータから「Choose Your Option=<value>」を抜き出す
pub fn selected_option(product: &CatalogProduct) -> Option<String> {
    lazy_static::lazy_static! {
        static ref CHOOSE_OPTION_RE: Regex =
            Regex::new(r"(?i)choose\s+your\s+option\s*=\s*([^;|&,]+)").unwrap();
    }

    let variant_key = product.metadata.as_ref()?.get(OPTION_VARIANT_KEY)?;
    let caps = CHOOSE_OPTION_RE.captures(&variant_key)?;
    let value = caps.get(1)?.as_str().trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// タイトルのキーワードからコレクションを推定
pub fn guess_collection<'c>(title: &str, known: &'c [String]) -> Option<&'c str> {
    let bounded = format!(" {} ", normalize(title).replace('-', " "));
    known
        .iter()
        .map(String::as_str)
        .find(|c| {
            let keyword = normalize(c).replace('-', " ");
            !keyword.is_empty() && bounded.contains(&format!(" {} ", keyword))
        })
}

/// 1商品をスコアリングする（デザイン未検出なら None）
pub fn score_product(
    profile: &MissingProfile,
    product: &CatalogProduct,
    ctx: &MatchContext,
) -> Option<MatchResult> {
    let title_tokens: HashSet<String> = tokenize(&product.title).into_iter().collect();
    let design_tokens: HashSet<String> = tokenize(&profile.design).into_iter().collect();
    let raw_score = title_tokens.intersection(&design_tokens).count() as i64;

    let option = selected_option(product);
    let hit = match profile.force_option.as_deref() {
        Some(forced) => DesignHit {
            option: option
                .as_deref()
                .map(|o| option_contains(o, forced))
                .unwrap_or(false),
            ..Default::default()
        },
        None => design_hits(profile, product, option.as_deref(), ctx),
    };

    let design_bonus = design_bonus(&hit);
    if design_bonus == 0 {
        return None;
    }

    let collection_bonus = match guess_collection(&product.title, &ctx.known_collections) {
        Some(guess) if normalize(guess) == normalize(&profile.collection) => COLLECTION_BONUS,
        _ => 0,
    };

    Some(MatchResult {
        score: raw_score + collection_bonus + design_bonus,
        raw_score,
        collection_bonus,
        design_bonus,
        design_hit: hit,
    })
}

fn design_hits(
    profile: &MissingProfile,
    product: &CatalogProduct,
    option: Option<&str>,
    ctx: &MatchContext,
) -> DesignHit {
    let design_slug = slugify(&profile.design);
    let needles: BTreeSet<String> = compact_needles(&design_slug);

    let metadata_text = product
        .metadata
        .as_ref()
        .map(|m| m.to_searchable_text())
        .unwrap_or_default();

    let option_hit = option
        .map(|o| surface_contains(o, &needles) || alias_hit(profile, o, &design_slug, ctx))
        .unwrap_or(false);

    DesignHit {
        meta: surface_contains(&metadata_text, &needles),
        handle: surface_contains(&product.handle, &needles),
        template: surface_contains(&product.template_name, &needles),
        option: option_hit,
    }
}

fn alias_hit(profile: &MissingProfile, option: &str, design_slug: &str, ctx: &MatchContext) -> bool {
    if normalize(&profile.collection) != ALIAS_COLLECTION {
        return false;
    }
    match ctx.aliases.resolve(ALIAS_COLLECTION, option) {
        Some(slug) => {
            let target = compact(slug);
            !target.is_empty() && target == compact(design_slug)
        }
        None => false,
    }
}

/// `forceOption` 由来のニードルが選択オプションに含まれるか
fn option_contains(option: &str, forced: &str) -> bool {
    surface_contains(option, &compact_needles(&slugify(forced)))
}

fn design_bonus(hit: &DesignHit) -> i64 {
    let mut bonus = 0;
    if hit.meta {
        bonus += METADATA_BONUS;
    }
    if hit.handle {
        bonus += HANDLE_BONUS;
    }
    if hit.template {
        bonus += TEMPLATE_BONUS;
    }
    if hit.option {
        bonus += OPTION_BONUS;
    }
    bonus
}

/// 採用候補をスコア降順で返す（同点は入力順）
pub fn rank_candidates<'a>(
    profile: &MissingProfile,
    catalog: &'a [CatalogProduct],
    ctx: &MatchContext,
) -> Vec<(&'a CatalogProduct, MatchResult)> {
    let mut ranked: Vec<(&CatalogProduct, MatchResult)> = catalog
        .iter()
        .filter_map(|product| score_product(profile, product, ctx).map(|m| (product, m)))
        .collect();

    // sort_by は安定ソート
    ranked.sort_by(|a, b| b.1.score.cmp(&a.1.score));
    ranked
}

/// 最良の商品を選ぶ
///
/// `forceProductId` 指定時はスコアに関係なくその商品を返し、カタログに無ければエラー。
pub fn find_best_match<'a>(
    profile: &MissingProfile,
    catalog: &'a [CatalogProduct],
    ctx: &MatchContext,
) -> Result<Option<MatchOutcome<'a>>> {
    if let Some(forced_id) = profile.force_product_id.as_deref() {
        return catalog
            .iter()
            .find(|p| p.id == forced_id)
            .map(|p| Some(MatchOutcome::Forced(p)))
            .ok_or_else(|| Error::ForcedProductNotFound(forced_id.to_string()));
    }

    Ok(rank_candidates(profile, catalog, ctx)
        .into_iter()
        .next()
        .map(|(product, result)| MatchOutcome::Scored(product, result)))
}
