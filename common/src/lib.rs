//! Gelato Calib Common Library
//!
//! 照合・多数決などI/Oを伴わない共通ロジックとデータ型

pub mod alias;
pub mod consensus;
pub mod error;
pub mod matcher;
pub mod parser;
pub mod text;
pub mod types;

pub use alias::OptionAliases;
pub use consensus::{candidate_bbox, select_majority, Vote};
pub use error::{Error, Result};
pub use matcher::{find_best_match, rank_candidates, score_product, MatchContext};
pub use parser::{parse_missing_profiles, parse_product_detail, parse_product_page};
pub use types::{
    BBox, CatalogProduct, DesignHit, MatchOutcome, MatchResult, Metadata, MetadataPair,
    MissingProfile,
};
