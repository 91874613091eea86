//! パイプライン結合テスト
//!
//! カタログ・画像取得・スイープをフェイクに差し替えて、照合から合意決定までを通しで検証

use async_trait::async_trait;
use gelato_calib::asset::AssetSource;
use gelato_calib::catalog::CatalogSource;
use gelato_calib::error::{CalibError, Result};
use gelato_calib::pipeline::{MatchSummary, Pipeline, PipelineOptions, RunReport};
use gelato_calib::sweep::SweepRunner;
use gelato_calib_common::{BBox, CatalogProduct, Metadata, MissingProfile, OptionAliases};
use image::{ImageBuffer, ImageFormat, Rgb};
use serde_json::json;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::tempdir;

const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

// ---- フェイク ----

#[derive(Default)]
struct FakeCatalog {
    products: Vec<CatalogProduct>,
    details: HashMap<String, CatalogProduct>,
    fail_listing: bool,
    detail_calls: AtomicUsize,
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn list_page(&self, _store_id: &str, limit: usize, offset: usize) -> Result<Vec<CatalogProduct>> {
        if self.fail_listing {
            return Err(CalibError::Http {
                status: 401,
                url: "https://proxy.test/store-products".into(),
                body: "unauthorized".into(),
            });
        }
        Ok(self.products.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn get_product(&self, _store_id: &str, product_id: &str) -> Result<CatalogProduct> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.details.get(product_id).cloned().ok_or_else(|| CalibError::Http {
            status: 404,
            url: format!("https://proxy.test/store-product/{}", product_id),
            body: "not found".into(),
        })
    }
}

struct FakeAssets {
    bytes: Vec<u8>,
    requested: Mutex<Vec<String>>,
}

impl FakeAssets {
    fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            requested: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AssetSource for FakeAssets {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requested.lock().unwrap().push(url.to_string());
        Ok(self.bytes.clone())
    }
}

/// 指定した bbox を `<prefix>_<n>.json/.png` として書き出すスイープ
#[derive(Default)]
struct FakeSweep {
    boxes: Vec<[i64; 4]>,
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl SweepRunner for FakeSweep {
    async fn run_sweep(&self, preview: &Path, out_dir: &Path, prefix: &str, _scale: f64) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CalibError::Sweep("終了コード Some(1)".into()));
        }
        assert!(preview.exists(), "スイープ前にプレビューが書かれていること");

        for (n, [x, y, w, h]) in self.boxes.iter().enumerate() {
            let json = json!({"bboxScaled": {"x": x, "y": y, "w": w, "h": h}});
            std::fs::write(out_dir.join(format!("{}_{}.json", prefix, n)), json.to_string())?;
            std::fs::write(out_dir.join(format!("{}_{}.png", prefix, n)), format!("candidate {}", n))?;
        }
        Ok(())
    }
}

// ---- ヘルパー ----

fn encode(format: ImageFormat) -> Vec<u8> {
    let img = ImageBuffer::from_fn(16, 12, |x, y| Rgb([(x * 10) as u8, (y * 20) as u8, 200u8]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

fn option_product(id: &str, title: &str, option: &str, preview: Option<&str>) -> CatalogProduct {
    CatalogProduct {
        id: id.into(),
        title: title.into(),
        metadata: Some(Metadata::from(json!([
            {"key": "primaryPreviewProductVariantKey", "value": format!("Choose Your Option={}", option)}
        ]))),
        preview_url: preview.map(str::to_string),
        ..Default::default()
    }
}

fn handle_product(id: &str, handle: &str) -> CatalogProduct {
    CatalogProduct {
        id: id.into(),
        title: "Plain Tee".into(),
        handle: handle.into(),
        preview_url: Some(format!("https://cdn.test/{}.jpg", id)),
        ..Default::default()
    }
}

fn options(out_root: &Path, dry_run: bool) -> PipelineOptions {
    PipelineOptions {
        report_path: None,
        out_root: out_root.to_path_buf(),
        limit: None,
        scale: 1.0,
        dry_run,
        prefix: "sweep".into(),
        store_id: "store-1".into(),
        supported_inks: vec!["tshirt".into(), "t-shirt".into(), "dtg".into(), "dtf".into()],
        aliases: OptionAliases::builtin(),
    }
}

fn scenario_d_boxes() -> Vec<[i64; 4]> {
    vec![
        [12, 11, 49, 50],
        [10, 10, 50, 50],
        [10, 10, 50, 50],
        [12, 11, 49, 50],
        [10, 10, 50, 50],
    ]
}

async fn run(
    catalog: &FakeCatalog,
    assets: &FakeAssets,
    sweep: &FakeSweep,
    opts: PipelineOptions,
    profiles: &[MissingProfile],
) -> Result<RunReport> {
    Pipeline::new(catalog, assets, sweep, opts).run(profiles).await
}

// ---- テスト ----

/// オプション表記「Iron Kong」がエイリアス経由でデザインに一致する
#[tokio::test]
async fn test_alias_option_match_dry_run() {
    let dir = tempdir().expect("Failed to create temp dir");
    let catalog = FakeCatalog {
        products: vec![
            handle_product("other", "neon-wave-tee"),
            option_product("p1", "Cube Tee", "Iron Kong", Some("https://cdn.test/p1.png")),
        ],
        ..Default::default()
    };
    let assets = FakeAssets::new(Vec::new());
    let sweep = FakeSweep::default();
    let profiles = vec![MissingProfile::new("cube", "iron-cube-08-iron-kong")];

    let report = run(&catalog, &assets, &sweep, options(dir.path(), true), &profiles)
        .await
        .unwrap();

    assert_eq!(report.gelato_products_count, 2);
    assert_eq!(report.planned_count, 1);
    let plan = &report.planned[0];
    assert_eq!(plan.product_id, "p1");
    assert_eq!(plan.selected_option.as_deref(), Some("Iron Kong"));
    match &plan.match_summary {
        MatchSummary::Scored(result) => {
            assert!(result.design_hit.option);
            assert!(result.design_bonus >= 10);
        }
        MatchSummary::Forced => panic!("scored match expected"),
    }

    // ドライランでは照合結果だけが書かれ、ダウンロード・スイープは行わない
    assert!(report.outputs.is_empty());
    assert!(plan.out_dir.join("match.json").exists());
    assert!(assets.requested.lock().unwrap().is_empty());
    assert_eq!(sweep.calls.load(Ordering::SeqCst), 0);
}

/// 対応外インクのプロファイルは照合せずスキップ
#[tokio::test]
async fn test_unsupported_ink_is_skipped() {
    let dir = tempdir().expect("Failed to create temp dir");
    let catalog = FakeCatalog {
        products: vec![handle_product("p1", "cube-alpha-tee")],
        ..Default::default()
    };
    let mut profile = MissingProfile::new("cube", "alpha");
    profile.inks = vec!["tassa".into()];

    let report = run(
        &catalog,
        &FakeAssets::new(Vec::new()),
        &FakeSweep::default(),
        options(dir.path(), true),
        &[profile],
    )
    .await
    .unwrap();

    assert_eq!(report.skipped_count, 1);
    assert_eq!(report.planned_count, 0);
    assert_eq!(report.unmatched_count, 0);
    assert_eq!(report.skipped[0].reason, "non_tshirt_profile (e.g. tassa)");
}

/// JPEG のプレビューをPNGに変換し、多数決で bbox を決定する
#[tokio::test]
async fn test_full_run_jpeg_preview_and_consensus() {
    let dir = tempdir().expect("Failed to create temp dir");
    let catalog = FakeCatalog {
        products: vec![handle_product("p1", "cube-alpha-tee")],
        ..Default::default()
    };
    let jpeg = encode(ImageFormat::Jpeg);
    assert_eq!(&jpeg[..3], &[0xFF, 0xD8, 0xFF]);
    let assets = FakeAssets::new(jpeg);
    let sweep = FakeSweep {
        boxes: scenario_d_boxes(),
        ..Default::default()
    };

    let report = run(
        &catalog,
        &assets,
        &sweep,
        options(dir.path(), false),
        &[MissingProfile::new("cube", "alpha")],
    )
    .await
    .unwrap();

    assert_eq!(report.outputs.len(), 1);
    let output = &report.outputs[0];
    assert!(output.ok, "{:?}", output);
    assert_eq!(output.bbox, Some(BBox::new(10, 10, 50, 50)));
    assert_eq!(output.count, Some(3));
    assert_eq!(output.total, Some(5));

    let preview = std::fs::read(output.preview_path.as_ref().unwrap()).unwrap();
    assert_eq!(&preview[..8], &PNG_MAGIC);
    assert_eq!(output.preview_sha256.as_ref().unwrap().len(), 64);

    // 勝者グループ最初の候補（sweep_1）が両方の名前で書き出される
    let png = std::fs::read(output.png_path.as_ref().unwrap()).unwrap();
    assert_eq!(png, b"candidate 1");
    assert!(output.alias_json_path.as_ref().unwrap().ends_with("calibration.json"));
    assert!(output.alias_png_path.as_ref().unwrap().exists());
}

/// デザインがどの面にも現れない商品は、タイトルが似ていても採用しない
#[tokio::test]
async fn test_title_only_similarity_is_unmatched() {
    let dir = tempdir().expect("Failed to create temp dir");
    let catalog = FakeCatalog {
        products: vec![CatalogProduct {
            id: "p1".into(),
            title: "Cube Alpha Tee".into(),
            ..Default::default()
        }],
        ..Default::default()
    };

    let report = run(
        &catalog,
        &FakeAssets::new(Vec::new()),
        &FakeSweep::default(),
        options(dir.path(), false),
        &[MissingProfile::new("cube", "alpha")],
    )
    .await
    .unwrap();

    assert_eq!(report.unmatched_count, 1);
    assert_eq!(report.unmatched[0].reason, "no_catalog_match");
    assert!(report.outputs.is_empty());
}

/// forceProductId はスコアに関係なく優先される
#[tokio::test]
async fn test_forced_product_wins() {
    let dir = tempdir().expect("Failed to create temp dir");
    let catalog = FakeCatalog {
        products: vec![
            handle_product("best", "cube-alpha-tee"),
            handle_product("forced", "unrelated"),
        ],
        ..Default::default()
    };
    let mut profile = MissingProfile::new("cube", "alpha");
    profile.force_product_id = Some("forced".into());

    let report = run(
        &catalog,
        &FakeAssets::new(Vec::new()),
        &FakeSweep::default(),
        options(dir.path(), true),
        &[profile.clone()],
    )
    .await
    .unwrap();
    assert_eq!(report.planned[0].product_id, "forced");
    assert_eq!(report.planned[0].match_summary, MatchSummary::Forced);

    // カタログに無いIDは実行全体のエラー
    profile.force_product_id = Some("missing".into());
    let err = run(
        &catalog,
        &FakeAssets::new(Vec::new()),
        &FakeSweep::default(),
        options(dir.path(), true),
        &[profile],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CalibError::Common(_)));
}

/// 計画件数が上限に達したら残りは調べない
#[tokio::test]
async fn test_limit_stops_planning() {
    let dir = tempdir().expect("Failed to create temp dir");
    let catalog = FakeCatalog {
        products: vec![
            handle_product("a", "cube-alpha-tee"),
            handle_product("b", "cube-bravo-tee"),
            handle_product("c", "cube-charlie-tee"),
        ],
        ..Default::default()
    };
    let profiles = vec![
        MissingProfile::new("cube", "alpha"),
        MissingProfile::new("cube", "zulu"),
        MissingProfile::new("cube", "bravo"),
        MissingProfile::new("cube", "charlie"),
    ];
    let mut opts = options(dir.path(), true);
    opts.limit = Some(2);

    let report = run(&catalog, &FakeAssets::new(Vec::new()), &FakeSweep::default(), opts, &profiles)
        .await
        .unwrap();

    assert_eq!(report.planned_count, 2);
    assert_eq!(report.unmatched_count, 1);
    assert_eq!(report.limit, Some(2));
    let ids: Vec<&str> = report.planned.iter().map(|p| p.product_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

/// 一覧にURLが無ければ詳細を取得し、それでも無ければ no_preview_url
#[tokio::test]
async fn test_preview_url_fallback_and_missing() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut with_detail = handle_product("d1", "cube-alpha-tee");
    with_detail.preview_url = None;
    let mut without_url = handle_product("d2", "cube-bravo-tee");
    without_url.preview_url = None;

    let mut detail = with_detail.clone();
    detail.mockup_url = Some("https://cdn.test/d1-mockup.png".into());
    let mut details = HashMap::new();
    details.insert("d1".to_string(), detail);
    details.insert("d2".to_string(), without_url.clone());

    let catalog = FakeCatalog {
        products: vec![with_detail, without_url],
        details,
        ..Default::default()
    };
    let assets = FakeAssets::new(encode(ImageFormat::Png));
    let sweep = FakeSweep {
        boxes: vec![[1, 2, 3, 4]],
        ..Default::default()
    };

    let report = run(
        &catalog,
        &assets,
        &sweep,
        options(dir.path(), false),
        &[MissingProfile::new("cube", "alpha"), MissingProfile::new("cube", "bravo")],
    )
    .await
    .unwrap();

    assert_eq!(catalog.detail_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        assets.requested.lock().unwrap().as_slice(),
        &["https://cdn.test/d1-mockup.png".to_string()]
    );
    assert!(report.outputs[0].ok);
    assert!(!report.outputs[1].ok);
    assert_eq!(report.outputs[1].reason.as_deref(), Some("no_preview_url"));
}

/// スイープの失敗はそのプロファイルだけの失敗として記録し、次へ進む
#[tokio::test]
async fn test_sweep_failure_continues() {
    let dir = tempdir().expect("Failed to create temp dir");
    let catalog = FakeCatalog {
        products: vec![
            handle_product("a", "cube-alpha-tee"),
            handle_product("b", "cube-bravo-tee"),
        ],
        ..Default::default()
    };
    let sweep = FakeSweep {
        fail: true,
        ..Default::default()
    };

    let report = run(
        &catalog,
        &FakeAssets::new(encode(ImageFormat::Png)),
        &sweep,
        options(dir.path(), false),
        &[MissingProfile::new("cube", "alpha"), MissingProfile::new("cube", "bravo")],
    )
    .await
    .unwrap();

    assert_eq!(sweep.calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.outputs.len(), 2);
    for output in &report.outputs {
        assert!(!output.ok);
        assert_eq!(output.reason.as_deref(), Some("sweep_failed"));
        assert!(output.error.is_some());
    }
}

/// 候補が1件も読めなければ no_consensus
#[tokio::test]
async fn test_no_candidates_is_no_consensus() {
    let dir = tempdir().expect("Failed to create temp dir");
    let catalog = FakeCatalog {
        products: vec![handle_product("a", "cube-alpha-tee")],
        ..Default::default()
    };

    let report = run(
        &catalog,
        &FakeAssets::new(encode(ImageFormat::Png)),
        &FakeSweep::default(),
        options(dir.path(), false),
        &[MissingProfile::new("cube", "alpha")],
    )
    .await
    .unwrap();

    assert_eq!(report.outputs[0].reason.as_deref(), Some("no_consensus"));
}

/// 壊れた画像は image_decode_failed
#[tokio::test]
async fn test_undecodable_image() {
    let dir = tempdir().expect("Failed to create temp dir");
    let catalog = FakeCatalog {
        products: vec![handle_product("a", "cube-alpha-tee")],
        ..Default::default()
    };
    let sweep = FakeSweep::default();

    let report = run(
        &catalog,
        &FakeAssets::new(b"<html>not an image</html>".to_vec()),
        &sweep,
        options(dir.path(), false),
        &[MissingProfile::new("cube", "alpha")],
    )
    .await
    .unwrap();

    assert_eq!(report.outputs[0].reason.as_deref(), Some("image_decode_failed"));
    assert_eq!(sweep.calls.load(Ordering::SeqCst), 0);
}

/// カタログ取得の失敗は実行全体のエラー
#[tokio::test]
async fn test_catalog_failure_is_fatal() {
    let dir = tempdir().expect("Failed to create temp dir");
    let catalog = FakeCatalog {
        fail_listing: true,
        ..Default::default()
    };

    let err = run(
        &catalog,
        &FakeAssets::new(Vec::new()),
        &FakeSweep::default(),
        options(dir.path(), false),
        &[MissingProfile::new("cube", "alpha")],
    )
    .await
    .unwrap_err();

    assert!(matches!(err, CalibError::Http { status: 401, .. }));
}

/// レポートJSONのトップレベル項目
#[tokio::test]
async fn test_report_shape() {
    let dir = tempdir().expect("Failed to create temp dir");
    let catalog = FakeCatalog {
        products: vec![handle_product("a", "cube-alpha-tee")],
        ..Default::default()
    };

    let report = run(
        &catalog,
        &FakeAssets::new(Vec::new()),
        &FakeSweep::default(),
        options(dir.path(), true),
        &[MissingProfile::new("cube", "alpha")],
    )
    .await
    .unwrap();

    let path = dir.path().join("plan.json");
    report.save(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    for key in [
        "reportPath", "outRoot", "limit", "dryRun", "gelatoProductsCount", "plannedCount",
        "skippedCount", "unmatchedCount", "planned", "skipped", "unmatched", "outputs",
    ] {
        assert!(value.get(key).is_some(), "missing {}", key);
    }
    assert_eq!(value["dryRun"], true);
    assert_eq!(value["catalogPagesFetched"], 1);
    assert_eq!(value["catalogPageCapReached"], false);
}
