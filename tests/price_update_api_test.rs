// ==========================================
// 价格更新 API 集成测试
// ==========================================
// 测试目标: 解析缓存 → 匹配预览 → 人工修正 → 应用 → 重算
// ==========================================


use std::sync::atomic::Ordering;
use std::sync::Arc;
use supplier_price_import::domain::{
    CatalogFilter, ConfirmedMatch, ModifierKind, PriceModifier, PriceRules, SlotRule,
    TemplateConfig,
};
use supplier_price_import::logging;
use supplier_price_import::repository::{CatalogRepository, TemplateRepository};
use supplier_price_import::{
    ApiError, ApplyStats, Confidence, ErrorKind, MatchMethod, PriceMode, PriceRole, SourceFormat,
};
use test_helpers::*;

fn bolt_catalog() -> Vec<supplier_price_import::CatalogItem> {
    let mut p1 = item("p1", "Steel Hex Bolt M8", Some("ABC-1"));
    p1.purchase_price = Some(dec("1.00"));
    p1.retail_price = Some(dec("2.00"));
    vec![p1, item("p2", "Steel Hex Bolt M10", Some("XYZ-2"))]
}

fn discount_rules() -> PriceRules {
    PriceRules {
        mode: PriceMode::Dual,
        price1: SlotRule {
            role: PriceRole::Purchase,
            modifier: PriceModifier {
                kind: ModifierKind::Percentage,
                value: dec("-20"),
            },
        },
        price2: SlotRule {
            role: PriceRole::Retail,
            modifier: PriceModifier {
                kind: ModifierKind::Fixed,
                value: dec("15"),
            },
        },
    }
}

fn confirmed(row_number: usize, row_code: &str, product_id: &str) -> ConfirmedMatch {
    ConfirmedMatch {
        row_number,
        row_code: row_code.to_string(),
        product_id: product_id.to_string(),
        persist_mapping: true,
    }
}

// ==========================================
// 解析与缓存
// ==========================================

#[tokio::test]
async fn test_parse_is_cached_until_source_changes() {
    logging::init_test();
    let env = TestEnv::new();
    let (registry, reads) = counting_registry();
    let api = env.api().with_parsers(registry);

    env.storage.put("f1", "prices.csv", PRICE_LIST_CSV.as_bytes(), ts(1_000));
    let template = api
        .create_template("sup-1", "main list", config_with_mapping())
        .await
        .unwrap();

    let first = api.parse_and_normalize(&template.id, "f1", false).await.unwrap();
    let second = api.parse_and_normalize(&template.id, "f1", false).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].row_number, 2);
    assert_eq!(first[0].price1, Some(dec("100")));
    assert_eq!(reads.load(Ordering::SeqCst), 1);

    // 源文件更新 → 自动重新解析
    let changed = "code,name,purchase,retail\nABC-1,Steel Hex Bolt M8,120,130\n";
    env.storage.put("f1", "prices.csv", changed.as_bytes(), ts(2_000));
    let third = api.parse_and_normalize(&template.id, "f1", false).await.unwrap();
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].price1, Some(dec("120")));
    assert_eq!(reads.load(Ordering::SeqCst), 2);

    // 强制刷新
    api.parse_and_normalize(&template.id, "f1", true).await.unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), 3);

    let stored = env.templates.find_by_id(&template.id).await.unwrap().unwrap();
    let cache = stored.normalized_cache.unwrap();
    assert_eq!(cache.source_id, "f1");
    assert_eq!(cache.source_updated_at, ts(2_000));
}

#[tokio::test]
async fn test_mapping_change_invalidates_cache() {
    let env = TestEnv::new();
    let (registry, reads) = counting_registry();
    let api = env.api().with_parsers(registry);
    env.storage.put("f1", "prices.csv", PRICE_LIST_CSV.as_bytes(), ts(1_000));
    let template = api
        .create_template("sup-1", "main", config_with_mapping())
        .await
        .unwrap();

    let before = api.parse_and_normalize(&template.id, "f1", false).await.unwrap();
    assert_eq!(before[1].code, "ZZZ-9");
    assert_eq!(before[1].price1, Some(dec("50")));

    // 价格列互换，源文件不变
    let mut swapped = config_with_mapping();
    if let Some(mapping) = swapped.mapping.as_mut() {
        mapping.price1_column = Some("D".to_string());
        mapping.price2_column = Some("C".to_string());
    }
    api.update_template_config(&template.id, swapped).await.unwrap();

    let after = api.parse_and_normalize(&template.id, "f1", false).await.unwrap();
    assert_eq!(after[1].price1, Some(dec("60")));
    assert_eq!(after[1].price2, Some(dec("50")));
    assert_eq!(reads.load(Ordering::SeqCst), 2);

    // 新映射下的缓存再次命中
    api.parse_and_normalize(&template.id, "f1", false).await.unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_missing_mapping_fails_fast() {
    let env = TestEnv::new();
    let api = env.api();
    env.storage.put("f1", "prices.csv", PRICE_LIST_CSV.as_bytes(), ts(1_000));
    let template = api
        .create_template("sup-1", "no mapping", TemplateConfig::default())
        .await
        .unwrap();

    let err = api.parse_and_normalize(&template.id, "f1", false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingMapping);

    let err = api.match_preview(&template.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingMapping);
}

#[tokio::test]
async fn test_unsupported_and_missing_files() {
    let env = TestEnv::new();
    let api = env.api();
    env.storage.put("doc", "notes.docx", b"just some words", ts(1_000));
    let template = api
        .create_template("sup-1", "main", config_with_mapping())
        .await
        .unwrap();

    let err = api.preview_file("doc", None, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);

    let err = api.parse_and_normalize(&template.id, "doc", false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);

    let err = api.parse_and_normalize(&template.id, "gone", false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // 从未解析过 → 无法预览匹配
    let err = api.match_preview(&template.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_preview_file_suggests_start_row_from_mapping() {
    let env = TestEnv::new();
    let api = env.api();
    env.storage.put("f1", "prices.csv", PRICE_LIST_CSV.as_bytes(), ts(1_000));
    let template = api
        .create_template("sup-1", "main", config_with_mapping())
        .await
        .unwrap();

    let preview = api.preview_file("f1", Some(&template.id), Some(2)).await.unwrap();
    assert_eq!(preview.format, SourceFormat::DelimitedText);
    assert_eq!(preview.header_guess, vec!["code", "name", "purchase", "retail"]);
    assert_eq!(preview.sample_rows.len(), 2);
    assert_eq!(preview.suggested_start_row, Some(2));

    let formats = api.list_supported_formats();
    assert!(formats.iter().any(|f| f.format == SourceFormat::Spreadsheet && f.implemented));
    assert!(formats.iter().any(|f| f.format == SourceFormat::ImageOrPdf && !f.implemented));
}

// ==========================================
// 匹配预览 / 人工修正
// ==========================================

#[tokio::test]
async fn test_match_preview_exact_code_and_unmatched() {
    let env = TestEnv::new();
    env.seed(&bolt_catalog());
    let api = env.api();
    env.storage.put("f1", "prices.csv", PRICE_LIST_CSV.as_bytes(), ts(1_000));
    let template = api
        .create_template("sup-1", "main", config_with_mapping())
        .await
        .unwrap();
    api.parse_and_normalize(&template.id, "f1", false).await.unwrap();

    let preview = api.match_preview(&template.id).await.unwrap();
    assert!(preview.warnings.is_empty());
    assert_eq!(preview.stats.total, 2);
    assert_eq!(preview.stats.matched, 1);
    assert_eq!(preview.stats.unmatched, 1);
    assert_eq!(preview.matched[0].result.product_id, "p1");
    assert_eq!(preview.matched[0].result.method, MatchMethod::ExactCode);
    assert_eq!(preview.matched[0].result.confidence, Confidence::High);
    assert_eq!(preview.unmatched[0].code, "ZZZ-9");

    // 预览不修改模板
    let stored = env.templates.find_by_id(&template.id).await.unwrap().unwrap();
    assert!(stored.matched_products.is_empty());
}

#[tokio::test]
async fn test_match_preview_reparses_stale_source() {
    let env = TestEnv::new();
    env.seed(&bolt_catalog());
    let (registry, reads) = counting_registry();
    let api = env.api().with_parsers(registry);
    env.storage.put("f1", "prices.csv", PRICE_LIST_CSV.as_bytes(), ts(1_000));
    let template = api
        .create_template("sup-1", "main", config_with_mapping())
        .await
        .unwrap();
    api.parse_and_normalize(&template.id, "f1", false).await.unwrap();

    let only_m10 = "code,name,purchase,retail\nXYZ-2,Steel Hex Bolt M10,10,20\n";
    env.storage.put("f1", "prices.csv", only_m10.as_bytes(), ts(5_000));

    let preview = api.match_preview(&template.id).await.unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), 2);
    assert_eq!(preview.stats.total, 1);
    assert_eq!(preview.matched[0].result.product_id, "p2");
}

#[tokio::test]
async fn test_no_candidates_is_a_warning() {
    let env = TestEnv::new();
    env.seed(&bolt_catalog());
    let api = env.api();
    env.storage.put("f1", "prices.csv", PRICE_LIST_CSV.as_bytes(), ts(1_000));

    let mut config = config_with_mapping();
    config.filters = CatalogFilter {
        brands: vec!["no-such-brand".to_string()],
        ..CatalogFilter::default()
    };
    let template = api.create_template("sup-1", "filtered", config).await.unwrap();
    api.parse_and_normalize(&template.id, "f1", false).await.unwrap();

    let preview = api.match_preview(&template.id).await.unwrap();
    assert_eq!(preview.warnings.len(), 1);
    assert_eq!(preview.warnings[0].kind, ErrorKind::NoCandidates);
    assert_eq!(preview.stats.unmatched, 2);
    assert!(preview.matched.is_empty());
}

#[tokio::test]
async fn test_update_match_is_remembered_and_can_be_unlinked() {
    let env = TestEnv::new();
    env.seed(&bolt_catalog());
    let api = env.api();
    env.storage.put("f1", "prices.csv", PRICE_LIST_CSV.as_bytes(), ts(1_000));
    let template = api
        .create_template("sup-1", "main", config_with_mapping())
        .await
        .unwrap();
    api.parse_and_normalize(&template.id, "f1", false).await.unwrap();

    api.update_match(&template.id, "ZZZ-9", Some("p2")).await.unwrap();
    let stored = api.get_template(&template.id).await.unwrap();
    assert_eq!(stored.matched_products.get("p2"), Some("ZZZ-9"));

    let preview = api.match_preview(&template.id).await.unwrap();
    let gadget = preview
        .matched
        .iter()
        .find(|m| m.row.code == "ZZZ-9")
        .unwrap();
    assert_eq!(gadget.result.product_id, "p2");
    assert_eq!(gadget.result.method, MatchMethod::PriorMapping);
    assert_eq!(preview.stats.unmatched, 0);

    api.update_match(&template.id, "zzz-9", None).await.unwrap();
    let stored = api.get_template(&template.id).await.unwrap();
    assert!(stored.matched_products.is_empty());

    let err = api
        .update_match(&template.id, "ZZZ-9", Some("ghost"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_confirm_all_is_all_or_nothing() {
    let env = TestEnv::new();
    let api = env.api();
    let template = api
        .create_template("sup-1", "main", config_with_mapping())
        .await
        .unwrap();

    let saved = api
        .confirm_all_matches(&template.id, &[confirmed(2, "ABC-1", "p1"), confirmed(3, "ZZZ-9", "p2")])
        .await
        .unwrap();
    assert_eq!(saved, 2);

    let err = api
        .confirm_all_matches(&template.id, &[confirmed(2, "NEW-1", "p3"), confirmed(3, "NEW-2", " ")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let stored = api.get_template(&template.id).await.unwrap();
    assert_eq!(stored.matched_products.len(), 2);
    assert_eq!(stored.matched_products.get("p3"), None);
}

// ==========================================
// 应用价格
// ==========================================

#[tokio::test]
async fn test_apply_skips_missing_item_and_advances_applied_at() {
    logging::init_test();
    let env = TestEnv::new();
    env.seed(&bolt_catalog());
    let api = env.api();
    env.storage.put("f1", "prices.csv", PRICE_LIST_CSV.as_bytes(), ts(1_000));

    let mut config = config_with_mapping();
    config.price_rules = discount_rules();
    let template = api.create_template("sup-1", "main", config).await.unwrap();
    api.parse_and_normalize(&template.id, "f1", false).await.unwrap();

    let batch = [confirmed(2, "ABC-1", "p1"), confirmed(3, "ZZZ-9", "missing-product")];
    let stats = api.apply_prices(&template.id, &batch, "user-7").await.unwrap();

    assert_eq!(stats.attempted, 2);
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.mappings_saved, 1);
    assert_eq!(stats.outcomes[0].product_id, "p1");
    assert_eq!(stats.outcomes[1].product_id, "missing-product");

    let p1 = env.catalog.find_by_id("p1").await.unwrap().unwrap();
    assert_eq!(p1.purchase_price, Some(dec("80.00")));
    assert_eq!(p1.retail_price, Some(dec("115.00")));

    let stored = api.get_template(&template.id).await.unwrap();
    let first_applied = stored.applied_at.unwrap();
    assert_eq!(stored.applied_by.as_deref(), Some("user-7"));
    assert_eq!(stored.matched_products.get("p1"), Some("ABC-1"));
    assert_eq!(stored.matched_products.get("missing-product"), None);

    let stats = api
        .apply_prices(&template.id, &[confirmed(2, "ABC-1", "p1")], "user-8")
        .await
        .unwrap();
    assert_eq!(stats.updated, 1);
    let stored = api.get_template(&template.id).await.unwrap();
    assert!(stored.applied_at.unwrap() >= first_applied);
    assert_eq!(stored.applied_by.as_deref(), Some("user-8"));
}

#[tokio::test]
async fn test_apply_reports_partial_write_failure() {
    let env = TestEnv::new();
    env.seed(&bolt_catalog());
    let failing = FailingCatalog {
        inner: env.sqlite_catalog(),
        fail_ids: vec!["p1".to_string()],
    };
    let api = env.api_with_catalog(Arc::new(failing));
    env.storage.put("f1", "prices.csv", PRICE_LIST_CSV.as_bytes(), ts(1_000));
    let template = api
        .create_template("sup-1", "main", config_with_mapping())
        .await
        .unwrap();
    api.parse_and_normalize(&template.id, "f1", false).await.unwrap();

    let batch = [confirmed(2, "ABC-1", "p1"), confirmed(3, "ZZZ-9", "p2")];
    let err = api.apply_prices(&template.id, &batch, "user-7").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PartialWriteFailure);

    let stats: ApplyStats = match err {
        ApiError::PartialWriteFailure { stats } => *stats,
        other => panic!("unexpected error: {other}"),
    };
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.mappings_saved, 1);

    // 成功的行已写入，applied_at 不更新
    let p2 = env.catalog.find_by_id("p2").await.unwrap().unwrap();
    assert_eq!(p2.purchase_price, Some(dec("50.00")));
    assert_eq!(p2.retail_price, Some(dec("60.00")));
    let stored = api.get_template(&template.id).await.unwrap();
    assert!(stored.applied_at.is_none());
    assert_eq!(stored.matched_products.get("p2"), Some("ZZZ-9"));
    assert_eq!(stored.matched_products.get("p1"), None);
}

#[tokio::test]
async fn test_apply_follows_row_code_when_source_rows_shift() {
    let env = TestEnv::new();
    env.seed(&bolt_catalog());
    let api = env.api();
    env.storage.put("f1", "prices.csv", PRICE_LIST_CSV.as_bytes(), ts(1_000));
    let template = api
        .create_template("sup-1", "main", config_with_mapping())
        .await
        .unwrap();
    api.parse_and_normalize(&template.id, "f1", false).await.unwrap();

    // 预览后供应商重新上传，新行插在第 2 行
    let shifted = "code,name,purchase,retail\n\
NEW-5,New Washer,7,7\n\
ABC-1,Steel Hex Bolt M8,100,100\n\
ZZZ-9,Unknown Gadget,50,60\n";
    env.storage.put("f1", "prices.csv", shifted.as_bytes(), ts(2_000));

    let stats = api
        .apply_prices(&template.id, &[confirmed(2, "ABC-1", "p1")], "user-7")
        .await
        .unwrap();
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.outcomes[0].row_number, 3);

    let p1 = env.catalog.find_by_id("p1").await.unwrap().unwrap();
    assert_eq!(p1.purchase_price, Some(dec("100.00")));
    assert_eq!(p1.purchase_price.map(|p| p.to_string()).as_deref(), Some("100.00"));
    let stored = api.get_template(&template.id).await.unwrap();
    assert_eq!(stored.matched_products.get("p1"), Some("ABC-1"));
}

#[tokio::test]
async fn test_apply_skips_code_no_longer_in_source() {
    let env = TestEnv::new();
    env.seed(&bolt_catalog());
    let api = env.api();
    env.storage.put("f1", "prices.csv", PRICE_LIST_CSV.as_bytes(), ts(1_000));
    let template = api
        .create_template("sup-1", "main", config_with_mapping())
        .await
        .unwrap();
    api.parse_and_normalize(&template.id, "f1", false).await.unwrap();

    let replaced = "code,name,purchase,retail\nNEW-5,New Washer,7,7\n";
    env.storage.put("f1", "prices.csv", replaced.as_bytes(), ts(2_000));

    let stats = api
        .apply_prices(&template.id, &[confirmed(2, "ABC-1", "p1")], "user-7")
        .await
        .unwrap();
    assert_eq!(stats.updated, 0);
    assert_eq!(stats.skipped, 1);

    let p1 = env.catalog.find_by_id("p1").await.unwrap().unwrap();
    assert_eq!(p1.purchase_price, Some(dec("1.00")));
}

#[tokio::test]
async fn test_apply_writes_duplicate_product_once() {
    let env = TestEnv::new();
    env.seed(&bolt_catalog());
    let api = env.api();
    env.storage.put("f1", "prices.csv", PRICE_LIST_CSV.as_bytes(), ts(1_000));
    let template = api
        .create_template("sup-1", "main", config_with_mapping())
        .await
        .unwrap();
    api.parse_and_normalize(&template.id, "f1", false).await.unwrap();

    let batch = [confirmed(2, "ABC-1", "p1"), confirmed(3, "ZZZ-9", "p1")];
    let stats = api.apply_prices(&template.id, &batch, "user-7").await.unwrap();
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.outcomes[0].row_number, 2);
    assert_eq!(stats.outcomes[1].row_number, 3);
    assert!(stats.outcomes[1].reason.is_some());

    // 批次中先出现的行生效
    let p1 = env.catalog.find_by_id("p1").await.unwrap().unwrap();
    assert_eq!(p1.purchase_price, Some(dec("100.00")));
    let stored = api.get_template(&template.id).await.unwrap();
    assert_eq!(stored.matched_products.get("p1"), Some("ABC-1"));
}

#[tokio::test]
async fn test_apply_returns_stats_when_bookkeeping_fails() {
    let env = TestEnv::new();
    env.seed(&bolt_catalog());
    env.storage.put("f1", "prices.csv", PRICE_LIST_CSV.as_bytes(), ts(1_000));
    let template = env
        .api()
        .create_template("sup-1", "main", config_with_mapping())
        .await
        .unwrap();
    env.api().parse_and_normalize(&template.id, "f1", false).await.unwrap();

    for (fail_mapping, fail_mark_applied) in [(true, false), (false, true)] {
        let templates = env.failing_templates(fail_mapping, fail_mark_applied);
        let api = env.api_with(Arc::new(templates), env.catalog.clone());

        let err = api
            .apply_prices(&template.id, &[confirmed(2, "ABC-1", "p1")], "user-7")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PartialWriteFailure);
        let stats = match err {
            ApiError::ApplyNotRecorded { stats, .. } => *stats,
            other => panic!("unexpected error: {other}"),
        };
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.outcomes[0].product_id, "p1");
    }

    // 价格已写入，但应用记录未更新
    let p1 = env.catalog.find_by_id("p1").await.unwrap().unwrap();
    assert_eq!(p1.purchase_price, Some(dec("100.00")));
    let stored = env.api().get_template(&template.id).await.unwrap();
    assert!(stored.applied_at.is_none());
}

#[tokio::test]
async fn test_apply_rejects_empty_batch_and_user() {
    let env = TestEnv::new();
    let api = env.api();
    let template = api
        .create_template("sup-1", "main", config_with_mapping())
        .await
        .unwrap();

    let err = api.apply_prices(&template.id, &[], "user-7").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = api
        .apply_prices(&template.id, &[confirmed(2, "ABC-1", "p1")], "  ")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

// ==========================================
// 按存储原价重算
// ==========================================

#[tokio::test]
async fn test_recalculate_uses_stored_raw_prices_and_current_rules() {
    let env = TestEnv::new();
    env.seed(&bolt_catalog());
    let api = env.api();
    env.storage.put("f1", "prices.csv", PRICE_LIST_CSV.as_bytes(), ts(1_000));

    let mut config = config_with_mapping();
    config.price_rules = discount_rules();
    let template = api.create_template("sup-1", "main", config.clone()).await.unwrap();
    api.parse_and_normalize(&template.id, "f1", false).await.unwrap();
    api.apply_prices(&template.id, &[confirmed(2, "ABC-1", "p1")], "user-7")
        .await
        .unwrap();
    let mapping_before = api.get_template(&template.id).await.unwrap().matched_products;

    // 调整进价折扣
    config.price_rules.price1.modifier.value = dec("-10");
    api.update_template_config(&template.id, config).await.unwrap();

    let stats = api.recalculate_prices(PriceRole::Purchase, None).await.unwrap();
    assert_eq!(stats.scanned, 1);
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.failed, 0);

    let p1 = env.catalog.find_by_id("p1").await.unwrap().unwrap();
    assert_eq!(p1.purchase_price, Some(dec("90.00")));
    assert_eq!(p1.retail_price, Some(dec("115.00")));

    let stored = api.get_template(&template.id).await.unwrap();
    assert_eq!(stored.matched_products, mapping_before);
}

#[tokio::test]
async fn test_recalculate_skips_roles_outside_template_mode() {
    let env = TestEnv::new();
    env.seed(&bolt_catalog());
    let api = env.api();
    env.storage.put("f1", "prices.csv", PRICE_LIST_CSV.as_bytes(), ts(1_000));

    let mut config = config_with_mapping();
    config.price_rules = discount_rules();
    config.price_rules.mode = PriceMode::SinglePurchase;
    let template = api.create_template("sup-1", "main", config).await.unwrap();
    api.parse_and_normalize(&template.id, "f1", false).await.unwrap();
    let stats = api
        .apply_prices(&template.id, &[confirmed(2, "ABC-1", "p1")], "user-7")
        .await
        .unwrap();
    assert_eq!(stats.outcomes[0].prices.unwrap().retail, None);

    let p1 = env.catalog.find_by_id("p1").await.unwrap().unwrap();
    assert_eq!(p1.purchase_price, Some(dec("80.00")));
    assert_eq!(p1.retail_price, Some(dec("2.00")));

    let stats = api.recalculate_prices(PriceRole::Retail, Some(10)).await.unwrap();
    assert_eq!(stats.scanned, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.updated, 0);
}
