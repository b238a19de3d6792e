// ==========================================
// 供应商价格更新 API
// ==========================================
// 职责: 解析并缓存 → 匹配预览 → 人工修正/确认 → 应用价格 → 按存储原价重算
// 约束:
// - 缺少源文件 / 文件无法解析 / 模板无列映射 → 立即返回类型化错误
// - 同一模板同时最多一个 apply_prices
// - 所有协作方调用都有超时
// ==========================================

use crate::api::error::{ApiError, ApiResult, ErrorKind};
use crate::config::import_config_trait::{ImportSettings, PriceImportConfigReader};
use crate::domain::catalog::{ComputedPrices, PriceUpdate};
use crate::domain::matching::{
    ApplyRowOutcome, ApplyRowStatus, ApplyStats, ConfirmedMatch, MatchStats, RecalcStats, RowMatch,
};
use crate::domain::row::{NormalizedRow, PreviewResult};
use crate::domain::template::{ImportTemplate, TemplateConfig};
use crate::domain::types::PriceRole;
use crate::engine::apply_guard::ApplyGuard;
use crate::engine::matcher::MatcherChain;
use crate::engine::price_calculator::{compute_prices, compute_role_from_raw};
use crate::engine::template_store::TemplateStore;
use crate::engine::timeout::bounded;
use crate::importer::file_parser::{FormatInfo, ParserRegistry, PreviewOptions};
use crate::importer::normalizer::normalize_code;
use crate::repository::catalog_repo::CatalogRepository;
use crate::repository::file_storage::FileStorage;
use crate::repository::template_repo::TemplateRepository;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// 匹配预览响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPreview {
    pub matched: Vec<RowMatch>,
    pub unmatched: Vec<NormalizedRow>,
    pub stats: MatchStats,
    /// 配置类警告（例如过滤条件下没有任何候选商品）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PreviewWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewWarning {
    pub kind: ErrorKind,
    pub message: String,
}

/// 单条价格写入任务
struct WriteJob {
    row_number: usize,
    product_id: String,
    supplier_code: String,
    persist_mapping: bool,
    update: PriceUpdate,
}

/// 供应商价格更新 API
pub struct PriceUpdateApi {
    templates: Arc<dyn TemplateRepository>,
    catalog: Arc<dyn CatalogRepository>,
    storage: Arc<dyn FileStorage>,
    config: Arc<dyn PriceImportConfigReader>,
    parsers: Arc<ParserRegistry>,
    apply_guard: ApplyGuard,
}

impl PriceUpdateApi {
    pub fn new(
        templates: Arc<dyn TemplateRepository>,
        catalog: Arc<dyn CatalogRepository>,
        storage: Arc<dyn FileStorage>,
        config: Arc<dyn PriceImportConfigReader>,
    ) -> Self {
        Self {
            templates,
            catalog,
            storage,
            config,
            parsers: Arc::new(ParserRegistry::with_defaults()),
            apply_guard: ApplyGuard::new(),
        }
    }

    /// 替换解析器注册表（自定义读取器）
    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = Arc::new(parsers);
        self
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    async fn settings(&self) -> ApiResult<ImportSettings> {
        self.config
            .load_settings()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))
    }

    fn template_store(&self, settings: &ImportSettings) -> TemplateStore {
        TemplateStore::new(
            Arc::clone(&self.parsers),
            Arc::clone(&self.templates),
            settings.io_timeout(),
        )
    }

    async fn load_template(&self, template_id: &str, timeout: Duration) -> ApiResult<ImportTemplate> {
        bounded("template.find_by_id", timeout, self.templates.find_by_id(template_id))
            .await??
            .ok_or_else(|| ApiError::NotFound(format!("ImportTemplate(id={})不存在", template_id)))
    }

    fn ensure_mapping(template: &ImportTemplate) -> ApiResult<()> {
        if template.config.mapping.is_none() {
            return Err(ApiError::MissingMapping(format!("template_id={}", template.id)));
        }
        Ok(())
    }

    /// 读取当前有效的规范化行；来源文件已变化时自动重新解析
    async fn load_fresh_rows(
        &self,
        template: &mut ImportTemplate,
        settings: &ImportSettings,
    ) -> ApiResult<Vec<NormalizedRow>> {
        Self::ensure_mapping(template)?;
        let source_id = template
            .last_import_source_id()
            .map(str::to_string)
            .ok_or_else(|| {
                ApiError::NotFound(format!("模板 {} 尚未解析任何价格表", template.id))
            })?;

        let rows = self
            .template_store(settings)
            .get_or_refresh_normalized_rows(template, self.storage.as_ref(), &source_id, false)
            .await?;
        Ok(rows)
    }

    // ==========================================
    // 模板
    // ==========================================

    /// 创建导入模板
    pub async fn create_template(
        &self,
        supplier_id: &str,
        name: &str,
        config: TemplateConfig,
    ) -> ApiResult<ImportTemplate> {
        if supplier_id.trim().is_empty() || name.trim().is_empty() {
            return Err(ApiError::InvalidInput("supplier_id 与 name 不能为空".to_string()));
        }
        if let Some(mapping) = &config.mapping {
            mapping.resolve().map_err(ApiError::InvalidInput)?;
        }

        let settings = self.settings().await?;
        let template = ImportTemplate::new(supplier_id.trim(), name.trim(), config);
        bounded("template.insert", settings.io_timeout(), self.templates.insert(&template)).await??;
        info!(template_id = %template.id, supplier_id = %template.supplier_id, "导入模板已创建");
        Ok(template)
    }

    pub async fn get_template(&self, template_id: &str) -> ApiResult<ImportTemplate> {
        let settings = self.settings().await?;
        self.load_template(template_id, settings.io_timeout()).await
    }

    /// 更新模板配置（列映射 / 过滤 / 价格规则）
    pub async fn update_template_config(
        &self,
        template_id: &str,
        config: TemplateConfig,
    ) -> ApiResult<()> {
        if let Some(mapping) = &config.mapping {
            mapping.resolve().map_err(ApiError::InvalidInput)?;
        }
        let settings = self.settings().await?;
        bounded(
            "template.update_config",
            settings.io_timeout(),
            self.templates.update_config(template_id, &config),
        )
        .await??;
        Ok(())
    }

    // ==========================================
    // 解析
    // ==========================================

    /// 已注册的文件格式
    pub fn list_supported_formats(&self) -> Vec<FormatInfo> {
        self.parsers.supported_formats()
    }

    /// 预览源文件前 N 行（可选: 按模板列映射建议起始行）
    #[instrument(skip(self))]
    pub async fn preview_file(
        &self,
        source_file_id: &str,
        template_id: Option<&str>,
        row_limit: Option<usize>,
    ) -> ApiResult<PreviewResult> {
        let settings = self.settings().await?;
        let mapping = match template_id {
            Some(id) => self.load_template(id, settings.io_timeout()).await?.config.mapping,
            None => None,
        };

        let file = bounded("file.load", settings.io_timeout(), self.storage.load(source_file_id)).await??;
        let options = PreviewOptions {
            row_limit: row_limit.unwrap_or(settings.preview_row_limit),
            scan_rows: settings.header_scan_rows,
            mapping,
        };
        let preview = self
            .parsers
            .preview(&file.metadata.file_name, &file.bytes, &options)?;
        info!(
            file = %file.metadata.file_name,
            sample_rows = preview.sample_rows.len(),
            suggested_start_row = ?preview.suggested_start_row,
            "文件预览完成"
        );
        Ok(preview)
    }

    /// 解析并缓存；文件未变化且未强制刷新时直接返回缓存
    #[instrument(skip(self))]
    pub async fn parse_and_normalize(
        &self,
        template_id: &str,
        source_file_id: &str,
        force_refresh: bool,
    ) -> ApiResult<Vec<NormalizedRow>> {
        let settings = self.settings().await?;
        let mut template = self.load_template(template_id, settings.io_timeout()).await?;
        Self::ensure_mapping(&template)?;

        let rows = self
            .template_store(&settings)
            .get_or_refresh_normalized_rows(
                &mut template,
                self.storage.as_ref(),
                source_file_id,
                force_refresh,
            )
            .await?;
        Ok(rows)
    }

    // ==========================================
    // 匹配
    // ==========================================

    /// 匹配预览（不修改映射，可重复调用）
    #[instrument(skip(self))]
    pub async fn match_preview(&self, template_id: &str) -> ApiResult<MatchPreview> {
        let settings = self.settings().await?;
        let mut template = self.load_template(template_id, settings.io_timeout()).await?;
        let rows = self.load_fresh_rows(&mut template, &settings).await?;

        let candidates = bounded(
            "catalog.find_candidates",
            settings.io_timeout(),
            self.catalog.find_candidates(&template.config.filters),
        )
        .await??;

        let mut warnings = Vec::new();
        if candidates.is_empty() {
            warn!(template_id, filters = ?template.config.filters, "过滤条件下没有候选商品");
            warnings.push(PreviewWarning {
                kind: ErrorKind::NoCandidates,
                message: "模板的目录过滤条件没有匹配到任何商品，请检查分类/类型/品牌配置".to_string(),
            });
        }

        let chain = MatcherChain::with_defaults(settings.fuzzy_max_level);
        let outcome = chain.match_all(
            &rows,
            candidates,
            &template.matched_products,
            &template.supplier_id,
        );

        Ok(MatchPreview {
            matched: outcome.matched,
            unmatched: outcome.unmatched,
            stats: outcome.stats,
            warnings,
        })
    }

    /// 人工修正单行匹配；product_id 为 None 时解除该编码的映射
    #[instrument(skip(self))]
    pub async fn update_match(
        &self,
        template_id: &str,
        row_code: &str,
        product_id: Option<&str>,
    ) -> ApiResult<()> {
        let settings = self.settings().await?;
        let mut template = self.load_template(template_id, settings.io_timeout()).await?;
        let store = self.template_store(&settings);

        match product_id {
            Some(product_id) => {
                let exists = bounded(
                    "catalog.find_by_id",
                    settings.io_timeout(),
                    self.catalog.find_by_id(product_id),
                )
                .await??;
                if exists.is_none() {
                    return Err(ApiError::NotFound(format!("CatalogItem(id={})不存在", product_id)));
                }
                store
                    .record_confirmed_match(&mut template, product_id, row_code)
                    .await?;
                info!(template_id, row_code, product_id, "人工匹配已保存");
            }
            None => {
                let removed = store.remove_confirmed_match(&mut template, row_code).await?;
                info!(template_id, row_code, removed = ?removed, "人工匹配已解除");
            }
        }
        Ok(())
    }

    /// 批量确认匹配（全有或全无），不写价格
    #[instrument(skip(self, matches), fields(count = matches.len()))]
    pub async fn confirm_all_matches(
        &self,
        template_id: &str,
        matches: &[ConfirmedMatch],
    ) -> ApiResult<usize> {
        let settings = self.settings().await?;
        let mut template = self.load_template(template_id, settings.io_timeout()).await?;
        let saved = self
            .template_store(&settings)
            .confirm_all(&mut template, matches)
            .await?;
        Ok(saved)
    }

    // ==========================================
    // 应用
    // ==========================================

    /// 应用价格
    ///
    /// 策略: 跳过并继续。商品不存在 → skipped，不影响 applied_at；
    /// 任一写入失败 → 已成功的行保留，applied_at 不更新，返回 PartialWriteFailure；
    /// 价格写入后映射或 applied_at 保存失败 → ApplyNotRecorded（带 stats）
    #[instrument(skip(self, confirmed), fields(count = confirmed.len()))]
    pub async fn apply_prices(
        &self,
        template_id: &str,
        confirmed: &[ConfirmedMatch],
        acting_user_id: &str,
    ) -> ApiResult<ApplyStats> {
        if acting_user_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("acting_user_id 不能为空".to_string()));
        }
        if confirmed.is_empty() {
            return Err(ApiError::InvalidInput("没有待应用的匹配".to_string()));
        }

        let _permit = self
            .apply_guard
            .try_acquire(template_id)
            .ok_or_else(|| ApiError::ApplyConflict {
                template_id: template_id.to_string(),
            })?;

        let start = Instant::now();
        let settings = self.settings().await?;
        let timeout = settings.io_timeout();
        let mut template = self.load_template(template_id, timeout).await?;
        let rows = self.load_fresh_rows(&mut template, &settings).await?;

        let by_number: HashMap<usize, &NormalizedRow> =
            rows.iter().map(|r| (r.row_number, r)).collect();

        let mut stats = ApplyStats::default();
        let mut jobs: Vec<WriteJob> = Vec::new();
        for m in confirmed {
            // 行号只在编码一致时可信（源文件重新上传后行可能移位）
            let wanted = normalize_code(&m.row_code);
            let row = by_number
                .get(&m.row_number)
                .copied()
                .filter(|r| wanted.is_empty() || normalize_code(&r.code) == wanted)
                .or_else(|| {
                    rows.iter()
                        .find(|r| !wanted.is_empty() && normalize_code(&r.code) == wanted)
                });

            let Some(row) = row else {
                stats.push(skipped(m.row_number, &m.product_id, "价格表中不存在该行", None));
                continue;
            };

            // 同一商品在一批中只写一次，以批次中先出现的为准
            if jobs.iter().any(|j| j.product_id == m.product_id) {
                stats.push(skipped(row.row_number, &m.product_id, "同一批次中重复的商品", None));
                continue;
            }

            let prices = compute_prices(row, &template.config.price_rules);
            if prices.is_empty() {
                stats.push(skipped(row.row_number, &m.product_id, "该行没有可用价格", None));
                continue;
            }

            let supplier_code = if m.row_code.trim().is_empty() {
                row.code.clone()
            } else {
                m.row_code.clone()
            };
            jobs.push(WriteJob {
                row_number: row.row_number,
                product_id: m.product_id.clone(),
                supplier_code,
                persist_mapping: m.persist_mapping,
                update: PriceUpdate {
                    prices,
                    raw_price1: row.price1,
                    raw_price2: row.price2,
                    template_id: Some(template.id.clone()),
                },
            });
        }

        // 不同商品的写入互不依赖，并发执行
        let catalog = Arc::clone(&self.catalog);
        let results: Vec<_> = stream::iter(jobs)
            .map(|job| {
                let catalog = Arc::clone(&catalog);
                async move {
                    let result = bounded(
                        "catalog.update_prices",
                        timeout,
                        catalog.update_prices(&job.product_id, &job.update),
                    )
                    .await;
                    (job, result)
                }
            })
            .buffer_unordered(settings.apply_concurrency.max(1))
            .collect()
            .await;

        let mut to_persist = Vec::new();
        for (job, result) in results {
            match result {
                Ok(Ok(true)) => {
                    if job.persist_mapping && !job.supplier_code.trim().is_empty() {
                        to_persist.push(ConfirmedMatch {
                            row_number: job.row_number,
                            row_code: job.supplier_code.clone(),
                            product_id: job.product_id.clone(),
                            persist_mapping: true,
                        });
                    }
                    stats.push(ApplyRowOutcome {
                        row_number: job.row_number,
                        product_id: job.product_id,
                        status: ApplyRowStatus::Updated,
                        reason: None,
                        prices: Some(job.update.prices),
                    });
                }
                Ok(Ok(false)) => {
                    stats.push(skipped(job.row_number, &job.product_id, "目录中不存在该商品", Some(job.update.prices)));
                }
                Ok(Err(e)) => {
                    warn!(product_id = %job.product_id, error = %e, "价格写入失败");
                    stats.push(failed(job, e.to_string()));
                }
                Err(e) => {
                    warn!(product_id = %job.product_id, error = %e, "价格写入超时");
                    stats.push(failed(job, e.to_string()));
                }
            }
        }
        stats
            .outcomes
            .sort_by(|a, b| (a.row_number, &a.product_id).cmp(&(b.row_number, &b.product_id)));
        to_persist.sort_by_key(|m| m.row_number);

        // 价格已经写入: 之后的失败必须带上 stats 返回
        if !to_persist.is_empty() {
            match self
                .template_store(&settings)
                .confirm_all(&mut template, &to_persist)
                .await
            {
                Ok(saved) => stats.mappings_saved = saved,
                Err(e) => {
                    let cause = ApiError::from(e).to_string();
                    warn!(template_id, error = %cause, "价格已写入，映射保存失败");
                    return Err(ApiError::ApplyNotRecorded {
                        stats: Box::new(stats),
                        cause,
                    });
                }
            }
        }

        info!(
            template_id,
            attempted = stats.attempted,
            updated = stats.updated,
            skipped = stats.skipped,
            failed = stats.failed,
            mappings_saved = stats.mappings_saved,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "价格应用完成"
        );

        if stats.failed > 0 {
            return Err(ApiError::PartialWriteFailure {
                stats: Box::new(stats),
            });
        }

        let marked = match bounded(
            "template.mark_applied",
            timeout,
            self.templates.mark_applied(template_id, Utc::now(), acting_user_id),
        )
        .await
        {
            Ok(result) => result.map_err(ApiError::from),
            Err(e) => Err(ApiError::from(e)),
        };
        if let Err(e) = marked {
            let cause = e.to_string();
            warn!(template_id, error = %cause, "价格已写入，applied_at 保存失败");
            return Err(ApiError::ApplyNotRecorded {
                stats: Box::new(stats),
                cause,
            });
        }
        Ok(stats)
    }

    // ==========================================
    // 重算
    // ==========================================

    /// 按已存储的原始价格 + 当前价格规则重算某一角色的价格
    ///
    /// 不读取供应商文件，不修改 matched_products
    #[instrument(skip(self))]
    pub async fn recalculate_prices(
        &self,
        price_role: PriceRole,
        limit: Option<usize>,
    ) -> ApiResult<RecalcStats> {
        let settings = self.settings().await?;
        let timeout = settings.io_timeout();
        let limit = limit.unwrap_or(settings.recalc_default_limit);

        let stored = bounded(
            "catalog.list_stored_raw_prices",
            timeout,
            self.catalog.list_stored_raw_prices(limit),
        )
        .await??;

        let mut templates: HashMap<String, Option<ImportTemplate>> = HashMap::new();
        let mut stats = RecalcStats::default();

        for entry in stored {
            stats.scanned += 1;

            if !templates.contains_key(&entry.template_id) {
                let loaded = bounded(
                    "template.find_by_id",
                    timeout,
                    self.templates.find_by_id(&entry.template_id),
                )
                .await??;
                templates.insert(entry.template_id.clone(), loaded);
            }
            let Some(Some(template)) = templates.get(&entry.template_id) else {
                stats.skipped += 1;
                continue;
            };

            let rules = &template.config.price_rules;
            if !rules.mode.roles().contains(&price_role) {
                stats.skipped += 1;
                continue;
            }
            let Some(value) =
                compute_role_from_raw(entry.raw_price1, entry.raw_price2, rules, price_role)
            else {
                stats.skipped += 1;
                continue;
            };

            let prices = match price_role {
                PriceRole::Purchase => ComputedPrices {
                    purchase: Some(value),
                    retail: None,
                },
                PriceRole::Retail => ComputedPrices {
                    purchase: None,
                    retail: Some(value),
                },
            };
            let update = PriceUpdate {
                prices,
                raw_price1: entry.raw_price1,
                raw_price2: entry.raw_price2,
                template_id: Some(entry.template_id.clone()),
            };

            match bounded(
                "catalog.update_prices",
                timeout,
                self.catalog.update_prices(&entry.product_id, &update),
            )
            .await
            {
                Ok(Ok(true)) => stats.updated += 1,
                Ok(Ok(false)) => stats.skipped += 1,
                Ok(Err(e)) => {
                    warn!(product_id = %entry.product_id, error = %e, "重算写入失败");
                    stats.failed += 1;
                }
                Err(e) => {
                    warn!(product_id = %entry.product_id, error = %e, "重算写入超时");
                    stats.failed += 1;
                }
            }
        }

        info!(
            role = %price_role,
            scanned = stats.scanned,
            updated = stats.updated,
            skipped = stats.skipped,
            failed = stats.failed,
            "按存储原价重算完成"
        );
        Ok(stats)
    }
}

fn skipped(
    row_number: usize,
    product_id: &str,
    reason: &str,
    prices: Option<ComputedPrices>,
) -> ApplyRowOutcome {
    ApplyRowOutcome {
        row_number,
        product_id: product_id.to_string(),
        status: ApplyRowStatus::Skipped,
        reason: Some(reason.to_string()),
        prices,
    }
}

fn failed(job: WriteJob, reason: String) -> ApplyRowOutcome {
    ApplyRowOutcome {
        row_number: job.row_number,
        product_id: job.product_id,
        status: ApplyRowStatus::Failed,
        reason: Some(reason),
        prices: Some(job.update.prices),
    }
}
