// ==========================================
// 供应商价格导入 - 模板存储（缓存 + 映射）
// ==========================================
// 职责:
// - 规范化行缓存: 来源文件未变且未强制刷新 → 直接返回缓存，不再解析
// - 匹配映射: 单条/批量写入 matched_products（批量为全有或全无）
// 红线: 缓存正文与来源标识一起写入，一起替换内存副本
// ==========================================

use crate::domain::matching::ConfirmedMatch;
use crate::domain::row::NormalizedRow;
use crate::domain::template::{ImportTemplate, MatchedProductsMap, NormalizedCache};
use crate::engine::timeout::{bounded, TimedOut};
use crate::importer::error::ImportError;
use crate::importer::file_parser::ParserRegistry;
use crate::repository::error::RepositoryError;
use crate::repository::file_storage::FileStorage;
use crate::repository::template_repo::TemplateRepository;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Timeout(#[from] TimedOut),

    #[error("无效输入: {0}")]
    InvalidInput(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// 缓存命中判断（内部状态，从不作为错误返回）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Fresh,
    /// 来源文件或列映射已变化，或调用方强制刷新
    Stale,
    Missing,
}

pub fn lookup_cache(
    template: &ImportTemplate,
    source_id: &str,
    source_updated_at: DateTime<Utc>,
    force_refresh: bool,
) -> CacheLookup {
    match &template.normalized_cache {
        None => CacheLookup::Missing,
        Some(_) if force_refresh => CacheLookup::Stale,
        Some(cache)
            if cache.is_fresh_for(
                source_id,
                source_updated_at,
                template.config.mapping.as_ref(),
            ) =>
        {
            CacheLookup::Fresh
        }
        Some(_) => CacheLookup::Stale,
    }
}

pub struct TemplateStore {
    parsers: Arc<ParserRegistry>,
    templates: Arc<dyn TemplateRepository>,
    io_timeout: Duration,
}

impl TemplateStore {
    pub fn new(
        parsers: Arc<ParserRegistry>,
        templates: Arc<dyn TemplateRepository>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            parsers,
            templates,
            io_timeout,
        }
    }

    /// 取规范化行；缓存新鲜时不触发解析
    #[instrument(skip(self, template, storage), fields(template_id = %template.id))]
    pub async fn get_or_refresh_normalized_rows(
        &self,
        template: &mut ImportTemplate,
        storage: &dyn FileStorage,
        source_file_id: &str,
        force_refresh: bool,
    ) -> StoreResult<Vec<NormalizedRow>> {
        let metadata = bounded("file.metadata", self.io_timeout, storage.metadata(source_file_id)).await??;

        let lookup = lookup_cache(template, source_file_id, metadata.updated_at, force_refresh);
        if lookup == CacheLookup::Fresh {
            if let Some(cache) = &template.normalized_cache {
                debug!(rows = cache.rows.len(), "规范化缓存命中");
                return Ok(cache.rows.clone());
            }
        }
        debug!(?lookup, "规范化缓存失效，重新解析");

        let mapping = template.config.mapping.as_ref().ok_or_else(|| {
            ImportError::MissingMapping(format!("template_id={}", template.id))
        })?;

        let start = Instant::now();
        let file = bounded("file.load", self.io_timeout, storage.load(source_file_id)).await??;
        let rows = self
            .parsers
            .parse(&file.metadata.file_name, &file.bytes, mapping)?;

        // 使用实际读取到的文件版本作为缓存标识
        let cache = NormalizedCache {
            source_id: source_file_id.to_string(),
            source_updated_at: file.metadata.updated_at,
            rows,
            parsed_at: Utc::now(),
            mapping: Some(mapping.clone()),
        };
        bounded(
            "template.save_normalized_cache",
            self.io_timeout,
            self.templates.save_normalized_cache(&template.id, &cache),
        )
        .await??;

        let rows = cache.rows.clone();
        template.normalized_cache = Some(cache);
        info!(
            rows = rows.len(),
            file = %file.metadata.file_name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "价格表解析完成并写入缓存"
        );
        Ok(rows)
    }

    /// 写入单条确认映射
    pub async fn record_confirmed_match(
        &self,
        template: &mut ImportTemplate,
        product_id: &str,
        supplier_code: &str,
    ) -> StoreResult<()> {
        check_entry(product_id, supplier_code)?;
        let mut edit = |map: &mut MatchedProductsMap| map.upsert(product_id.trim(), supplier_code);
        self.edit_map(template, &mut edit).await
    }

    /// 删除某编码的映射（人工解绑）；返回原映射商品
    pub async fn remove_confirmed_match(
        &self,
        template: &mut ImportTemplate,
        supplier_code: &str,
    ) -> StoreResult<Option<String>> {
        let mut removed = None;
        let mut edit = |map: &mut MatchedProductsMap| removed = map.remove_code(supplier_code);
        self.edit_map(template, &mut edit).await?;
        Ok(removed)
    }

    /// 批量确认: 全部校验通过后一次写入，任何失败都不改变已存储的映射
    pub async fn confirm_all(
        &self,
        template: &mut ImportTemplate,
        matches: &[ConfirmedMatch],
    ) -> StoreResult<usize> {
        for m in matches {
            check_entry(&m.product_id, &m.row_code)?;
        }
        let mut edit = |map: &mut MatchedProductsMap| {
            for m in matches {
                map.upsert(m.product_id.trim(), &m.row_code);
            }
        };
        self.edit_map(template, &mut edit).await?;
        Ok(matches.len())
    }

    /// 在存储中的最新映射上修改（不覆盖并发写入的其他条目），成功后刷新内存副本
    async fn edit_map(
        &self,
        template: &mut ImportTemplate,
        edit: &mut (dyn for<'m> FnMut(&'m mut MatchedProductsMap) + Send),
    ) -> StoreResult<()> {
        let next = bounded(
            "template.update_matched_products",
            self.io_timeout,
            self.templates.update_matched_products(&template.id, edit),
        )
        .await??;
        debug!(template_id = %template.id, entries = next.len(), "匹配映射已保存");
        template.matched_products = next;
        Ok(())
    }
}

fn check_entry(product_id: &str, supplier_code: &str) -> StoreResult<()> {
    if product_id.trim().is_empty() {
        return Err(StoreError::InvalidInput("product_id 不能为空".to_string()));
    }
    if supplier_code.trim().is_empty() {
        return Err(StoreError::InvalidInput(format!(
            "商品 {} 的供应商编码为空，无法记录映射",
            product_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::template::{ColumnMapping, TemplateConfig};

    #[test]
    fn test_lookup_cache_states() {
        let stamp = Utc::now();
        let mut template = ImportTemplate::new("s1", "t", TemplateConfig::default());
        assert_eq!(lookup_cache(&template, "f.csv", stamp, false), CacheLookup::Missing);

        template.normalized_cache = Some(NormalizedCache {
            source_id: "f.csv".to_string(),
            source_updated_at: stamp,
            rows: vec![],
            parsed_at: stamp,
            mapping: None,
        });
        assert_eq!(lookup_cache(&template, "f.csv", stamp, false), CacheLookup::Fresh);
        assert_eq!(lookup_cache(&template, "f.csv", stamp, true), CacheLookup::Stale);
        assert_eq!(lookup_cache(&template, "g.csv", stamp, false), CacheLookup::Stale);
        assert_eq!(
            lookup_cache(&template, "f.csv", stamp + chrono::Duration::seconds(1), false),
            CacheLookup::Stale
        );
    }

    #[test]
    fn test_lookup_cache_stale_after_mapping_change() {
        let stamp = Utc::now();
        let mapping = ColumnMapping {
            code_column: Some("A".to_string()),
            price1_column: Some("C".to_string()),
            ..Default::default()
        };
        let mut template = ImportTemplate::new(
            "s1",
            "t",
            TemplateConfig {
                mapping: Some(mapping.clone()),
                ..Default::default()
            },
        );
        template.normalized_cache = Some(NormalizedCache {
            source_id: "f.csv".to_string(),
            source_updated_at: stamp,
            rows: vec![],
            parsed_at: stamp,
            mapping: Some(mapping),
        });
        assert_eq!(lookup_cache(&template, "f.csv", stamp, false), CacheLookup::Fresh);

        if let Some(mapping) = template.config.mapping.as_mut() {
            mapping.start_row = 3;
        }
        assert_eq!(lookup_cache(&template, "f.csv", stamp, false), CacheLookup::Stale);
    }

    #[test]
    fn test_check_entry_rejects_blank_inputs() {
        assert!(check_entry("", "A1").is_err());
        assert!(check_entry("p1", "  ").is_err());
        assert!(check_entry("p1", "A1").is_ok());
    }
}
