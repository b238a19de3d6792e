// ==========================================
// 供应商价格导入 - 导入模板 Repository
// ==========================================
// 职责: import_template 表 CRUD
// 红线: Repository 不含业务规则，只做数据读写
// 约束: 规范化缓存（正文 + 来源标识）单条 UPDATE 写入
// ==========================================

use crate::domain::template::{ImportTemplate, MatchedProductsMap, NormalizedCache, TemplateConfig};
use crate::perf::PerfGuard;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// TemplateRepository Trait
// ==========================================
// 实现者: SqliteTemplateRepository（rusqlite）；测试中可替换为内存实现
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn insert(&self, template: &ImportTemplate) -> RepositoryResult<()>;

    async fn find_by_id(&self, template_id: &str) -> RepositoryResult<Option<ImportTemplate>>;

    async fn list_by_supplier(&self, supplier_id: &str) -> RepositoryResult<Vec<ImportTemplate>>;

    /// 覆盖模板配置（列映射 / 过滤 / 价格规则）
    async fn update_config(&self, template_id: &str, config: &TemplateConfig) -> RepositoryResult<()>;

    /// 原子写入规范化缓存及其来源标识
    async fn save_normalized_cache(
        &self,
        template_id: &str,
        cache: &NormalizedCache,
    ) -> RepositoryResult<()>;

    /// 读取当前映射 → edit → 写回，在同一事务内完成；返回写回后的映射
    async fn update_matched_products(
        &self,
        template_id: &str,
        edit: &mut (dyn for<'m> FnMut(&'m mut MatchedProductsMap) + Send),
    ) -> RepositoryResult<MatchedProductsMap>;

    async fn mark_applied(
        &self,
        template_id: &str,
        applied_at: DateTime<Utc>,
        applied_by: &str,
    ) -> RepositoryResult<()>;
}

// ==========================================
// SqliteTemplateRepository
// ==========================================
pub struct SqliteTemplateRepository {
    conn: Arc<Mutex<Connection>>,
}

/// import_template 的原始行（JSON 列尚未解析）
struct TemplateRow {
    template_id: String,
    supplier_id: String,
    name: String,
    config_json: String,
    normalized_cache_json: Option<String>,
    matched_products_json: String,
    applied_at: Option<DateTime<Utc>>,
    applied_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const SELECT_COLUMNS: &str = r#"
    SELECT template_id, supplier_id, name, config_json, normalized_cache_json,
           matched_products_json, applied_at, applied_by, created_at, updated_at
    FROM import_template
"#;

impl TemplateRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            template_id: row.get(0)?,
            supplier_id: row.get(1)?,
            name: row.get(2)?,
            config_json: row.get(3)?,
            normalized_cache_json: row.get(4)?,
            matched_products_json: row.get(5)?,
            applied_at: row.get(6)?,
            applied_by: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_template(self) -> RepositoryResult<ImportTemplate> {
        let normalized_cache = match self.normalized_cache_json {
            Some(raw) => Some(serde_json::from_str::<NormalizedCache>(&raw)?),
            None => None,
        };
        Ok(ImportTemplate {
            id: self.template_id,
            supplier_id: self.supplier_id,
            name: self.name,
            config: serde_json::from_str(&self.config_json)?,
            normalized_cache,
            matched_products: serde_json::from_str(&self.matched_products_json)?,
            applied_at: self.applied_at,
            applied_by: self.applied_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl SqliteTemplateRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_updated(affected: usize, template_id: &str) -> RepositoryResult<()> {
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ImportTemplate".to_string(),
                id: template_id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TemplateRepository for SqliteTemplateRepository {
    async fn insert(&self, template: &ImportTemplate) -> RepositoryResult<()> {
        let config_json = serde_json::to_string(&template.config)?;
        let cache_json = template
            .normalized_cache
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let matched_json = serde_json::to_string(&template.matched_products)?;

        let conn = self.get_conn()?;
        let _perf = PerfGuard::new("sqlite.template.insert");
        conn.execute(
            r#"
            INSERT INTO import_template (
                template_id, supplier_id, name, config_json,
                normalized_cache_json, last_import_source_id, last_import_source_updated_at,
                matched_products_json, applied_at, applied_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                template.id,
                template.supplier_id,
                template.name,
                config_json,
                cache_json,
                template.last_import_source_id(),
                template.last_import_source_updated_at(),
                matched_json,
                template.applied_at,
                template.applied_by,
                template.created_at,
                template.updated_at,
            ],
        )?;
        Ok(())
    }

    async fn find_by_id(&self, template_id: &str) -> RepositoryResult<Option<ImportTemplate>> {
        let raw = {
            let conn = self.get_conn()?;
            let _perf = PerfGuard::new("sqlite.template.find_by_id");
            conn.query_row(
                &format!("{} WHERE template_id = ?1", SELECT_COLUMNS),
                params![template_id],
                TemplateRow::from_row,
            )
            .optional()?
        };
        raw.map(TemplateRow::into_template).transpose()
    }

    async fn list_by_supplier(&self, supplier_id: &str) -> RepositoryResult<Vec<ImportTemplate>> {
        let rows = {
            let conn = self.get_conn()?;
            let _perf = PerfGuard::new("sqlite.template.list_by_supplier");
            let mut stmt = conn.prepare(&format!(
                "{} WHERE supplier_id = ?1 ORDER BY created_at, template_id",
                SELECT_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![supplier_id], TemplateRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        rows.into_iter().map(TemplateRow::into_template).collect()
    }

    async fn update_config(&self, template_id: &str, config: &TemplateConfig) -> RepositoryResult<()> {
        let config_json = serde_json::to_string(config)?;
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE import_template SET config_json = ?1, updated_at = ?2 WHERE template_id = ?3",
            params![config_json, Utc::now(), template_id],
        )?;
        Self::ensure_updated(affected, template_id)
    }

    async fn save_normalized_cache(
        &self,
        template_id: &str,
        cache: &NormalizedCache,
    ) -> RepositoryResult<()> {
        let cache_json = serde_json::to_string(cache)?;
        let conn = self.get_conn()?;
        let _perf = PerfGuard::new("sqlite.template.save_normalized_cache");
        let affected = conn.execute(
            r#"
            UPDATE import_template
            SET normalized_cache_json = ?1,
                last_import_source_id = ?2,
                last_import_source_updated_at = ?3,
                updated_at = ?4
            WHERE template_id = ?5
            "#,
            params![
                cache_json,
                cache.source_id,
                cache.source_updated_at,
                Utc::now(),
                template_id
            ],
        )?;
        Self::ensure_updated(affected, template_id)
    }

    async fn update_matched_products(
        &self,
        template_id: &str,
        edit: &mut (dyn for<'m> FnMut(&'m mut MatchedProductsMap) + Send),
    ) -> RepositoryResult<MatchedProductsMap> {
        let conn = self.get_conn()?;
        let _perf = PerfGuard::new("sqlite.template.update_matched_products");
        let tx = conn.unchecked_transaction()?;

        let current: Option<String> = tx
            .query_row(
                "SELECT matched_products_json FROM import_template WHERE template_id = ?1",
                params![template_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(current) = current else {
            return Err(RepositoryError::NotFound {
                entity: "ImportTemplate".to_string(),
                id: template_id.to_string(),
            });
        };

        let mut matched_products: MatchedProductsMap = serde_json::from_str(&current)?;
        edit(&mut matched_products);

        tx.execute(
            "UPDATE import_template SET matched_products_json = ?1, updated_at = ?2 WHERE template_id = ?3",
            params![serde_json::to_string(&matched_products)?, Utc::now(), template_id],
        )?;
        tx.commit()?;
        Ok(matched_products)
    }

    async fn mark_applied(
        &self,
        template_id: &str,
        applied_at: DateTime<Utc>,
        applied_by: &str,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE import_template SET applied_at = ?1, applied_by = ?2, updated_at = ?1 WHERE template_id = ?3",
            params![applied_at, applied_by, template_id],
        )?;
        Self::ensure_updated(affected, template_id)
    }
}
