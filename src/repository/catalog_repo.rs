// ==========================================
// 供应商价格导入 - 目录商品 Repository
// ==========================================
// 职责: 候选商品查询 + 价格字段回写
// 红线: 本系统不创建/删除商品，只改价格相关列
// 存储: 价格以 TEXT 保存（Decimal 字符串），避免浮点误差
// ==========================================

use crate::domain::catalog::{CatalogItem, PriceUpdate, StoredRawPrices};
use crate::domain::template::CatalogFilter;
use crate::perf::PerfGuard;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// CatalogRepository Trait
// ==========================================
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// 按模板过滤条件取候选商品（空条件 = 全部）
    async fn find_candidates(&self, filter: &CatalogFilter) -> RepositoryResult<Vec<CatalogItem>>;

    async fn find_by_id(&self, item_id: &str) -> RepositoryResult<Option<CatalogItem>>;

    /// 写入价格；商品不存在时返回 Ok(false)
    ///
    /// 价格为 None 的角色保持原值不变
    async fn update_prices(&self, item_id: &str, update: &PriceUpdate) -> RepositoryResult<bool>;

    /// 列出带有已存储原始价格的商品（重算路径）
    async fn list_stored_raw_prices(&self, limit: usize) -> RepositoryResult<Vec<StoredRawPrices>>;
}

// ==========================================
// SqliteCatalogRepository
// ==========================================
pub struct SqliteCatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

fn decimal_to_sql(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.to_string())
}

fn parse_decimal(field: &str, raw: Option<String>) -> RepositoryResult<Option<Decimal>> {
    raw.map(|s| {
        Decimal::from_str(s.trim()).map_err(|e| RepositoryError::FieldValueError {
            field: field.to_string(),
            message: format!("{}: {}", s, e),
        })
    })
    .transpose()
}

struct CatalogRow {
    item_id: String,
    name: String,
    code: Option<String>,
    variant_names_json: String,
    category_id: Option<String>,
    item_type: Option<String>,
    brand: Option<String>,
    purchase_price: Option<String>,
    retail_price: Option<String>,
}

const SELECT_COLUMNS: &str = r#"
    SELECT item_id, name, code, variant_names_json, category_id, item_type, brand,
           purchase_price, retail_price
    FROM catalog_item
"#;

impl CatalogRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            item_id: row.get(0)?,
            name: row.get(1)?,
            code: row.get(2)?,
            variant_names_json: row.get(3)?,
            category_id: row.get(4)?,
            item_type: row.get(5)?,
            brand: row.get(6)?,
            purchase_price: row.get(7)?,
            retail_price: row.get(8)?,
        })
    }

    fn into_item(self) -> RepositoryResult<CatalogItem> {
        Ok(CatalogItem {
            variant_names: serde_json::from_str(&self.variant_names_json)?,
            purchase_price: parse_decimal("purchase_price", self.purchase_price)?,
            retail_price: parse_decimal("retail_price", self.retail_price)?,
            id: self.item_id,
            name: self.name,
            code: self.code,
            category_id: self.category_id,
            item_type: self.item_type,
            brand: self.brand,
        })
    }
}

/// 追加 `column IN (?, ?, ...)` 条件
fn push_in_clause(clauses: &mut Vec<String>, values: &mut Vec<Value>, column: &str, wanted: &[String]) {
    if wanted.is_empty() {
        return;
    }
    let placeholders = vec!["?"; wanted.len()].join(", ");
    clauses.push(format!("{} IN ({})", column, placeholders));
    values.extend(wanted.iter().map(|v| Value::Text(v.clone())));
}

impl SqliteCatalogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入或替换商品（目录维护/测试数据准备）
    pub fn upsert_item(&self, item: &CatalogItem) -> RepositoryResult<()> {
        let variants = serde_json::to_string(&item.variant_names)?;
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO catalog_item (
                item_id, name, code, variant_names_json, category_id, item_type, brand,
                purchase_price, retail_price
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(item_id) DO UPDATE SET
                name = excluded.name,
                code = excluded.code,
                variant_names_json = excluded.variant_names_json,
                category_id = excluded.category_id,
                item_type = excluded.item_type,
                brand = excluded.brand,
                purchase_price = excluded.purchase_price,
                retail_price = excluded.retail_price
            "#,
            params![
                item.id,
                item.name,
                item.code,
                variants,
                item.category_id,
                item.item_type,
                item.brand,
                decimal_to_sql(item.purchase_price),
                decimal_to_sql(item.retail_price),
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn find_candidates(&self, filter: &CatalogFilter) -> RepositoryResult<Vec<CatalogItem>> {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        push_in_clause(&mut clauses, &mut values, "category_id", &filter.category_ids);
        push_in_clause(&mut clauses, &mut values, "item_type", &filter.item_types);
        push_in_clause(&mut clauses, &mut values, "brand", &filter.brands);

        let mut sql = SELECT_COLUMNS.to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY item_id");

        let rows = {
            let conn = self.get_conn()?;
            let _perf = PerfGuard::new("sqlite.catalog.find_candidates");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), CatalogRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        rows.into_iter().map(CatalogRow::into_item).collect()
    }

    async fn find_by_id(&self, item_id: &str) -> RepositoryResult<Option<CatalogItem>> {
        let raw = {
            let conn = self.get_conn()?;
            conn.query_row(
                &format!("{} WHERE item_id = ?1", SELECT_COLUMNS),
                params![item_id],
                CatalogRow::from_row,
            )
            .optional()?
        };
        raw.map(CatalogRow::into_item).transpose()
    }

    async fn update_prices(&self, item_id: &str, update: &PriceUpdate) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let _perf = PerfGuard::new("sqlite.catalog.update_prices");
        let affected = conn.execute(
            r#"
            UPDATE catalog_item
            SET purchase_price = COALESCE(?1, purchase_price),
                retail_price = COALESCE(?2, retail_price),
                raw_price1 = ?3,
                raw_price2 = ?4,
                price_template_id = COALESCE(?5, price_template_id),
                price_updated_at = ?6
            WHERE item_id = ?7
            "#,
            params![
                decimal_to_sql(update.prices.purchase),
                decimal_to_sql(update.prices.retail),
                decimal_to_sql(update.raw_price1),
                decimal_to_sql(update.raw_price2),
                update.template_id,
                Utc::now(),
                item_id,
            ],
        )?;
        Ok(affected > 0)
    }

    async fn list_stored_raw_prices(&self, limit: usize) -> RepositoryResult<Vec<StoredRawPrices>> {
        type RawRow = (String, String, Option<String>, Option<String>, Option<DateTime<Utc>>);

        let rows: Vec<RawRow> = {
            let conn = self.get_conn()?;
            let _perf = PerfGuard::new("sqlite.catalog.list_stored_raw_prices");
            let mut stmt = conn.prepare(
                r#"
                SELECT item_id, price_template_id, raw_price1, raw_price2, price_updated_at
                FROM catalog_item
                WHERE price_template_id IS NOT NULL
                  AND (raw_price1 IS NOT NULL OR raw_price2 IS NOT NULL)
                ORDER BY item_id
                LIMIT ?1
                "#,
            )?;
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let rows = stmt
                .query_map(params![limit], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        rows.into_iter()
            .map(|(product_id, template_id, raw1, raw2, updated_at)| {
                Ok(StoredRawPrices {
                    product_id,
                    template_id,
                    raw_price1: parse_decimal("raw_price1", raw1)?,
                    raw_price2: parse_decimal("raw_price2", raw2)?,
                    updated_at,
                })
            })
            .collect()
    }
}
