// ==========================================
// 供应商价格导入 - 导入模板
// ==========================================
// 职责: 模板配置 (列映射 / 目录过滤 / 价格规则)
//       规范化缓存 + 持久化匹配映射
// 红线: 缓存正文与来源标识必须作为一个整体读写
// ==========================================

use crate::domain::row::NormalizedRow;
use crate::domain::types::{ModifierKind, PriceMode, PriceRole, PriceSlot};
use crate::importer::normalizer::normalize_code;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// ImportTemplate - 导入模板
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportTemplate {
    pub id: String,
    pub supplier_id: String,
    pub name: String,
    pub config: TemplateConfig,

    /// 上次解析结果缓存（含来源文件标识与修改时间）
    pub normalized_cache: Option<NormalizedCache>,

    /// 持久化匹配记忆: product_id → 供应商编码
    pub matched_products: MatchedProductsMap,

    pub applied_at: Option<DateTime<Utc>>,
    pub applied_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportTemplate {
    pub fn new(supplier_id: &str, name: &str, config: TemplateConfig) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            supplier_id: supplier_id.to_string(),
            name: name.to_string(),
            config,
            normalized_cache: None,
            matched_products: MatchedProductsMap::default(),
            applied_at: None,
            applied_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn last_import_source_id(&self) -> Option<&str> {
        self.normalized_cache.as_ref().map(|c| c.source_id.as_str())
    }

    pub fn last_import_source_updated_at(&self) -> Option<DateTime<Utc>> {
        self.normalized_cache.as_ref().map(|c| c.source_updated_at)
    }
}

// ==========================================
// TemplateConfig - 模板配置
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateConfig {
    #[serde(default)]
    pub filters: CatalogFilter,
    #[serde(default)]
    pub mapping: Option<ColumnMapping>,
    #[serde(default)]
    pub price_rules: PriceRules,
}

/// 目录候选过滤条件（空列表 = 不限制）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFilter {
    #[serde(default)]
    pub category_ids: Vec<String>,
    #[serde(default)]
    pub item_types: Vec<String>,
    #[serde(default)]
    pub brands: Vec<String>,
}

impl CatalogFilter {
    pub fn is_unrestricted(&self) -> bool {
        self.category_ids.is_empty() && self.item_types.is_empty() && self.brands.is_empty()
    }
}

// ==========================================
// ColumnMapping - 列映射
// ==========================================
// 列引用: 字母 (A, AB) 或 1 起始的列号 ("3")
// start_row: 1 起始的首个数据行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    #[serde(default)]
    pub code_column: Option<String>,
    #[serde(default)]
    pub name_column: Option<String>,
    #[serde(default)]
    pub price1_column: Option<String>,
    #[serde(default)]
    pub price2_column: Option<String>,
    #[serde(default = "default_start_row")]
    pub start_row: usize,
    /// 透传字段（如 availability）: 字段名 → 列引用
    #[serde(default)]
    pub extra_columns: BTreeMap<String, String>,
}

fn default_start_row() -> usize {
    1
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            code_column: None,
            name_column: None,
            price1_column: None,
            price2_column: None,
            start_row: 1,
            extra_columns: BTreeMap::new(),
        }
    }
}

/// 解析后的列下标（0 起始）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMapping {
    pub code: Option<usize>,
    pub name: Option<usize>,
    pub price1: Option<usize>,
    pub price2: Option<usize>,
    /// 0 起始的首个数据行下标
    pub first_row_index: usize,
    pub extra: Vec<(String, usize)>,
}

impl ColumnMapping {
    /// 将列引用解析为下标
    ///
    /// # 返回
    /// - Err(reason): 编码与名称列都缺失、价格列缺失或列引用非法
    pub fn resolve(&self) -> Result<ResolvedMapping, String> {
        let code = resolve_optional("code_column", self.code_column.as_deref())?;
        let name = resolve_optional("name_column", self.name_column.as_deref())?;
        let price1 = resolve_optional("price1_column", self.price1_column.as_deref())?;
        let price2 = resolve_optional("price2_column", self.price2_column.as_deref())?;

        if code.is_none() && name.is_none() {
            return Err("未配置编码列或名称列".to_string());
        }
        if price1.is_none() && price2.is_none() {
            return Err("未配置价格列".to_string());
        }

        let mut extra = Vec::with_capacity(self.extra_columns.len());
        for (field, column) in &self.extra_columns {
            let index = column_index(column)
                .ok_or_else(|| format!("透传字段 {} 的列引用非法: {}", field, column))?;
            extra.push((field.clone(), index));
        }

        Ok(ResolvedMapping {
            code,
            name,
            price1,
            price2,
            first_row_index: self.start_row.saturating_sub(1),
            extra,
        })
    }
}

fn resolve_optional(field: &str, column: Option<&str>) -> Result<Option<usize>, String> {
    match column.map(str::trim).filter(|c| !c.is_empty()) {
        None => Ok(None),
        Some(c) => column_index(c)
            .map(Some)
            .ok_or_else(|| format!("{} 列引用非法: {}", field, c)),
    }
}

/// 列引用 → 0 起始下标
///
/// - "A" → 0, "Z" → 25, "AA" → 26
/// - "1" → 0（数字按 1 起始）
pub fn column_index(reference: &str) -> Option<usize> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    if reference.chars().all(|c| c.is_ascii_digit()) {
        let n: usize = reference.parse().ok()?;
        return n.checked_sub(1);
    }

    if !reference.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut index: usize = 0;
    for c in reference.chars() {
        let value = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index.checked_mul(26)?.checked_add(value)?;
    }
    Some(index - 1)
}

// ==========================================
// PriceRules - 价格规则
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRules {
    #[serde(default)]
    pub mode: PriceMode,
    #[serde(default = "default_price1_rule")]
    pub price1: SlotRule,
    #[serde(default = "default_price2_rule")]
    pub price2: SlotRule,
}

impl Default for PriceRules {
    fn default() -> Self {
        Self {
            mode: PriceMode::Dual,
            price1: default_price1_rule(),
            price2: default_price2_rule(),
        }
    }
}

fn default_price1_rule() -> SlotRule {
    SlotRule {
        role: PriceRole::Purchase,
        modifier: PriceModifier::default(),
    }
}

fn default_price2_rule() -> SlotRule {
    SlotRule {
        role: PriceRole::Retail,
        modifier: PriceModifier::default(),
    }
}

impl PriceRules {
    /// 查找映射到指定角色的原始价格列（price1 优先）
    pub fn slot_for_role(&self, role: PriceRole) -> Option<(PriceSlot, &SlotRule)> {
        if self.price1.role == role {
            Some((PriceSlot::Price1, &self.price1))
        } else if self.price2.role == role {
            Some((PriceSlot::Price2, &self.price2))
        } else {
            None
        }
    }
}

/// 单个原始价格列的规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRule {
    pub role: PriceRole,
    #[serde(default)]
    pub modifier: PriceModifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceModifier {
    #[serde(default)]
    pub kind: ModifierKind,
    #[serde(default)]
    pub value: Decimal,
}

// ==========================================
// NormalizedCache - 规范化结果缓存
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCache {
    pub source_id: String,
    pub source_updated_at: DateTime<Utc>,
    pub rows: Vec<NormalizedRow>,
    pub parsed_at: DateTime<Utc>,
    /// 生成这批行时使用的列映射；映射变化后缓存作废
    #[serde(default)]
    pub mapping: Option<ColumnMapping>,
}

impl NormalizedCache {
    pub fn is_fresh_for(
        &self,
        source_id: &str,
        source_updated_at: DateTime<Utc>,
        mapping: Option<&ColumnMapping>,
    ) -> bool {
        self.source_id == source_id
            && self.source_updated_at == source_updated_at
            && self.mapping.as_ref() == mapping
    }
}

// ==========================================
// MatchedProductsMap - 跨导入的匹配记忆
// ==========================================
// 约束: 同一规范化编码只指向一个商品
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchedProductsMap {
    entries: BTreeMap<String, String>,
}

impl MatchedProductsMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, product_id: &str) -> Option<&str> {
        self.entries.get(product_id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 按供应商编码反查商品
    pub fn find_product_by_code(&self, supplier_code: &str) -> Option<&str> {
        let wanted = normalize_code(supplier_code);
        if wanted.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(_, code)| normalize_code(code) == wanted)
            .map(|(product_id, _)| product_id.as_str())
    }

    /// 写入一条映射，并移除同编码的其它商品
    pub fn upsert(&mut self, product_id: &str, supplier_code: &str) {
        let wanted = normalize_code(supplier_code);
        self.entries
            .retain(|pid, code| pid == product_id || normalize_code(code) != wanted);
        self.entries
            .insert(product_id.to_string(), supplier_code.trim().to_string());
    }

    /// 删除某编码的映射，返回被删除的商品
    pub fn remove_code(&mut self, supplier_code: &str) -> Option<String> {
        let product_id = self.find_product_by_code(supplier_code)?.to_string();
        self.entries.remove(&product_id);
        Some(product_id)
    }
}
