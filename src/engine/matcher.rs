// ==========================================
// 供应商价格导入 - 匹配引擎
// ==========================================
// 职责: 按优先级依次尝试匹配策略（责任链），首个命中即返回
// 策略: 历史映射 > 编码精确 > 名称分词逐级
// 红线: 每个策略无状态，可单独测试
// ==========================================

mod exact_code;
mod fuzzy_name;
mod prior_mapping;


pub use exact_code::ExactCodeMatcher;
pub use fuzzy_name::FuzzyNameMatcher;
pub use prior_mapping::PriorMappingMatcher;

use crate::domain::catalog::CatalogItem;
use crate::domain::matching::{MatchOutcome, MatchResult, RowMatch};
use crate::domain::row::NormalizedRow;
use crate::domain::template::MatchedProductsMap;
use crate::domain::types::MatchMethod;
use crate::importer::normalizer::{normalize_code, normalize_text, tokenize};
use std::collections::HashMap;
use tracing::{debug, info};

/// 默认最大升级层级（n-gram 长度 = 层级 + 1）
pub const DEFAULT_MAX_ESCALATION_LEVEL: usize = 6;

// ==========================================
// MatchStrategy Trait
// ==========================================
pub trait MatchStrategy: Send + Sync {
    fn method(&self) -> MatchMethod;

    /// 数值越大越先执行
    fn priority(&self) -> i32;

    fn match_row(&self, row: &NormalizedRow, ctx: &MatchContext<'_>) -> Option<MatchResult>;
}

/// 单次匹配所需的上下文
pub struct MatchContext<'a> {
    pub candidates: &'a CandidateIndex,
    pub prior_map: &'a MatchedProductsMap,
    pub supplier_id: &'a str,
}

// ==========================================
// CandidateIndex - 候选商品预处理
// ==========================================
// 编码与名称分词只在每轮匹配开始时计算一次
pub struct CandidateIndex {
    items: Vec<CatalogItem>,
    by_code: HashMap<String, usize>,
    names: Vec<NameEntry>,
}

/// 候选名称（主名称或变体名称）的分词结果
#[derive(Debug, Clone)]
pub struct NameEntry {
    pub item_index: usize,
    pub tokens: Vec<String>,
}

impl CandidateIndex {
    pub fn build(items: Vec<CatalogItem>) -> Self {
        let mut by_code = HashMap::new();
        let mut names = Vec::new();

        for (index, item) in items.iter().enumerate() {
            if let Some(code) = item.code.as_deref() {
                let key = normalize_code(code);
                if !key.is_empty() {
                    by_code.entry(key).or_insert(index);
                }
            }

            for name in std::iter::once(&item.name).chain(item.variant_names.iter()) {
                let tokens = tokenize(&normalize_text(name));
                // 无有效词的候选直接排除
                if !tokens.is_empty() {
                    names.push(NameEntry {
                        item_index: index,
                        tokens,
                    });
                }
            }
        }

        Self {
            items,
            by_code,
            names,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, index: usize) -> &CatalogItem {
        &self.items[index]
    }

    pub fn find_by_code(&self, code: &str) -> Option<&CatalogItem> {
        let key = normalize_code(code);
        if key.is_empty() {
            return None;
        }
        self.by_code.get(&key).map(|i| &self.items[*i])
    }

    pub fn name_entries(&self) -> &[NameEntry] {
        &self.names
    }
}

// ==========================================
// MatcherChain - 责任链
// ==========================================
pub struct MatcherChain {
    strategies: Vec<Box<dyn MatchStrategy>>,
}

impl Default for MatcherChain {
    fn default() -> Self {
        Self::with_defaults(DEFAULT_MAX_ESCALATION_LEVEL)
    }
}

impl MatcherChain {
    pub fn new(mut strategies: Vec<Box<dyn MatchStrategy>>) -> Self {
        // 稳定排序: 同优先级保持注册顺序
        strategies.sort_by_key(|s| std::cmp::Reverse(s.priority()));
        Self { strategies }
    }

    pub fn with_defaults(max_escalation_level: usize) -> Self {
        Self::new(vec![
            Box::new(PriorMappingMatcher),
            Box::new(ExactCodeMatcher),
            Box::new(FuzzyNameMatcher::new(max_escalation_level)),
        ])
    }

    pub fn methods(&self) -> Vec<MatchMethod> {
        self.strategies.iter().map(|s| s.method()).collect()
    }

    /// 单行匹配: 首个非空结果即返回
    pub fn match_row(&self, row: &NormalizedRow, ctx: &MatchContext<'_>) -> Option<MatchResult> {
        self.strategies.iter().find_map(|strategy| {
            let result = strategy.match_row(row, ctx);
            if let Some(r) = &result {
                debug!(
                    row_number = row.row_number,
                    method = %r.method,
                    product_id = %r.product_id,
                    confidence = %r.confidence,
                    "行匹配命中"
                );
            }
            result
        })
    }

    /// 批量匹配
    pub fn match_all(
        &self,
        rows: &[NormalizedRow],
        candidates: Vec<CatalogItem>,
        prior_map: &MatchedProductsMap,
        supplier_id: &str,
    ) -> MatchOutcome {
        let index = CandidateIndex::build(candidates);
        let ctx = MatchContext {
            candidates: &index,
            prior_map,
            supplier_id,
        };

        let mut outcome = MatchOutcome::default();
        for row in rows {
            match self.match_row(row, &ctx) {
                Some(result) => {
                    outcome.stats.record_match(&result);
                    outcome.matched.push(RowMatch {
                        row: row.clone(),
                        result,
                    });
                }
                None => {
                    outcome.stats.record_unmatched();
                    outcome.unmatched.push(row.clone());
                }
            }
        }

        info!(
            supplier_id = %supplier_id,
            candidates = index.len(),
            total = outcome.stats.total,
            matched = outcome.stats.matched,
            unmatched = outcome.stats.unmatched,
            ambiguous = outcome.stats.ambiguous,
            "批量匹配完成"
        );
        outcome
    }
}
