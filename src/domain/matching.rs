// ==========================================
// 供应商价格导入 - 匹配与应用结果
// ==========================================
// MatchResult 每次匹配重新生成，不直接持久化
// 只有确认过的子集写入 matched_products
// ==========================================

use crate::domain::catalog::ComputedPrices;
use crate::domain::row::NormalizedRow;
use crate::domain::types::{Confidence, MatchMethod};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub product_id: String,
    pub confidence: Confidence,
    pub method: MatchMethod,
    /// 多个候选并列且无法继续升级，需人工确认
    #[serde(default)]
    pub ambiguous: bool,
    #[serde(default)]
    pub diagnostics: MatchDiagnostics,
}

impl MatchResult {
    pub fn new(product_id: &str, confidence: Confidence, method: MatchMethod) -> Self {
        Self {
            product_id: product_id.to_string(),
            confidence,
            method,
            ambiguous: false,
            diagnostics: MatchDiagnostics::default(),
        }
    }

    /// 可否无需人工确认直接应用
    pub fn is_auto_applicable(&self) -> bool {
        !self.ambiguous && self.confidence == Confidence::High
    }
}

/// 策略相关的诊断信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchDiagnostics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_ngrams: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tied_products: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowMatch {
    pub row: NormalizedRow,
    pub result: MatchResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub ambiguous: usize,
    pub by_confidence: BTreeMap<Confidence, usize>,
    pub by_method: BTreeMap<MatchMethod, usize>,
}

impl MatchStats {
    pub fn record_match(&mut self, result: &MatchResult) {
        self.total += 1;
        self.matched += 1;
        if result.ambiguous {
            self.ambiguous += 1;
        }
        *self.by_confidence.entry(result.confidence).or_insert(0) += 1;
        *self.by_method.entry(result.method).or_insert(0) += 1;
    }

    pub fn record_unmatched(&mut self) {
        self.total += 1;
        self.unmatched += 1;
    }

    pub fn confidence_count(&self, confidence: Confidence) -> usize {
        self.by_confidence.get(&confidence).copied().unwrap_or(0)
    }

    pub fn method_count(&self, method: MatchMethod) -> usize {
        self.by_method.get(&method).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub matched: Vec<RowMatch>,
    pub unmatched: Vec<NormalizedRow>,
    pub stats: MatchStats,
}

// ==========================================
// 应用（写价）相关
// ==========================================

/// 调用方确认的匹配
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedMatch {
    pub row_number: usize,
    pub row_code: String,
    pub product_id: String,
    /// 是否写入持久化匹配映射
    #[serde(default)]
    pub persist_mapping: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyRowStatus {
    Updated,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyRowOutcome {
    pub row_number: usize,
    pub product_id: String,
    pub status: ApplyRowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prices: Option<ComputedPrices>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyStats {
    pub attempted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub mappings_saved: usize,
    pub outcomes: Vec<ApplyRowOutcome>,
}

impl ApplyStats {
    pub fn push(&mut self, outcome: ApplyRowOutcome) {
        self.attempted += 1;
        match outcome.status {
            ApplyRowStatus::Updated => self.updated += 1,
            ApplyRowStatus::Skipped => self.skipped += 1,
            ApplyRowStatus::Failed => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalcStats {
    pub scanned: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}
