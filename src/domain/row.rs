// ==========================================
// 供应商价格导入 - 行数据结构
// ==========================================
// NormalizedRow: 单元格清洗后的价格表行（匹配前）
// PreviewResult: 原始前 N 行预览
// ==========================================

use crate::domain::types::{PriceSlot, SourceFormat};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRow {
    /// 源文件中的行号（1 起始）
    pub row_number: usize,
    pub code: String,
    pub name: String,
    pub price1: Option<Decimal>,
    pub price2: Option<Decimal>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<RowDiagnostic>,
}

impl NormalizedRow {
    pub fn price(&self, slot: PriceSlot) -> Option<Decimal> {
        match slot {
            PriceSlot::Price1 => self.price1,
            PriceSlot::Price2 => self.price2,
        }
    }

    pub fn has_code(&self) -> bool {
        !self.code.trim().is_empty()
    }
}

/// 行级诊断（不中断整体解析）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowDiagnostic {
    UnparsablePrice { slot: PriceSlot, raw: String },
    MissingPrice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewResult {
    pub format: SourceFormat,
    /// 第一个非空行（通常为表头）
    pub header_guess: Vec<String>,
    pub sample_rows: Vec<PreviewRow>,
    /// 自动建议的首个数据行（1 起始）
    pub suggested_start_row: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRow {
    /// 源文件中的行号（1 起始）
    pub row_number: usize,
    pub cells: Vec<String>,
}
