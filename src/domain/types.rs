// ==========================================
// 供应商价格导入 - 领域类型定义
// ==========================================
// 职责: 匹配置信度 / 匹配方式 / 价格规则枚举
// 序列化格式: 与模板 JSON 配置保持一致
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 匹配置信度 (Confidence)
// ==========================================
// 等级制: 决定能否自动应用或需人工确认
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Low => write!(f, "low"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::High => write!(f, "high"),
        }
    }
}

// ==========================================
// 匹配方式 (Match Method)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMethod {
    PriorMapping, // 历史映射
    ExactCode,    // 编码精确匹配
    FuzzyName,    // 名称分词逐级匹配
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::PriorMapping => "prior-mapping",
            MatchMethod::ExactCode => "exact-code",
            MatchMethod::FuzzyName => "fuzzy-name",
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 价格模式 (Price Mode)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PriceMode {
    SinglePurchase, // 仅进价
    SingleRetail,   // 仅零售价
    #[default]
    Dual,           // 进价 + 零售价
}

impl PriceMode {
    /// 该模式下需要计算的价格角色
    pub fn roles(&self) -> &'static [PriceRole] {
        match self {
            PriceMode::SinglePurchase => &[PriceRole::Purchase],
            PriceMode::SingleRetail => &[PriceRole::Retail],
            PriceMode::Dual => &[PriceRole::Purchase, PriceRole::Retail],
        }
    }
}

// ==========================================
// 价格角色 (Price Role)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceRole {
    Purchase,
    Retail,
}

impl fmt::Display for PriceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceRole::Purchase => write!(f, "purchase"),
            PriceRole::Retail => write!(f, "retail"),
        }
    }
}

// ==========================================
// 原始价格列 (Price Slot)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSlot {
    Price1,
    Price2,
}

// ==========================================
// 调价方式 (Modifier Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModifierKind {
    #[default]
    Percentage,
    Fixed,
}

// ==========================================
// 文件格式 (Source Format)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    DelimitedText,
    Spreadsheet,
    ImageOrPdf,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::DelimitedText => write!(f, "delimited_text"),
            SourceFormat::Spreadsheet => write!(f, "spreadsheet"),
            SourceFormat::ImageOrPdf => write!(f, "image_or_pdf"),
        }
    }
}
