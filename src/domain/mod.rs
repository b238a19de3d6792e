// ==========================================
// 供应商价格导入 - 领域层
// ==========================================
// 职责: 纯数据结构，不含 IO
// ==========================================

pub mod catalog;
pub mod matching;
pub mod row;
pub mod template;
pub mod types;

pub use catalog::{CatalogItem, ComputedPrices, PriceUpdate, StoredRawPrices};
pub use matching::{
    ApplyRowOutcome, ApplyRowStatus, ApplyStats, ConfirmedMatch, MatchDiagnostics, MatchOutcome,
    MatchResult, MatchStats, RecalcStats, RowMatch,
};
pub use row::{NormalizedRow, PreviewResult, PreviewRow, RowDiagnostic};
pub use template::{
    CatalogFilter, ColumnMapping, ImportTemplate, MatchedProductsMap, NormalizedCache,
    PriceModifier, PriceRules, ResolvedMapping, SlotRule, TemplateConfig,
};
pub use types::{
    Confidence, MatchMethod, ModifierKind, PriceMode, PriceRole, PriceSlot, SourceFormat,
};
