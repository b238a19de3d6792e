// ==========================================
// 供应商价格导入 - 引擎层
// ==========================================
// 职责: 匹配 / 定价 / 缓存与映射 / 应用互斥
// 红线: Engine 不拼 SQL，通过 repository trait 访问数据
// ==========================================

pub mod apply_guard;
pub mod matcher;
pub mod price_calculator;
pub mod template_store;
pub mod timeout;

// 重导出核心引擎
pub use apply_guard::{ApplyGuard, ApplyPermit};
pub use matcher::{
    CandidateIndex, ExactCodeMatcher, FuzzyNameMatcher, MatchContext, MatchStrategy,
    MatcherChain, PriorMappingMatcher,
};
pub use price_calculator::{apply_modifier, compute_from_raw, compute_prices, round_price};
pub use template_store::{lookup_cache, CacheLookup, StoreError, StoreResult, TemplateStore};
pub use timeout::{bounded, TimedOut};
