use super::{MatchContext, MatchStrategy};
use crate::domain::matching::MatchResult;
use crate::domain::row::NormalizedRow;
use crate::domain::types::{Confidence, MatchMethod};

/// 历史映射匹配: 人工确认过的 编码 → 商品 优先于任何计算策略
pub struct PriorMappingMatcher;

impl MatchStrategy for PriorMappingMatcher {
    fn method(&self) -> MatchMethod {
        MatchMethod::PriorMapping
    }

    fn priority(&self) -> i32 {
        300
    }

    fn match_row(&self, row: &NormalizedRow, ctx: &MatchContext<'_>) -> Option<MatchResult> {
        if !row.has_code() {
            return None;
        }
        ctx.prior_map
            .find_product_by_code(&row.code)
            .map(|product_id| MatchResult::new(product_id, Confidence::High, MatchMethod::PriorMapping))
    }
}
