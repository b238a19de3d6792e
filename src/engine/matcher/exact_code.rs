use super::{MatchContext, MatchStrategy};
use crate::domain::matching::MatchResult;
use crate::domain::row::NormalizedRow;
use crate::domain::types::{Confidence, MatchMethod};

/// 编码精确匹配: 行编码 == 商品自身编码（规范化后）
pub struct ExactCodeMatcher;

impl MatchStrategy for ExactCodeMatcher {
    fn method(&self) -> MatchMethod {
        MatchMethod::ExactCode
    }

    fn priority(&self) -> i32 {
        200
    }

    fn match_row(&self, row: &NormalizedRow, ctx: &MatchContext<'_>) -> Option<MatchResult> {
        ctx.candidates
            .find_by_code(&row.code)
            .map(|item| MatchResult::new(&item.id, Confidence::High, MatchMethod::ExactCode))
    }
}
