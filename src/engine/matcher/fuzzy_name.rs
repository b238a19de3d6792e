// ==========================================
// 名称分词逐级匹配
// ==========================================
// 层级 L 使用长度 L+1 的连续词组（n-gram），
// 在去空格的行名称中查找子串命中数。
// 最高命中唯一 → 返回；并列 → 仅在并列者中升级到 L+1；
// 无法继续升级 → 返回首个并列者，标记 ambiguous
// ==========================================

use super::{MatchContext, MatchStrategy, NameEntry};
use crate::domain::matching::{MatchDiagnostics, MatchResult};
use crate::domain::row::NormalizedRow;
use crate::domain::types::{Confidence, MatchMethod};
use crate::importer::normalizer::normalize_text;
use tracing::trace;

pub struct FuzzyNameMatcher {
    max_level: usize,
}

impl FuzzyNameMatcher {
    pub fn new(max_level: usize) -> Self {
        Self { max_level }
    }

    pub fn max_level(&self) -> usize {
        self.max_level
    }
}

impl Default for FuzzyNameMatcher {
    fn default() -> Self {
        Self::new(super::DEFAULT_MAX_ESCALATION_LEVEL)
    }
}

/// 统计 tokens 的 (level+1)-gram 中有多少出现在 haystack 里
fn count_ngram_hits(tokens: &[String], level: usize, haystack: &str) -> usize {
    let n = level + 1;
    if tokens.len() < n {
        return 0;
    }
    tokens
        .windows(n)
        .filter(|window| haystack.contains(window.concat().as_str()))
        .count()
}

/// 唯一命中的置信度: 按候选 n-gram 覆盖率分档
fn grade(hits: usize, level: usize, token_count: usize) -> (Confidence, f64) {
    let total = token_count.saturating_sub(level).max(1);
    let coverage = hits as f64 / total as f64;
    let confidence = if coverage >= 1.0 && hits * (level + 1) >= 2 {
        Confidence::High
    } else if coverage >= 0.5 {
        Confidence::Medium
    } else {
        Confidence::Low
    };
    (confidence, coverage)
}

impl MatchStrategy for FuzzyNameMatcher {
    fn method(&self) -> MatchMethod {
        MatchMethod::FuzzyName
    }

    fn priority(&self) -> i32 {
        100
    }

    fn match_row(&self, row: &NormalizedRow, ctx: &MatchContext<'_>) -> Option<MatchResult> {
        let normalized = normalize_text(&row.name);
        let haystack: String = normalized.split_whitespace().collect();
        if haystack.is_empty() {
            return None;
        }

        let mut tied: Vec<&NameEntry> = ctx.candidates.name_entries().iter().collect();
        let mut level = 0usize;
        // 上一层的并列者，用于本层全部未命中时回退
        let mut previous: Option<(Vec<&NameEntry>, usize, usize)> = None;

        loop {
            let scored: Vec<(&NameEntry, usize)> = tied
                .iter()
                .map(|entry| (*entry, count_ngram_hits(&entry.tokens, level, &haystack)))
                .collect();
            let best = scored.iter().map(|(_, hits)| *hits).max().unwrap_or(0);

            if best == 0 {
                return previous.map(|(entries, hits, lvl)| ambiguous_result(ctx, &entries, hits, lvl));
            }

            let winners: Vec<&NameEntry> = scored
                .into_iter()
                .filter(|(_, hits)| *hits == best)
                .map(|(entry, _)| entry)
                .collect();

            let first_item = winners[0].item_index;
            if winners.iter().all(|e| e.item_index == first_item) {
                // 同一商品的主名称与变体名称同时命中时取覆盖率最高者
                let token_count = winners
                    .iter()
                    .map(|e| e.tokens.len())
                    .min()
                    .unwrap_or(level + 1);
                let (confidence, coverage) = grade(best, level, token_count);
                let item = ctx.candidates.item(first_item);
                trace!(row_number = row.row_number, level, hits = best, product_id = %item.id, "名称唯一命中");

                let mut result = MatchResult::new(&item.id, confidence, MatchMethod::FuzzyName);
                result.diagnostics = MatchDiagnostics {
                    level: Some(level),
                    matched_ngrams: Some(best),
                    coverage: Some(coverage),
                    tied_products: vec![],
                };
                return Some(result);
            }

            let can_escalate =
                level < self.max_level && winners.iter().any(|e| e.tokens.len() > level + 1);
            if !can_escalate {
                return Some(ambiguous_result(ctx, &winners, best, level));
            }

            trace!(row_number = row.row_number, level, tied = winners.len(), "名称并列，升级层级");
            previous = Some((winners.clone(), best, level));
            tied = winners;
            level += 1;
        }
    }
}

fn ambiguous_result(
    ctx: &MatchContext<'_>,
    entries: &[&NameEntry],
    hits: usize,
    level: usize,
) -> MatchResult {
    let mut tied_products: Vec<String> = Vec::new();
    for entry in entries {
        let id = &ctx.candidates.item(entry.item_index).id;
        if !tied_products.contains(id) {
            tied_products.push(id.clone());
        }
    }

    let first = ctx.candidates.item(entries[0].item_index);
    let mut result = MatchResult::new(&first.id, Confidence::Low, MatchMethod::FuzzyName);
    result.ambiguous = true;
    result.diagnostics = MatchDiagnostics {
        level: Some(level),
        matched_ngrams: Some(hits),
        coverage: None,
        tied_products,
    };
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::CatalogItem;
    use crate::domain::template::MatchedProductsMap;
    use crate::engine::matcher::CandidateIndex;

    fn item(id: &str, name: &str) -> CatalogItem {
        CatalogItem {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn row(name: &str) -> NormalizedRow {
        NormalizedRow {
            row_number: 2,
            code: String::new(),
            name: name.to_string(),
            price1: None,
            price2: None,
            extra: Default::default(),
            diagnostics: vec![],
        }
    }

    fn run(items: Vec<CatalogItem>, name: &str) -> Option<MatchResult> {
        let index = CandidateIndex::build(items);
        let map = MatchedProductsMap::default();
        let ctx = MatchContext {
            candidates: &index,
            prior_map: &map,
            supplier_id: "s1",
        };
        FuzzyNameMatcher::default().match_row(&row(name), &ctx)
    }

    #[test]
    fn test_ngram_hits_on_spaceless_haystack() {
        let tokens: Vec<String> = ["hex", "bolt", "m8"].iter().map(|s| s.to_string()).collect();
        assert_eq!(count_ngram_hits(&tokens, 0, "steelhexboltm8"), 3);
        assert_eq!(count_ngram_hits(&tokens, 1, "steelhexboltm8"), 2);
        assert_eq!(count_ngram_hits(&tokens, 2, "steelhexboltm8"), 1);
        assert_eq!(count_ngram_hits(&tokens, 3, "steelhexboltm8"), 0);
    }

    #[test]
    fn test_unique_best_at_level_zero() {
        let result = run(
            vec![item("p1", "Steel Hex Bolt M8"), item("p2", "Steel Hex Bolt M10")],
            "steel hex bolt m8",
        )
        .unwrap();
        assert_eq!(result.product_id, "p1");
        assert_eq!(result.confidence, Confidence::High);
        assert!(!result.ambiguous);
        assert_eq!(result.diagnostics.level, Some(0));
    }

    #[test]
    fn test_tie_resolved_by_escalation() {
        // 单词层级两者都命中 3 个，二元组层级只有 p1 命中
        let result = run(
            vec![item("p2", "Bolt Hex M8"), item("p1", "Hex Bolt M8")],
            "hex bolt m8 zinc",
        )
        .unwrap();
        assert_eq!(result.product_id, "p1");
        assert_eq!(result.diagnostics.level, Some(1));
        assert!(!result.ambiguous);
    }

    #[test]
    fn test_unresolvable_tie_is_ambiguous_low() {
        let result = run(vec![item("p1", "Washer"), item("p2", "washer")], "washer m8").unwrap();
        assert_eq!(result.product_id, "p1");
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.ambiguous);
        assert_eq!(result.diagnostics.tied_products, vec!["p1".to_string(), "p2".to_string()]);
    }

    #[test]
    fn test_tie_with_no_hits_after_escalation_falls_back() {
        // 两者单词层级都命中 2 个，二元组层级都为 0
        let result = run(
            vec![item("p1", "Nut M8 Brass"), item("p2", "Nut M8 Steel")],
            "m8 nut",
        )
        .unwrap();
        assert!(result.ambiguous);
        assert_eq!(result.diagnostics.level, Some(0));
        assert_eq!(result.product_id, "p1");
    }

    #[test]
    fn test_empty_names_are_never_returned() {
        assert!(run(vec![item("p1", "   "), item("p2", "!!!")], "anything").is_none());
        assert!(run(vec![item("p1", "Bolt")], "").is_none());
    }

    #[test]
    fn test_variant_name_matches() {
        let mut with_variant = item("p1", "Crosshead Screw");
        with_variant.variant_names = vec!["Шуруп оцинкований".to_string()];
        let result = run(vec![with_variant, item("p2", "Nail")], "Шуруп оцинкований 4x40").unwrap();
        assert_eq!(result.product_id, "p1");
    }

    #[test]
    fn test_partial_coverage_grades_lower() {
        let result = run(
            vec![item("p1", "Copper Pipe Fitting Elbow"), item("p2", "Nail")],
            "copper tube",
        )
        .unwrap();
        assert_eq!(result.product_id, "p1");
        assert_eq!(result.confidence, Confidence::Low);
    }
}
