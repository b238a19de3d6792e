// ==========================================
// 供应商价格导入 - 价格计算器
// ==========================================
// 职责: 原始价格 + 调价规则 → 进价/零售价
// 红线: 舍入只在 round_price 中进行（2 位小数，四舍五入）
// ==========================================

use crate::domain::catalog::ComputedPrices;
use crate::domain::row::NormalizedRow;
use crate::domain::template::{PriceModifier, PriceRules};
use crate::domain::types::{ModifierKind, PriceRole, PriceSlot};
use rust_decimal::{Decimal, RoundingStrategy};

/// 货币最小单位精度
pub const PRICE_SCALE: u32 = 2;

/// 统一舍入: 2 位小数, half-up（远离零）；结果固定带 2 位小数（7 → 7.00）
pub fn round_price(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(PRICE_SCALE);
    rounded
}

/// 对单个原始价格应用调价（不含舍入）
pub fn apply_modifier(raw: Decimal, modifier: &PriceModifier) -> Decimal {
    match modifier.kind {
        ModifierKind::Percentage => raw * (Decimal::ONE + modifier.value / Decimal::ONE_HUNDRED),
        ModifierKind::Fixed => raw + modifier.value,
    }
}

/// 按原始价格计算某一角色的最终价格
///
/// 规则未映射该角色或原始价格缺失时返回 None
pub fn compute_role_from_raw(
    raw_price1: Option<Decimal>,
    raw_price2: Option<Decimal>,
    rules: &PriceRules,
    role: PriceRole,
) -> Option<Decimal> {
    let (slot, rule) = rules.slot_for_role(role)?;
    let raw = match slot {
        PriceSlot::Price1 => raw_price1,
        PriceSlot::Price2 => raw_price2,
    }?;
    Some(round_price(apply_modifier(raw, &rule.modifier)))
}

/// 计算一行的进价/零售价
///
/// 单一模式只计算配置的角色，另一角色保持 None（不修改目录中的值）
pub fn compute_prices(row: &NormalizedRow, rules: &PriceRules) -> ComputedPrices {
    compute_from_raw(row.price1, row.price2, rules)
}

/// 与 compute_prices 相同，但输入为已存储的原始价格（重算路径）
pub fn compute_from_raw(
    raw_price1: Option<Decimal>,
    raw_price2: Option<Decimal>,
    rules: &PriceRules,
) -> ComputedPrices {
    let mut prices = ComputedPrices::default();
    for role in rules.mode.roles() {
        let value = compute_role_from_raw(raw_price1, raw_price2, rules, *role);
        match role {
            PriceRole::Purchase => prices.purchase = value,
            PriceRole::Retail => prices.retail = value,
        }
    }
    prices
}
