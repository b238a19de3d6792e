// ==========================================
// 供应商价格导入 - 单元格规范化
// ==========================================
// 职责: 价格字符串 / 名称 / 编码的纯函数清洗
// 红线: 非法价格返回 None，不报错
// ==========================================

use rust_decimal::Decimal;
use std::str::FromStr;

/// 价格字符串 → Decimal
///
/// - 去除货币符号、字母、空白（含不间断空格）
/// - 同时出现 `,` 与 `.` 时，最后出现者为小数点，另一者为千分位
/// - 仅出现一种分隔符: 出现一次视为小数点，多次视为千分位
/// - 空串 / 无数字 / 无法解析 → None
/// - 字母夹在数字之间（"1e5"）或紧贴首个数字之前（"M8 bolt"）→ None
pub fn normalize_price(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if has_embedded_letters(raw) {
        return None;
    }

    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    // 负号只允许出现在开头
    let (negative, body) = match kept.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, kept.as_str()),
    };
    if body.contains('-') {
        return None;
    }

    let last_comma = body.rfind(',');
    let last_dot = body.rfind('.');

    let canonical = match (last_comma, last_dot) {
        (Some(c), Some(d)) => {
            let (decimal_sep, group_sep) = if c > d { (',', '.') } else { ('.', ',') };
            let without_groups: String = body.chars().filter(|ch| *ch != group_sep).collect();
            if without_groups.matches(decimal_sep).count() > 1 {
                return None;
            }
            without_groups.replace(decimal_sep, ".")
        }
        (Some(_), None) => unify_single_separator(body, ','),
        (None, Some(_)) => unify_single_separator(body, '.'),
        (None, None) => body.to_string(),
    };

    let canonical = canonical.trim_end_matches('.');
    if canonical.is_empty() {
        return None;
    }

    let value = Decimal::from_str(canonical).ok()?;
    Some(if negative { -value } else { value })
}

/// 货币单位只能出现在数字外侧，且前缀需与数字隔开（"$12"、"12 грн"、"USD 12"）
fn has_embedded_letters(raw: &str) -> bool {
    let chars: Vec<char> = raw.chars().collect();
    let Some(first) = chars.iter().position(char::is_ascii_digit) else {
        return false;
    };
    let last = chars.iter().rposition(char::is_ascii_digit).unwrap_or(first);

    if first > 0 && chars[first - 1].is_alphabetic() {
        return true;
    }
    chars[first..=last].iter().any(|c| c.is_alphabetic())
}

fn unify_single_separator(body: &str, sep: char) -> String {
    if body.matches(sep).count() == 1 {
        body.replace(sep, ".")
    } else {
        body.chars().filter(|ch| *ch != sep).collect()
    }
}

/// 名称规范化: 小写、仅保留字母/数字/空白（Unicode）、合并空白、去首尾空白
pub fn normalize_text(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 已规范化文本 → 词列表（保持顺序，丢弃空词）
pub fn tokenize(normalized: &str) -> Vec<String> {
    normalized
        .split_whitespace()
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// 编码规范化: 去空白、小写，保留标点（"ABC-1" 与 "abc-1" 等价）
pub fn normalize_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// 单元格原文清洗: 不间断空格转普通空格并去首尾空白
pub fn clean_cell(raw: &str) -> String {
    raw.replace('\u{a0}', " ").trim().to_string()
}
