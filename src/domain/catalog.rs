// ==========================================
// 供应商价格导入 - 目录商品（外部实体）
// ==========================================
// 红线: 本系统不拥有商品实体，只读取候选并回写价格
// ==========================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub variant_names: Vec<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    pub purchase_price: Option<Decimal>,
    pub retail_price: Option<Decimal>,
}

/// 计算后的价格（None = 不修改该字段）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedPrices {
    pub purchase: Option<Decimal>,
    pub retail: Option<Decimal>,
}

impl ComputedPrices {
    pub fn is_empty(&self) -> bool {
        self.purchase.is_none() && self.retail.is_none()
    }
}

/// 写入目录的价格更新（附带原始供应商价格，供重算使用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub prices: ComputedPrices,
    pub raw_price1: Option<Decimal>,
    pub raw_price2: Option<Decimal>,
    /// 产生本次价格的模板
    pub template_id: Option<String>,
}

/// 已存储的原始供应商价格
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRawPrices {
    pub product_id: String,
    pub template_id: String,
    pub raw_price1: Option<Decimal>,
    pub raw_price2: Option<Decimal>,
    pub updated_at: Option<DateTime<Utc>>,
}
