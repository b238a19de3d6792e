// ==========================================
// 供应商价格导入 - API 层
// ==========================================
// 职责: 对外业务接口（解析 / 匹配 / 应用 / 重算）
// ==========================================

pub mod error;
pub mod price_update_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult, ErrorKind, ErrorPayload};
pub use price_update_api::{MatchPreview, PreviewWarning, PriceUpdateApi};
