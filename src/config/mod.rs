// ==========================================
// 供应商价格导入 - 配置层
// ==========================================
// 职责: 导入流程参数（预览行数 / 超时 / 并发 / 匹配层级）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::{ConfigResult, ImportSettings, PriceImportConfigReader};
