// ==========================================
// 供应商价格导入 - 核心库
// ==========================================
// 流程: 读取价格表 → 规范化缓存 → 匹配目录商品 → 按规则定价 → 写入目录
// 技术栈: Rust + SQLite
// 定位: 人工确认后才写价
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 匹配 / 定价 / 缓存
pub mod engine;

// 导入层 - 价格表读取
pub mod importer;

// 配置层 - 导入参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// SQL 性能统计
pub mod perf;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    Confidence, MatchMethod, ModifierKind, PriceMode, PriceRole, PriceSlot, SourceFormat,
};

// 领域实体
pub use domain::{
    ApplyStats, CatalogItem, ColumnMapping, ConfirmedMatch, ImportTemplate, MatchResult,
    NormalizedRow, PriceRules, RecalcStats, TemplateConfig,
};

// 引擎
pub use engine::{MatcherChain, TemplateStore};

// 导入
pub use importer::{ImportError, ParserRegistry};

// API
pub use api::{ApiError, ApiResult, ErrorKind, MatchPreview, PriceUpdateApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "供应商价格导入";
