// ==========================================
// 供应商价格导入 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 模板持久化 / 目录商品读写 / 源文件读取
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod catalog_repo;
pub mod error;
pub mod file_storage;
pub mod template_repo;

// 重导出核心仓储
pub use catalog_repo::{CatalogRepository, SqliteCatalogRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use file_storage::{FileMetadata, FileStorage, LocalFileStorage, StoredFile};
pub use template_repo::{SqliteTemplateRepository, TemplateRepository};
