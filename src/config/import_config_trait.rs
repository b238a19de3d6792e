// ==========================================
// 供应商价格导入 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入流程所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

pub const DEFAULT_PREVIEW_ROW_LIMIT: usize = 20;
pub const DEFAULT_HEADER_SCAN_ROWS: usize = 20;
pub const DEFAULT_IO_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_APPLY_CONCURRENCY: usize = 8;
pub const DEFAULT_FUZZY_MAX_LEVEL: usize = 6;
pub const DEFAULT_RECALC_LIMIT: usize = 500;

// ==========================================
// PriceImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（config_kv 表）、ImportSettings（固定值）
#[async_trait]
pub trait PriceImportConfigReader: Send + Sync {
    /// 预览返回的最大行数
    ///
    /// # 默认值
    /// - 20
    async fn get_preview_row_limit(&self) -> ConfigResult<usize>;

    /// 无表头文件时扫描起始行的行数
    ///
    /// # 默认值
    /// - 20
    async fn get_header_scan_rows(&self) -> ConfigResult<usize>;

    /// 文件读取 / 目录查询超时（毫秒）
    ///
    /// # 默认值
    /// - 30000
    async fn get_io_timeout_ms(&self) -> ConfigResult<u64>;

    /// 应用价格时的并发写入数
    ///
    /// # 默认值
    /// - 8
    async fn get_apply_concurrency(&self) -> ConfigResult<usize>;

    /// 名称匹配最大升级层级
    ///
    /// # 默认值
    /// - 6
    async fn get_fuzzy_max_level(&self) -> ConfigResult<usize>;

    /// 重算未指定 limit 时的默认条数
    ///
    /// # 默认值
    /// - 500
    async fn get_recalc_default_limit(&self) -> ConfigResult<usize>;

    /// 一次性读取全部设置（每次 API 调用读取一次）
    async fn load_settings(&self) -> ConfigResult<ImportSettings> {
        Ok(ImportSettings {
            preview_row_limit: self.get_preview_row_limit().await?,
            header_scan_rows: self.get_header_scan_rows().await?,
            io_timeout_ms: self.get_io_timeout_ms().await?,
            apply_concurrency: self.get_apply_concurrency().await?,
            fuzzy_max_level: self.get_fuzzy_max_level().await?,
            recalc_default_limit: self.get_recalc_default_limit().await?,
        })
    }
}

// ==========================================
// ImportSettings - 设置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub preview_row_limit: usize,
    pub header_scan_rows: usize,
    pub io_timeout_ms: u64,
    pub apply_concurrency: usize,
    pub fuzzy_max_level: usize,
    pub recalc_default_limit: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            preview_row_limit: DEFAULT_PREVIEW_ROW_LIMIT,
            header_scan_rows: DEFAULT_HEADER_SCAN_ROWS,
            io_timeout_ms: DEFAULT_IO_TIMEOUT_MS,
            apply_concurrency: DEFAULT_APPLY_CONCURRENCY,
            fuzzy_max_level: DEFAULT_FUZZY_MAX_LEVEL,
            recalc_default_limit: DEFAULT_RECALC_LIMIT,
        }
    }
}

impl ImportSettings {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

// 固定设置（CLI / 测试）
#[async_trait]
impl PriceImportConfigReader for ImportSettings {
    async fn get_preview_row_limit(&self) -> ConfigResult<usize> {
        Ok(self.preview_row_limit)
    }

    async fn get_header_scan_rows(&self) -> ConfigResult<usize> {
        Ok(self.header_scan_rows)
    }

    async fn get_io_timeout_ms(&self) -> ConfigResult<u64> {
        Ok(self.io_timeout_ms)
    }

    async fn get_apply_concurrency(&self) -> ConfigResult<usize> {
        Ok(self.apply_concurrency)
    }

    async fn get_fuzzy_max_level(&self) -> ConfigResult<usize> {
        Ok(self.fuzzy_max_level)
    }

    async fn get_recalc_default_limit(&self) -> ConfigResult<usize> {
        Ok(self.recalc_default_limit)
    }
}
