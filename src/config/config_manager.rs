// ==========================================
// 供应商价格导入 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{
    ConfigResult, PriceImportConfigReader, DEFAULT_APPLY_CONCURRENCY, DEFAULT_FUZZY_MAX_LEVEL,
    DEFAULT_HEADER_SCAN_ROWS, DEFAULT_IO_TIMEOUT_MS, DEFAULT_PREVIEW_ROW_LIMIT,
    DEFAULT_RECALC_LIMIT,
};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置（按键排序）
    pub fn get_config_snapshot(&self) -> ConfigResult<BTreeMap<String, String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
        Ok(rows)
    }

    /// 读取正数配置；缺失或格式错误时使用默认值
    fn get_positive_or_default<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr + PartialOrd + Default + Copy + std::fmt::Display,
    {
        let raw = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match raw.trim().parse::<T>() {
            Ok(v) if v > T::default() => Ok(v),
            _ => {
                tracing::warn!(
                    config_key = key,
                    raw = %raw,
                    default = %default,
                    "配置值无效，使用默认值"
                );
                Ok(default)
            }
        }
    }
}

// ==========================================
// PriceImportConfigReader 实现
// ==========================================
#[async_trait]
impl PriceImportConfigReader for ConfigManager {
    async fn get_preview_row_limit(&self) -> ConfigResult<usize> {
        self.get_positive_or_default(config_keys::PREVIEW_ROW_LIMIT, DEFAULT_PREVIEW_ROW_LIMIT)
    }

    async fn get_header_scan_rows(&self) -> ConfigResult<usize> {
        self.get_positive_or_default(config_keys::HEADER_SCAN_ROWS, DEFAULT_HEADER_SCAN_ROWS)
    }

    async fn get_io_timeout_ms(&self) -> ConfigResult<u64> {
        self.get_positive_or_default(config_keys::IO_TIMEOUT_MS, DEFAULT_IO_TIMEOUT_MS)
    }

    async fn get_apply_concurrency(&self) -> ConfigResult<usize> {
        self.get_positive_or_default(config_keys::APPLY_CONCURRENCY, DEFAULT_APPLY_CONCURRENCY)
    }

    async fn get_fuzzy_max_level(&self) -> ConfigResult<usize> {
        self.get_positive_or_default(config_keys::FUZZY_MAX_LEVEL, DEFAULT_FUZZY_MAX_LEVEL)
    }

    async fn get_recalc_default_limit(&self) -> ConfigResult<usize> {
        self.get_positive_or_default(config_keys::RECALC_DEFAULT_LIMIT, DEFAULT_RECALC_LIMIT)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 预览
    pub const PREVIEW_ROW_LIMIT: &str = "price_import.preview_row_limit";
    pub const HEADER_SCAN_ROWS: &str = "price_import.header_scan_rows";

    // 协作方调用
    pub const IO_TIMEOUT_MS: &str = "price_import.io_timeout_ms";

    // 应用 / 重算
    pub const APPLY_CONCURRENCY: &str = "price_import.apply_concurrency";
    pub const RECALC_DEFAULT_LIMIT: &str = "price_import.recalc_default_limit";

    // 匹配
    pub const FUZZY_MAX_LEVEL: &str = "price_import.fuzzy_max_level";
}
