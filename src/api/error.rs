// ==========================================
// 供应商价格导入 - API层错误类型
// ==========================================
// 职责: 汇总各层错误，对外提供机器可读的错误类别 (ErrorKind)
// 约束: 所有错误信息必须包含显式原因
// ==========================================

use crate::domain::matching::ApplyStats;
use crate::engine::template_store::StoreError;
use crate::engine::timeout::TimedOut;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 机器可读的错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnsupportedFormat,
    MalformedSource,
    MissingMapping,
    /// 仅作为预览警告出现
    NoCandidates,
    ApplyConflict,
    PartialWriteFailure,
    NotImplemented,
    NotFound,
    Timeout,
    InvalidInput,
    Storage,
    Internal,
}

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 源文件错误
    // ==========================================
    #[error("文件格式不支持: {0}")]
    UnsupportedFormat(String),

    #[error("文件无法读取: {0}")]
    MalformedSource(String),

    #[error("该格式尚未实现: {0}")]
    NotImplemented(String),

    // ==========================================
    // 配置 / 输入错误
    // ==========================================
    #[error("模板未配置列映射: {0}")]
    MissingMapping(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 并发 / 写入错误
    // ==========================================
    #[error("模板正在应用价格，请稍后重试: template_id={template_id}")]
    ApplyConflict { template_id: String },

    #[error("部分价格写入失败: failed={}, updated={}", stats.failed, stats.updated)]
    PartialWriteFailure { stats: Box<ApplyStats> },

    /// 价格已写入目录，但映射或应用记录未能保存；stats 给出已写入的行
    #[error("价格已写入(updated={})，但应用记录保存失败: {cause}", stats.updated)]
    ApplyNotRecorded { stats: Box<ApplyStats>, cause: String },

    #[error("操作超时: {operation}（{timeout_ms} ms）")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("文件存储错误: {0}")]
    StorageError(String),

    #[error("配置读取失败: {0}")]
    ConfigError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            ApiError::MalformedSource(_) => ErrorKind::MalformedSource,
            ApiError::NotImplemented(_) => ErrorKind::NotImplemented,
            ApiError::MissingMapping(_) => ErrorKind::MissingMapping,
            ApiError::InvalidInput(_) => ErrorKind::InvalidInput,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::ApplyConflict { .. } => ErrorKind::ApplyConflict,
            ApiError::PartialWriteFailure { .. } | ApiError::ApplyNotRecorded { .. } => {
                ErrorKind::PartialWriteFailure
            }
            ApiError::Timeout { .. } => ErrorKind::Timeout,
            ApiError::DatabaseError(_) | ApiError::StorageError(_) => ErrorKind::Storage,
            ApiError::ConfigError(_) | ApiError::InternalError(_) | ApiError::Other(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// 结构化错误（供调用方序列化）
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
}

// ==========================================
// 从各层错误转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::FileNotFound(msg) => ApiError::NotFound(msg),
            ImportError::UnsupportedFormat(msg) => ApiError::UnsupportedFormat(msg),
            ImportError::MalformedSource(msg) => ApiError::MalformedSource(msg),
            ImportError::FileReadError(msg) => ApiError::StorageError(msg),
            ImportError::NotImplemented(msg) => ApiError::NotImplemented(msg),
            ImportError::MissingMapping(msg) => ApiError::MissingMapping(msg),
            ImportError::InternalError(msg) => ApiError::InternalError(msg),
            ImportError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::FileNotFound(msg) => ApiError::NotFound(format!("源文件不存在: {}", msg)),
            RepositoryError::StorageError(msg) => ApiError::StorageError(msg),
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::InvalidInput(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::SerializationError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<TimedOut> for ApiError {
    fn from(err: TimedOut) -> Self {
        ApiError::Timeout {
            operation: err.operation,
            timeout_ms: err.timeout_ms,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Import(e) => e.into(),
            StoreError::Repository(e) => e.into(),
            StoreError::Timeout(e) => e.into(),
            StoreError::InvalidInput(msg) => ApiError::InvalidInput(msg),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
