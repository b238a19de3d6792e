// ==========================================
// 供应商价格导入 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}")]
    UnsupportedFormat(String),

    #[error("文件无法读取（格式损坏或编码错误）: {0}")]
    MalformedSource(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("该格式尚未实现: {0}")]
    NotImplemented(String),

    // ===== 配置错误 =====
    #[error("模板未配置列映射: {0}")]
    MissingMapping(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ImportError::FileNotFound(err.to_string()),
            _ => ImportError::FileReadError(err.to_string()),
        }
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::MalformedSource(format!("CSV 解析失败: {}", err))
    }
}

impl From<calamine::XlsxError> for ImportError {
    fn from(err: calamine::XlsxError) -> Self {
        ImportError::MalformedSource(format!("Excel 解析失败: {}", err))
    }
}

impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::MalformedSource(format!("Excel 解析失败: {}", err))
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
