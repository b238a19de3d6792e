// ==========================================
// 协作方调用超时
// ==========================================
// 文件读取 / 目录查询 / 模板读写都必须有上限，超时即失败，不自动重试
// ==========================================

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("操作超时: {operation}（{timeout_ms} ms）")]
pub struct TimedOut {
    pub operation: &'static str,
    pub timeout_ms: u64,
}

/// 在时限内等待 `fut`；外层 Err 表示超时，内层为原始结果
///
/// 调用方写法: `bounded("catalog.find_candidates", limit, fut).await??`
pub async fn bounded<F: Future>(
    operation: &'static str,
    limit: Duration,
    fut: F,
) -> Result<F::Output, TimedOut> {
    match tokio::time::timeout(limit, fut).await {
        Ok(output) => Ok(output),
        Err(_) => {
            let timeout_ms = limit.as_millis() as u64;
            warn!(operation, timeout_ms, "协作方调用超时");
            Err(TimedOut {
                operation,
                timeout_ms,
            })
        }
    }
}
