// ==========================================
// 供应商价格导入 - 源文件存储
// ==========================================
// 职责: 按文件 ID 读取字节 + 修改时间
// 实现: LocalFileStorage（根目录 + 相对路径）
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};

/// 文件元信息（用于缓存新鲜度判断，不读取正文）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub file_id: String,
    pub file_name: String,
    pub size: u64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub metadata: FileMetadata,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn metadata(&self, file_id: &str) -> RepositoryResult<FileMetadata>;

    async fn load(&self, file_id: &str) -> RepositoryResult<StoredFile>;
}

// ==========================================
// LocalFileStorage
// ==========================================
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 文件 ID 必须是根目录下的相对路径
    fn resolve(&self, file_id: &str) -> RepositoryResult<PathBuf> {
        let relative = Path::new(file_id.trim());
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if file_id.trim().is_empty() || escapes {
            return Err(RepositoryError::FieldValueError {
                field: "file_id".to_string(),
                message: format!("非法文件 ID: {}", file_id),
            });
        }
        Ok(self.root.join(relative))
    }

    async fn read_metadata(&self, file_id: &str, path: &Path) -> RepositoryResult<FileMetadata> {
        let meta = tokio::fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(RepositoryError::FileNotFound(file_id.to_string()));
        }
        let modified = meta.modified()?;
        Ok(FileMetadata {
            file_id: file_id.to_string(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size: meta.len(),
            updated_at: DateTime::<Utc>::from(modified),
        })
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn metadata(&self, file_id: &str) -> RepositoryResult<FileMetadata> {
        let path = self.resolve(file_id)?;
        self.read_metadata(file_id, &path).await
    }

    async fn load(&self, file_id: &str) -> RepositoryResult<StoredFile> {
        let path = self.resolve(file_id)?;
        let metadata = self.read_metadata(file_id, &path).await?;
        let bytes = tokio::fs::read(&path).await?;
        Ok(StoredFile { metadata, bytes })
    }
}
