//! 图片存储服务 - 业务能力层
//!
//! 只负责"保存题目图片并给出访问地址"能力

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::error::StorageError;

/// 图片在上传目录下的子目录，也是 URL 路径的一部分
const QUESTIONS_SUBDIR: &str = "questions";

/// 图片存储服务
///
/// 职责：
/// - 把相似题请求中的原图写入 `{upload_dir}/questions/{uuid}.png`
/// - 返回 `{backend_url}/uploads/questions/{uuid}.png`
pub struct ImageStore {
    upload_dir: PathBuf,
    backend_url: String,
}

impl ImageStore {
    /// 创建新的图片存储服务
    pub fn new(config: &Config) -> Self {
        Self::with_paths(&config.upload_dir, &config.backend_url)
    }

    /// 使用自定义目录和地址创建
    pub fn with_paths(upload_dir: impl AsRef<Path>, backend_url: impl Into<String>) -> Self {
        Self {
            upload_dir: upload_dir.as_ref().to_path_buf(),
            backend_url: backend_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// 保存图片，返回公开 URL
    pub async fn save(&self, image: &[u8]) -> Result<String, StorageError> {
        let dir = self.upload_dir.join(QUESTIONS_SUBDIR);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::write_failed(dir.display().to_string(), e))?;

        let file_name = format!("{}.png", Uuid::new_v4());
        let path = dir.join(&file_name);
        fs::write(&path, image)
            .await
            .map_err(|e| StorageError::write_failed(path.display().to_string(), e))?;

        debug!("图片已写入: {} ({} 字节)", path.display(), image.len());

        Ok(format!(
            "{}/uploads/{}/{}",
            self.backend_url, QUESTIONS_SUBDIR, file_name
        ))
    }
}
