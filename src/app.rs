use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::api::{self, ApiState};
use crate::clients::{ChatBackend, LlmClient};
use crate::config::Config;
use crate::infrastructure::QuestionStore;
use crate::logger::log_startup;
use crate::services::ImageStore;
use crate::workflow::GenerationFlow;

/// 应用主结构
pub struct App {
    config: Config,
    state: ApiState,
}

impl App {
    /// 初始化应用（连接真实模型服务）
    pub async fn initialize(config: Config) -> Result<Self> {
        if config.llm_api_key.is_empty() {
            warn!("⚠️ 未设置 LLM_API_KEY，模型调用将会失败");
        }
        let backend: Arc<dyn ChatBackend> = Arc::new(LlmClient::new(&config));
        Self::with_backend(config, backend).await
    }

    /// 使用指定的模型后端初始化
    pub async fn with_backend(config: Config, backend: Arc<dyn ChatBackend>) -> Result<Self> {
        log_startup(&config);

        tokio::fs::create_dir_all(&config.upload_dir)
            .await
            .with_context(|| format!("无法创建上传目录: {}", config.upload_dir.display()))?;

        let store = QuestionStore::open(&config.database_path)
            .with_context(|| format!("无法打开数据库: {}", config.database_path.display()))?;
        let flow = GenerationFlow::new(&config, backend);
        let images = ImageStore::new(&config);

        Ok(Self {
            state: ApiState::new(flow, store, images),
            config,
        })
    }

    pub fn state(&self) -> &ApiState {
        &self.state
    }

    /// 启动 HTTP 服务，直到进程退出
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .with_context(|| {
                format!("无效的监听地址: {}:{}", self.config.host, self.config.port)
            })?;

        info!("✅ 服务已启动: http://{}", addr);
        warp::serve(api::routes(self.state.clone())).run(addr).await;

        Ok(())
    }
}
