//! HTTP 接口层
//!
//! warp 路由、请求处理和错误响应，只调用流程层和仓库

pub mod dto;
pub mod handlers;
pub mod reply;
pub mod routes;

use std::sync::Arc;

use crate::infrastructure::QuestionStore;
use crate::services::ImageStore;
use crate::workflow::GenerationFlow;

pub use reply::ApiError;
pub use routes::routes;

/// 处理请求所需的共享状态
#[derive(Clone)]
pub struct ApiState {
    pub flow: Arc<GenerationFlow>,
    pub store: Arc<QuestionStore>,
    pub images: Arc<ImageStore>,
}

impl ApiState {
    pub fn new(flow: GenerationFlow, store: QuestionStore, images: ImageStore) -> Self {
        Self {
            flow: Arc::new(flow),
            store: Arc::new(store),
            images: Arc::new(images),
        }
    }
}
