//! 日志工具模块
//!
//! 提供日志初始化和输出的辅助函数

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化日志（默认 info 级别）
pub fn init() {
    init_with_level("info");
}

/// 初始化日志
///
/// `RUST_LOG` 优先，未设置时使用 `level`。重复调用不会报错。
pub fn init_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 题目生成服务启动");
    info!("🤖 模型: {} (视觉: {})", config.llm_model_name, config.vision_model_name);
    info!("🔁 最大尝试次数: {}", config.max_retries);
    info!("🗄️ 数据库: {}", config.database_path.display());
    info!("🌐 监听: {}:{}", config.host, config.port);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
