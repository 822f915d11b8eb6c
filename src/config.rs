use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::warn;

use crate::error::ConfigError;

/// 程序配置
///
/// 启动时构造一次，之后以只读方式注入到各个服务中。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 图片识别使用的多模态模型
    pub vision_model_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub vision_max_tokens: u32,
    /// 结构化输出的最大尝试次数
    pub max_retries: u32,
    /// 是否按 schema 严格校验模型输出
    pub strict_schema_validation: bool,
    /// 相似题输出语言，None 表示与原题保持一致
    pub similarity_language: Option<String>,
    // --- 服务配置 ---
    pub host: String,
    pub port: u16,
    /// 对外访问地址，用于拼接上传图片的 URL
    pub backend_url: String,
    pub database_path: PathBuf,
    pub upload_dir: PathBuf,
    /// 日志级别（RUST_LOG 未设置时使用）
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = std::env::var("DATA_DIR").ok().map(PathBuf::from);
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://openrouter.ai/api/v1".to_string(),
            llm_model_name: "anthropic/claude-3.5-sonnet".to_string(),
            vision_model_name: "anthropic/claude-3.5-sonnet".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            vision_max_tokens: 2000,
            max_retries: 3,
            strict_schema_validation: false,
            similarity_language: None,
            host: "0.0.0.0".to_string(),
            port: 8000,
            backend_url: "http://localhost:8000".to_string(),
            database_path: data_dir
                .map(|dir| dir.join("voltran.db"))
                .unwrap_or_else(|| PathBuf::from("voltran.db")),
            upload_dir: PathBuf::from("uploads"),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// 默认配置 + 环境变量覆盖
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件读取配置，缺省字段使用默认值
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(config.normalized())
    }

    /// 加载配置
    ///
    /// 优先读取 `CONFIG_FILE` 指定的文件（默认 `config.toml`，不存在则跳过），
    /// 再用环境变量覆盖。
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        let path = Path::new(&path);
        let base = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        Ok(base.with_env_overrides())
    }

    fn with_env_overrides(self) -> Self {
        Self {
            llm_api_key: std::env::var("LLM_API_KEY")
                .or_else(|_| std::env::var("OPENROUTER_API_KEY"))
                .unwrap_or(self.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: std::env::var("MODEL_NAME").unwrap_or(self.llm_model_name),
            vision_model_name: std::env::var("VISION_MODEL_NAME").unwrap_or(self.vision_model_name),
            temperature: env_or("TEMPERATURE", self.temperature),
            max_tokens: env_or("MAX_TOKENS", self.max_tokens),
            vision_max_tokens: env_or("VISION_MAX_TOKENS", self.vision_max_tokens),
            max_retries: env_or("MAX_RETRIES", self.max_retries),
            strict_schema_validation: env_or("STRICT_SCHEMA_VALIDATION", self.strict_schema_validation),
            similarity_language: std::env::var("SIMILARITY_LANGUAGE").ok().or(self.similarity_language),
            host: std::env::var("HOST").unwrap_or(self.host),
            port: env_or("PORT", self.port),
            backend_url: std::env::var("BACKEND_URL").unwrap_or(self.backend_url),
            database_path: std::env::var("DATABASE_PATH").map(PathBuf::from).unwrap_or(self.database_path),
            upload_dir: std::env::var("UPLOAD_DIR").map(PathBuf::from).unwrap_or(self.upload_dir),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(self.log_level),
        }
        .normalized()
    }

    /// 修正取值范围：`max_retries` 至少为 1
    fn normalized(mut self) -> Self {
        if self.max_retries == 0 {
            warn!("⚠️ max_retries 不能为 0，已调整为 1");
            self.max_retries = 1;
        }
        self
    }
}

/// 读取并解析环境变量，缺失或无法解析时回退到默认值
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("⚠️ 环境变量 {} 的值 '{}' 无法解析，使用默认值", key, raw);
            default
        }),
        Err(_) => default,
    }
}
