use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 输入参数错误（在调用模型之前拒绝）
    #[error("参数错误: {0}")]
    Validation(#[from] ValidationError),
    /// 持久化错误
    #[error("数据库错误: {0}")]
    Store(#[from] StoreError),
    /// PDF 解析错误
    #[error("PDF错误: {0}")]
    Pdf(#[from] PdfError),
    /// 图片存储错误
    #[error("文件错误: {0}")]
    Storage(#[from] StorageError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败（网络、鉴权、额度等）
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    Transport {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 多次尝试后仍不是合法 JSON
    #[error("在 {attempts} 次尝试后仍无法获得有效的结构化输出: {source}")]
    MalformedOutput {
        attempts: u32,
        #[source]
        source: serde_json::Error,
    },
    /// 严格模式下输出不符合 schema
    #[error("在 {attempts} 次尝试后输出仍不符合 schema: {reason}")]
    SchemaViolation { attempts: u32, reason: String },
    /// 已解析的输出缺少顶层字段
    #[error("模型输出缺少必需字段: {field}")]
    MissingField { field: &'static str },
    /// 已解析的输出无法映射为题目结构
    #[error("模型输出无法转换为 {target}: {source}")]
    Decode {
        target: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// 图片题目提取失败
    #[error("图片题目提取失败: {source}")]
    ExtractionFailed {
        #[source]
        source: Box<LlmError>,
    },
}

impl LlmError {
    /// 是否属于"已解析但缺字段"一类，这类错误不重试
    pub fn is_missing_field(&self) -> bool {
        matches!(self, LlmError::MissingField { .. } | LlmError::Decode { .. })
    }
}

/// 输入参数错误
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} 不能为空")]
    Empty { field: &'static str },
    #[error("不支持的题目类型: '{0}'，只能是 'mcq' 或 'open_ended'")]
    UnsupportedQuestionKind(String),
    #[error("数量 {count} 超出范围 [{min}, {max}]")]
    CountOutOfRange { count: i64, min: u32, max: u32 },
    #[error("重试次数必须至少为 1，当前为 {0}")]
    InvalidRetryBudget(u32),
    #[error("question_text 和 image_base64 必须提供其一")]
    MissingSource,
    #[error("文件必须是 PDF: {filename}")]
    NotPdf { filename: String },
    #[error("PDF 文本过短 ({len} 字符，至少需要 {min} 字符)，无法生成有意义的题目")]
    ContentTooShort { len: usize, min: usize },
    #[error("字段 {field} 无效: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// 持久化错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite 操作失败: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON 列序列化失败: {0}")]
    Json(#[from] serde_json::Error),
}

/// PDF 解析错误
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("无效的 PDF 文件: {0}")]
    Invalid(#[from] lopdf::Error),
    #[error("无法从 PDF 中提取任何文本")]
    NoText,
}

/// 图片存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("base64 解码失败: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("写入文件失败 ({path}): {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败 ({path}): {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML解析失败 ({path}): {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 便捷构造函数 ==========

impl LlmError {
    /// 创建 LLM API 调用错误
    pub fn transport(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        LlmError::Transport {
            model: model.into(),
            source: Box::new(source),
        }
    }
}

impl StorageError {
    /// 创建文件写入错误
    pub fn write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        StorageError::Write {
            path: path.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

/// LLM 调用结果类型
pub type LlmResult<T> = Result<T, LlmError>;
