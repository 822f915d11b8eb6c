//! PDF 文本提取

use lopdf::Document;
use regex::Regex;
use tracing::{info, warn};

use crate::error::PdfError;

/// PDF 服务
pub struct PdfService;

impl PdfService {
    /// 逐页提取文本
    ///
    /// 空白页和提取失败的页会被跳过，结果形如 `--- Page N ---\n{text}`，
    /// 页与页之间以空行分隔。
    pub fn extract_text(bytes: &[u8]) -> Result<String, PdfError> {
        let document = Document::load_mem(bytes)?;
        let pages = document.get_pages();

        let mut sections = Vec::new();
        for page_num in pages.keys() {
            match document.extract_text(&[*page_num]) {
                Ok(text) => {
                    let text = normalize_whitespace(&text);
                    if !text.trim().is_empty() {
                        sections.push(format!("--- Page {} ---\n{}", page_num, text));
                    }
                }
                Err(e) => warn!("第 {} 页文本提取失败: {}", page_num, e),
            }
        }

        if sections.is_empty() {
            return Err(PdfError::NoText);
        }

        let full_text = sections.join("\n\n");
        info!(
            "✓ 从 {} 页中提取了 {} 个字符",
            pages.len(),
            full_text.chars().count()
        );
        Ok(full_text)
    }
}

/// 去掉行尾空白并合并连续空行
fn normalize_whitespace(text: &str) -> String {
    let mut result = text.trim().to_string();
    if let Ok(re) = Regex::new(r"[ \t]+\n") {
        result = re.replace_all(&result, "\n").into_owned();
    }
    if let Ok(re) = Regex::new(r"\n{3,}") {
        result = re.replace_all(&result, "\n\n").into_owned();
    }
    result
}
