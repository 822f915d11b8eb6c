pub mod image_store;
pub mod llm_service;
pub mod pdf_service;
pub mod prompts;
pub mod schemas;

pub use image_store::ImageStore;
pub use llm_service::{GenerationRequest, LlmService, ValidationMode, WorkflowKind};
pub use pdf_service::PdfService;
pub use schemas::SchemaKind;
