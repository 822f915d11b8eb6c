pub mod generation_flow;

pub use generation_flow::{GenerationFlow, MAX_PDF_COUNT, MAX_SIMILAR_COUNT};
