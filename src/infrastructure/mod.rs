pub mod store;

pub use store::QuestionStore;
