pub mod question;
pub mod record;

pub use question::{
    Difficulty, McqQuestion, OpenEndedQuestion, QuestionKind, QuestionSpec, RefineOutcome,
    RefinementContext, RefinementTurn,
};
pub use record::{
    NewQuestion, NewSession, QuestionRecord, QuestionUpdate, QuestionView, SessionDetail,
    SessionRecord, SessionType, Statistics,
};
