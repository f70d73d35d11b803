pub mod item;
pub mod mistake;
pub mod progress;
pub mod question;

pub use item::{
  Article, Collocation, FamilyMember, GrammarPoint, ItemKind, LearningItem, TransformationForm,
  Word, WordFamily, WordTransformation,
};
pub use mistake::{MistakeRecord, NewMistake};
pub use progress::{ProgressRecord, ProgressStats};
pub use question::{Paper, QuestionData, QuestionRecord};
