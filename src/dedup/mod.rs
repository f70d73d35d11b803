pub mod hash;
pub mod merge;
pub mod similarity;

pub use hash::{analyze_duplication, question_hash, DuplicationReport};
pub use merge::{merge, merge_local, smart_merge, MergeAction, MergeOutcome, MergeStrategy, Mergeable};
pub use similarity::{find_best_match, name_similarity, token_cosine};
