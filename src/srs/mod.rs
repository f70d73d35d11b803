pub mod mastery;
pub mod schedule;

pub use mastery::{next_state, MAX_MASTERY};
pub use schedule::{format_relative, interval_for, is_due, next_review_at, transition, Transition};
