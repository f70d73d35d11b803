/// Highest mastery level an item can reach
pub const MAX_MASTERY: u8 = 5;

/// Mastery state machine shared by every review path.
///
/// Correct answers climb one level (capped at `MAX_MASTERY`), a wrong answer
/// drops the item back to level 0.
pub fn next_state(current_level: u8, is_correct: bool) -> u8 {
  let level = current_level.min(MAX_MASTERY);
  if is_correct {
    (level + 1).min(MAX_MASTERY)
  } else {
    0
  }
}
