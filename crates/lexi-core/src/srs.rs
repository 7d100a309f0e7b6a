//! The spaced-repetition scheduler — a pure SM-2 variant.
//!
//! [`schedule`] is a deterministic transition function with no I/O and no
//! hidden state. Exactly-once invocation per submitted review is the review
//! orchestrator's job, not the scheduler's.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Rating ──────────────────────────────────────────────────────────────────

/// The user's recall rating for one review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
  Again = 0,
  Hard  = 1,
  Good  = 2,
  Easy  = 3,
}

impl TryFrom<u8> for Rating {
  type Error = Error;

  /// Values outside 0..=3 are a caller contract violation, rejected before
  /// the scheduler is reached.
  fn try_from(value: u8) -> Result<Self> {
    match value {
      0 => Ok(Self::Again),
      1 => Ok(Self::Hard),
      2 => Ok(Self::Good),
      3 => Ok(Self::Easy),
      other => Err(Error::InvalidRating(other)),
    }
  }
}

// ─── Ease factor ─────────────────────────────────────────────────────────────

/// SM-2 ease factor in fixed-point thousandths (2500 = 2.5).
///
/// Integer arithmetic keeps the scheduler bit-for-bit deterministic across
/// platforms; the 1.3 floor holds exactly, with no float drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EaseFactor(i32);

impl EaseFactor {
  pub const FLOOR: Self = Self(1300);

  /// Construct from raw thousandths, clamped to the floor.
  pub fn from_millis(millis: i32) -> Self { Self(millis.max(1300)) }

  pub fn millis(self) -> i32 { self.0 }

  /// Apply the SM-2 update `ef + (0.1 - (3-r)(0.08 + (3-r)*0.02))` in
  /// thousandths: Easy +100, Good +0, Hard -140, Again -320. Clamped to the
  /// floor, no ceiling.
  fn updated(self, rating: Rating) -> Self {
    let miss = 3 - rating as i32;
    Self::from_millis(self.0 + 100 - miss * (80 + miss * 20))
  }
}

impl Default for EaseFactor {
  fn default() -> Self { Self(2500) }
}

// ─── State ───────────────────────────────────────────────────────────────────

/// Per-item scheduling state, mutated only through [`schedule`].
///
/// Invariants: `due_date` equals the last-reviewed day plus `interval_days`
/// whenever `last_reviewed_at` is set; `interval_days == 0` implies
/// `repetitions == 0` (a never-scheduled item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrsState {
  pub ease_factor:   EaseFactor,
  pub interval_days: u32,
  /// Consecutive non-Again reviews.
  pub repetitions:   u32,
  pub due_date:      NaiveDate,
  pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl SrsState {
  /// State for a freshly-created learning item: due today, never reviewed.
  pub fn new(today: NaiveDate) -> Self {
    Self {
      ease_factor: EaseFactor::default(),
      interval_days: 0,
      repetitions: 0,
      due_date: today,
      last_reviewed_at: None,
    }
  }

  pub fn is_due(&self, today: NaiveDate) -> bool { self.due_date <= today }
}

// ─── Transition ──────────────────────────────────────────────────────────────

/// Compute the next review state from the current state and a recall rating.
///
/// Pure and deterministic: identical inputs always yield identical outputs.
/// The caller guarantees at-most-once invocation per submission.
pub fn schedule(current: &SrsState, rating: Rating, now: DateTime<Utc>) -> SrsState {
  let ease_factor = current.ease_factor.updated(rating);

  let (repetitions, interval_days) = match rating {
    // A lapse penalises the ease factor but does not feed it into the
    // interval: the item drops back to the first-step interval.
    Rating::Again => (0, 1),
    _ => {
      let repetitions = current.repetitions + 1;
      let interval_days = match repetitions {
        1 => 1,
        2 => 6,
        _ => round_half_up(current.interval_days, ease_factor),
      };
      (repetitions, interval_days)
    }
  };

  let today = now.date_naive();
  let due_date = today
    .checked_add_days(Days::new(u64::from(interval_days)))
    .unwrap_or(today);

  SrsState {
    ease_factor,
    interval_days,
    repetitions,
    due_date,
    last_reviewed_at: Some(now),
  }
}

/// `round(interval * ef)` with round-half-up semantics, in integer space.
fn round_half_up(interval_days: u32, ef: EaseFactor) -> u32 {
  let product = i64::from(interval_days) * i64::from(ef.millis());
  ((product + 500) / 1000) as u32
}

// ─── Tests ───────────────────────────────────────────────────────────────────
