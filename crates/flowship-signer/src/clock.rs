use std::sync::Mutex;

use chrono::{DateTime, FixedOffset, Local, TimeDelta};

/// Source of the current time for signing.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
  }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
  now: Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
  pub fn new(now: DateTime<FixedOffset>) -> Self {
    Self {
      now: Mutex::new(now),
    }
  }

  pub fn advance(&self, by: TimeDelta) {
    let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
    *now = *now + by;
  }
}

impl Clock for FixedClock {
  fn now(&self) -> DateTime<FixedOffset> {
    *self.now.lock().unwrap_or_else(|e| e.into_inner())
  }
}
