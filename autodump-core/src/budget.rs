use chrono::{DateTime, Local};
use serde::Deserialize;

/// How the daily ceiling is compared against the number of dumps so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPolicy {
    /// Deny once `dumps_today > max_per_day`, which admits one dump more
    /// than configured per day.
    #[default]
    Legacy,
    /// Deny once `dumps_today >= max_per_day`.
    Strict,
}

fn day_key(now: &DateTime<Local>) -> String {
    now.format("%Y%m%d").to_string()
}

/// Counts dumps since local midnight and enforces the daily ceiling.
///
/// Only the scheduler task touches the budget, so no locking is involved.
#[derive(Debug, Clone)]
pub struct DumpBudget {
    dumps_today: u32,
    day_key: String,
    max_per_day: u32,
    policy: BudgetPolicy,
}

impl DumpBudget {
    pub fn new(max_per_day: u32, policy: BudgetPolicy, now: DateTime<Local>) -> Self {
        Self {
            dumps_today: 0,
            day_key: day_key(&now),
            max_per_day,
            policy,
        }
    }

    /// Reserve one dump for the calendar day of `now`.
    pub fn try_reserve(&mut self, now: DateTime<Local>) -> bool {
        if self.is_exhausted(now) {
            return false;
        }
        self.dumps_today += 1;
        true
    }

    /// Hand back a reservation whose dump did not happen.
    pub fn release(&mut self) {
        self.dumps_today = self.dumps_today.saturating_sub(1);
    }

    /// Whether the ceiling is reached for the day of `now`. Resets the
    /// counter when `now` falls on a new day.
    pub fn is_exhausted(&mut self, now: DateTime<Local>) -> bool {
        self.roll_over(now);
        match self.policy {
            BudgetPolicy::Legacy => self.dumps_today > self.max_per_day,
            BudgetPolicy::Strict => self.dumps_today >= self.max_per_day,
        }
    }

    fn roll_over(&mut self, now: DateTime<Local>) {
        let today = day_key(&now);
        if today != self.day_key {
            tracing::debug!(
                "New dump day {}, resetting {} dumps of {}",
                today,
                self.dumps_today,
                self.day_key
            );
            self.day_key = today;
            self.dumps_today = 0;
        }
    }

    pub fn dumps_today(&self) -> u32 {
        self.dumps_today
    }

    pub fn day_key(&self) -> &str {
        &self.day_key
    }

    pub fn max_per_day(&self) -> u32 {
        self.max_per_day
    }

    pub fn policy(&self) -> BudgetPolicy {
        self.policy
    }
}
