//! Daily usage budget for generative services.
//!
//! Counts logical calls (not retry attempts) per capability and refuses
//! new calls once an optional daily limit is reached. Counters reset at
//! the UTC day boundary.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{WorkerError, WorkerResult};

/// A generative capability with its own budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Text,
    Image,
    Audio,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Capability::Text, Capability::Image, Capability::Audio];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Text => "text",
            Capability::Image => "image",
            Capability::Audio => "audio",
        }
    }

    fn slot(self) -> usize {
        match self {
            Capability::Text => 0,
            Capability::Image => 1,
            Capability::Audio => 2,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Daily limits; `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageLimits {
    pub text: Option<u32>,
    pub image: Option<u32>,
    pub audio: Option<u32>,
}

impl UsageLimits {
    pub fn get(&self, capability: Capability) -> Option<u32> {
        match capability {
            Capability::Text => self.text,
            Capability::Image => self.image,
            Capability::Audio => self.audio,
        }
    }
}

/// Usage of one capability today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityUsage {
    pub capability: Capability,
    pub used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Read-only view of the budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub day: NaiveDate,
    pub capabilities: Vec<CapabilityUsage>,
}

#[derive(Debug)]
struct DailyCounts {
    day: NaiveDate,
    used: [u32; 3],
}

/// Shared, injectable daily call budget.
#[derive(Debug)]
pub struct UsageBudget {
    limits: UsageLimits,
    counts: Mutex<DailyCounts>,
}

impl UsageBudget {
    pub fn new(limits: UsageLimits) -> Self {
        Self {
            limits,
            counts: Mutex::new(DailyCounts {
                day: Utc::now().date_naive(),
                used: [0; 3],
            }),
        }
    }

    /// A budget without limits.
    pub fn unlimited() -> Self {
        Self::new(UsageLimits::default())
    }

    pub fn limits(&self) -> UsageLimits {
        self.limits
    }

    /// Reserve one call of `capability`, or fail if today's limit is used up.
    pub fn try_consume(&self, capability: Capability) -> WorkerResult<()> {
        self.try_consume_at(capability, Utc::now())
    }

    /// [`try_consume`](Self::try_consume) against an explicit clock.
    pub fn try_consume_at(&self, capability: Capability, now: DateTime<Utc>) -> WorkerResult<()> {
        let mut counts = self.lock();
        Self::roll_over(&mut counts, now);

        let used = &mut counts.used[capability.slot()];
        if let Some(limit) = self.limits.get(capability) {
            if *used >= limit {
                warn!(capability = %capability, limit = limit, "Daily usage budget exhausted");
                return Err(WorkerError::BudgetExhausted(capability));
            }
        }
        *used += 1;
        Ok(())
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> UsageSnapshot {
        let mut counts = self.lock();
        Self::roll_over(&mut counts, now);

        UsageSnapshot {
            day: counts.day,
            capabilities: Capability::ALL
                .iter()
                .map(|&capability| CapabilityUsage {
                    capability,
                    used: counts.used[capability.slot()],
                    limit: self.limits.get(capability),
                })
                .collect(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DailyCounts> {
        // Counters stay consistent even if a holder panicked.
        self.counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn roll_over(counts: &mut DailyCounts, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today > counts.day {
            info!(previous_day = %counts.day, day = %today, "Resetting daily usage counters");
            counts.day = today;
            counts.used = [0; 3];
        }
    }
}

impl Default for UsageBudget {
    fn default() -> Self {
        Self::unlimited()
    }
}
