//! Period-chained Ready-To-Assign snapshots.
//!
//! A period's snapshot depends on its predecessor's `ready_to_assign` and
//! category balances, so a missing or invalid snapshot is rebuilt by walking
//! back to the nearest valid predecessor (or the user's earliest-activity
//! period) and folding forward, persisting each period on the way.

mod aggregator;
mod error;
mod providers;
mod rollup;

use std::time::Instant;
use tracing::{debug, warn};

pub use aggregator::ActivityAggregator;
pub use error::SnapshotError;
pub use providers::{
    AllocationProvider, BudgetBackend, SnapshotStore, TransactionProvider, UserActivityProvider,
};
pub use rollup::CategoryRollup;

use crate::models::{Period, Snapshot};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on predecessor periods walked by a single rebuild.
    /// The calendar distance to the earliest-activity period always applies.
    pub max_chain_len: Option<u32>,
}

/// Where a rebuild starts folding from.
#[derive(Debug)]
enum Resolution {
    /// A valid stored snapshot precedes the pending periods.
    Resolved(Snapshot),
    /// The first pending period has no predecessor.
    IsBaseCase,
}

/// Periods to recompute, oldest first, and the state they build on.
#[derive(Debug)]
struct RebuildPlan {
    start: Resolution,
    pending: Vec<Period>,
}

pub struct SnapshotEngine<'a, B: ?Sized> {
    backend: &'a B,
    config: EngineConfig,
}

impl<'a, B> SnapshotEngine<'a, B>
where
    B: BudgetBackend + ?Sized,
{
    pub fn new(backend: &'a B) -> Self {
        Self::with_config(backend, EngineConfig::default())
    }

    pub fn with_config(backend: &'a B, config: EngineConfig) -> Self {
        Self { backend, config }
    }

    /// Return a valid snapshot for (user, period), rebuilding stale or missing ones.
    pub fn get_snapshot(&self, user_id: i64, period: Period) -> Result<Snapshot, SnapshotError> {
        self.resolve(user_id, period, None)
    }

    /// Like [`Self::get_snapshot`], but gives up once `deadline` passes.
    /// The period being computed at that moment is not persisted.
    pub fn get_snapshot_with_deadline(
        &self,
        user_id: i64,
        period: Period,
        deadline: Instant,
    ) -> Result<Snapshot, SnapshotError> {
        self.resolve(user_id, period, Some(deadline))
    }

    /// Mark `period` and every later snapshot for the user stale. Does not recompute.
    pub fn invalidate_snapshots_from_period(
        &self,
        user_id: i64,
        period: Period,
    ) -> Result<(), SnapshotError> {
        debug!(user_id, %period, "invalidating snapshots");
        self.backend.invalidate_from_period(user_id, period)?;
        Ok(())
    }

    fn resolve(
        &self,
        user_id: i64,
        period: Period,
        deadline: Option<Instant>,
    ) -> Result<Snapshot, SnapshotError> {
        if let Some(snapshot) = self.backend.get(user_id, period)? {
            if snapshot.is_valid {
                return Ok(snapshot);
            }
        }

        let result = self
            .plan(user_id, period)
            .and_then(|plan| self.execute(user_id, plan, deadline));
        if let Err(e) = &result {
            warn!(user_id, %period, error = %e, "snapshot rebuild failed");
        }
        result
    }

    /// Users without transactions start at the requested period.
    fn earliest_activity(&self, user_id: i64, requested: Period) -> Result<Period, SnapshotError> {
        Ok(self
            .backend
            .earliest_activity_date(user_id)?
            .map_or(requested, Period::from_date))
    }

    fn plan(&self, user_id: i64, period: Period) -> Result<RebuildPlan, SnapshotError> {
        let earliest = self.earliest_activity(user_id, period)?;
        let distance = u64::try_from(earliest.months_until(period)).unwrap_or(0);
        let cap = self
            .config
            .max_chain_len
            .filter(|max| u64::from(*max) < distance);
        let limit = cap.map_or(distance, u64::from);

        let mut pending = vec![period];
        let mut cursor = period;
        let mut steps = 0u64;
        let start = loop {
            if cursor <= earliest {
                debug!(user_id, %cursor, %earliest, "base case");
                break Resolution::IsBaseCase;
            }
            steps += 1;
            if steps > limit {
                if let Some(limit) = cap {
                    return Err(SnapshotError::ChainLimitExceeded {
                        user: user_id,
                        requested: period,
                        limit,
                    });
                }
                return Err(SnapshotError::RebuildDepthExceeded {
                    user: user_id,
                    requested: period,
                    earliest,
                    steps,
                    limit,
                });
            }
            let prev = cursor.previous();
            match self.backend.get(user_id, prev)? {
                Some(snapshot) if snapshot.is_valid => {
                    debug!(user_id, anchor = %prev, "found valid predecessor");
                    break Resolution::Resolved(snapshot);
                }
                _ => {
                    pending.push(prev);
                    cursor = prev;
                }
            }
        };

        pending.reverse();
        debug!(user_id, %period, periods = pending.len(), "rebuilding snapshots");
        Ok(RebuildPlan { start, pending })
    }

    fn execute(
        &self,
        user_id: i64,
        plan: RebuildPlan,
        deadline: Option<Instant>,
    ) -> Result<Snapshot, SnapshotError> {
        let mut prev = match plan.start {
            Resolution::Resolved(snapshot) => Some(snapshot),
            Resolution::IsBaseCase => None,
        };

        for period in plan.pending {
            check_deadline(deadline, user_id, period)?;
            let snapshot = match &prev {
                None => self.build_base(user_id, period)?,
                Some(prev) => self.build_chained(user_id, period, prev)?,
            };
            check_deadline(deadline, user_id, period)?;
            let saved = self.backend.save(&snapshot)?;
            debug!(user_id, %period, rta = %saved.ready_to_assign, "snapshot saved");
            prev = Some(saved);
        }

        prev.ok_or_else(|| anyhow::anyhow!("rebuild plan for user {user_id} was empty").into())
    }

    fn build_base(&self, user_id: i64, period: Period) -> anyhow::Result<Snapshot> {
        let aggregator = ActivityAggregator::new(self.backend);
        let income = aggregator.income(user_id, period)?;
        let assigned = aggregator.allocations_total(user_id, period)?;
        let categories = CategoryRollup::new(self.backend).rollup(user_id, period)?;
        Ok(Snapshot::new(user_id, period, income - assigned, categories))
    }

    fn build_chained(
        &self,
        user_id: i64,
        period: Period,
        prev: &Snapshot,
    ) -> anyhow::Result<Snapshot> {
        let aggregator = ActivityAggregator::new(self.backend);
        let income = aggregator.income(user_id, period)?;
        let assigned = aggregator.allocations_total(user_id, period)?;
        let categories = CategoryRollup::new(self.backend).rollup(user_id, period)?;
        let rta = prev.ready_to_assign + income - assigned - prev.overspend();
        Ok(Snapshot::new(user_id, period, rta, categories))
    }
}

fn check_deadline(
    deadline: Option<Instant>,
    user_id: i64,
    period: Period,
) -> Result<(), SnapshotError> {
    match deadline {
        Some(d) if Instant::now() >= d => Err(SnapshotError::DeadlineExceeded {
            user: user_id,
            period,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod fake;
