use crate::models::Period;

/// Errors surfaced by [`super::SnapshotEngine`].
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The walk back passed the earliest-activity period. Indicates inconsistent stored data.
    #[error(
        "rebuild for user {user} at {requested} exceeded {limit} steps \
         (earliest activity {earliest}, walked {steps})"
    )]
    RebuildDepthExceeded {
        user: i64,
        requested: Period,
        earliest: Period,
        steps: u64,
        limit: u64,
    },

    /// The walk back needed more steps than `EngineConfig::max_chain_len` allows.
    /// The data may be fine; raising the limit lets the rebuild finish.
    #[error(
        "rebuild for user {user} at {requested} exceeded the configured chain limit \
         of {limit} months"
    )]
    ChainLimitExceeded {
        user: i64,
        requested: Period,
        limit: u32,
    },

    /// The caller's deadline passed before the rebuild finished.
    #[error("rebuild for user {user} stopped at {period}: deadline exceeded")]
    DeadlineExceeded { user: i64, period: Period },

    /// A store, aggregator or rollup call failed.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}
