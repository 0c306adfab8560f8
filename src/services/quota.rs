//! Daily usage accounting.
//!
//! The ledger records usage and reports standing; it never decides whether a
//! request may proceed. Enforcement lives in the analysis service so other
//! callers (stats, billing exports) can read the same numbers without
//! tripping policy.

use anyhow::Result;
use serde::Serialize;

use crate::db::{Store, User};

#[derive(Debug, Clone, Serialize)]
pub struct QuotaStatus {
    pub used_today: u32,
    pub limit: u32,
    pub remaining: u32,
    pub unlimited: bool,
}

/// Compute a user's standing against a daily limit.
///
/// Counters persisted before the current UTC day read as zero; the stored
/// value only resets physically on the next recorded usage. A limit of zero
/// means unlimited.
#[must_use]
pub fn status(analyses_today: i32, last_analysis_date: Option<&str>, limit: i32) -> QuotaStatus {
    let midnight = utc_midnight();
    let counted_today = last_analysis_date.is_some_and(|d| *d >= *midnight);

    let used_today = if counted_today {
        u32::try_from(analyses_today).unwrap_or(0)
    } else {
        0
    };

    let limit = u32::try_from(limit).unwrap_or(0);
    let unlimited = limit == 0;
    let remaining = if unlimited {
        u32::MAX
    } else {
        limit.saturating_sub(used_today)
    };

    QuotaStatus {
        used_today,
        limit,
        remaining,
        unlimited,
    }
}

/// Start of the current UTC day, RFC3339. Comparable lexicographically
/// against stored timestamps.
fn utc_midnight() -> String {
    format!("{}T00:00:00+00:00", chrono::Utc::now().date_naive())
}

#[derive(Clone)]
pub struct QuotaLedger {
    store: Store,
}

impl QuotaLedger {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Record one completed analysis. Atomic per call; concurrent calls for
    /// the same user all land.
    pub async fn record_usage(&self, user_id: i32) -> Result<()> {
        self.store.record_user_usage(user_id).await
    }

    /// Current standing for a user given their role's daily limit.
    #[must_use]
    pub fn status_for(&self, user: &User, limit: i32) -> QuotaStatus {
        status(user.analyses_today, user.last_analysis_date.as_deref(), limit)
    }
}
