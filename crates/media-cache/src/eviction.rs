//! Eviction planning
//!
//! Pure functions over metadata snapshots; the manager applies the plans.

use crate::types::CacheEntryMetadata;
use std::time::Duration;

/// Keys to remove so an incoming write fits under the quota
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EvictionPlan {
    /// Worst-ranked first
    pub evict: Vec<String>,
    /// Projected total including the incoming blob, before eviction
    pub bytes_before: u64,
    /// Projected total including the incoming blob, after eviction
    pub bytes_after: u64,
}

impl EvictionPlan {
    pub fn is_empty(&self) -> bool {
        self.evict.is_empty()
    }
}

/// Plan evictions for writing `incoming_size` bytes under `incoming_key`.
///
/// Entries are ranked worst-first: lowest priority, then oldest
/// `timestamp_created`, then least recently accessed. Items are taken from
/// the front of that ranking until the projected total fits in `max_bytes`.
/// An existing record for `incoming_key` is left out entirely since the
/// write replaces it.
pub fn plan_eviction(
    mut entries: Vec<CacheEntryMetadata>,
    incoming_key: &str,
    incoming_size: u64,
    max_bytes: u64,
) -> EvictionPlan {
    entries.retain(|e| e.id != incoming_key);

    let mut total: u64 = entries
        .iter()
        .map(|e| e.size_bytes)
        .fold(incoming_size, u64::saturating_add);

    let mut plan = EvictionPlan {
        bytes_before: total,
        ..Default::default()
    };

    if total > max_bytes {
        entries.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.timestamp_created.cmp(&b.timestamp_created))
                .then(a.last_accessed.cmp(&b.last_accessed))
                .then_with(|| a.id.cmp(&b.id))
        });

        for e in entries {
            if total <= max_bytes {
                break;
            }
            total = total.saturating_sub(e.size_bytes);
            plan.evict.push(e.id);
        }
    }

    plan.bytes_after = total;
    plan
}

/// Keys whose age at `now_ms` is strictly greater than `max_age`
pub fn plan_expiry(entries: &[CacheEntryMetadata], now_ms: i64, max_age: Duration) -> Vec<String> {
    let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
    entries
        .iter()
        .filter(|e| now_ms.saturating_sub(e.timestamp_created) > max_age_ms)
        .map(|e| e.id.clone())
        .collect()
}
