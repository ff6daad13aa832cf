//! Multi-shard series access
//!
//! [`MetaStore`] presents every shard of one signal (the live file plus any
//! monthly backups) as a single logical time series. Shards are discovered
//! through a [`ShardLocator`], opened lazily, and cached for the lifetime
//! of the store; an open shard is treated as immutable from then on.
//!
//! Shards that cannot be opened are skipped: a missing or empty file is a
//! normal condition logged quietly, a corrupt file is logged as a warning.
//! Neither ever aborts a multi-shard query.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::merge::KWayMerge;
use crate::record::{Record, RecordLayout};
use crate::shard::{GroupCursor, ShardFile, ShardLocator, ShardPeriod, TimestampSearch};

/// Deduplicated union of per-shard record groups.
///
/// The same sample archived into two shards must surface once, while a
/// record legitimately duplicated *within* one shard is a real repeated
/// sample and keeps its multiplicity. Each distinct record therefore
/// appears as often as its largest per-shard count, in first-seen order.
/// With a single source the input passes through unchanged.
fn union_groups(groups: Vec<Vec<Record>>) -> Vec<Record> {
    let mut union_counts: HashMap<(i64, u64, u32), usize> = HashMap::new();
    let mut result = Vec::new();
    for group in groups {
        let mut source_counts: HashMap<(i64, u64, u32), usize> = HashMap::new();
        for record in group {
            let key = record.dedup_key();
            let in_source = source_counts.entry(key).or_insert(0);
            *in_source += 1;
            let in_union = union_counts.entry(key).or_insert(0);
            if *in_source > *in_union {
                *in_union = *in_source;
                result.push(record);
            }
        }
    }
    result
}

/// All shards of one signal, presented as one logical series
pub struct MetaStore {
    locator: Arc<dyn ShardLocator>,
    layout: RecordLayout,
    /// Per-session shard cache. `None` records a shard that failed to
    /// open, so it is not retried within this session.
    open_shards: RwLock<HashMap<(String, ShardPeriod), Option<ShardFile>>>,
}

impl MetaStore {
    /// Create a store over the given locator and record layout
    pub fn new(locator: Arc<dyn ShardLocator>, layout: RecordLayout) -> Self {
        Self {
            locator,
            layout,
            open_shards: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store for the standard directory layout of a configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(Arc::new(config.locator()), config.layout)
    }

    /// Monthly backup periods in calendar order, followed by the live
    /// period
    fn sources(&self) -> Vec<ShardPeriod> {
        let mut periods = self.locator.backup_periods();
        periods.push(ShardPeriod::Live);
        periods
    }

    /// Open (or fetch the cached) shard of `signal` for `period`.
    ///
    /// Returns `None` when the shard is missing, empty, or unreadable;
    /// the outcome is cached so each shard is attempted once per session.
    fn shard(&self, signal: &str, period: ShardPeriod) -> Option<ShardFile> {
        let key = (signal.to_string(), period);
        if let Some(cached) = self.open_shards.read().get(&key) {
            return cached.clone();
        }

        let path = self.locator.shard_path(signal, period);
        let opened = match ShardFile::open(&path, self.layout) {
            Ok(shard) => Some(shard),
            Err(e) if e.is_missing_shard() || e.is_empty_shard() => {
                debug!(signal, period = %period, "shard unavailable: {}", e);
                None
            }
            Err(e) => {
                warn!(signal, period = %period, "skipping unreadable shard: {}", e);
                None
            }
        };

        self.open_shards.write().insert(key, opened.clone());
        opened
    }

    /// Earliest timestamp of the signal across every openable shard
    pub fn first_timestamp(&self, signal: &str) -> Option<i64> {
        self.sources()
            .into_iter()
            .filter_map(|period| self.shard(signal, period))
            .map(|shard| shard.first_timestamp())
            .min()
    }

    /// Latest timestamp of the signal across every openable shard
    pub fn last_timestamp(&self, signal: &str) -> Option<i64> {
        self.sources()
            .into_iter()
            .filter_map(|period| self.shard(signal, period))
            .map(|shard| shard.last_timestamp())
            .max()
    }

    /// Locate `t` across every shard of the signal.
    ///
    /// Exact hits from all shards whose period could contain `t` are
    /// unioned and deduplicated. Otherwise the latest `before` and
    /// earliest `after` groups win across shards, ties unioned. The walk
    /// starts at the live shard and the period containing `t`, then moves
    /// outward through the backup months, stopping once no remaining
    /// month could improve on the best hit; shards are never opened
    /// unconditionally.
    pub fn query(&self, signal: &str, t: i64) -> TimestampSearch {
        let sources = self.sources();

        let mut exact: Vec<Vec<Record>> = Vec::new();
        for &period in sources.iter().filter(|p| p.may_contain(t)) {
            if let Some(shard) = self.shard(signal, period) {
                if let TimestampSearch::Exact(records) = shard.query(t) {
                    exact.push(records);
                }
            }
        }
        if !exact.is_empty() {
            return TimestampSearch::Exact(union_groups(exact));
        }

        let months: Vec<ShardPeriod> = sources
            .iter()
            .copied()
            .filter(|p| !matches!(p, ShardPeriod::Live))
            .collect();

        let live_result = self
            .shard(signal, ShardPeriod::Live)
            .map(|shard| shard.query(t));

        let before = self.best_before(signal, t, live_result.as_ref(), &months);
        let after = self.best_after(signal, t, live_result.as_ref(), &months);

        TimestampSearch::Neighbors { before, after }
    }

    /// Latest group strictly before `t`: seed from the live shard, then
    /// walk months newest-first while they can still improve the hit
    fn best_before(
        &self,
        signal: &str,
        t: i64,
        live_result: Option<&TimestampSearch>,
        months: &[ShardPeriod],
    ) -> Vec<Record> {
        let mut best: Option<(i64, Vec<Vec<Record>>)> = None;
        if let Some(result) = live_result {
            Self::merge_candidate(&mut best, result.before(), |ts, best_ts| ts > best_ts);
        }

        for &period in months.iter().rev() {
            if let Some((start, end)) = period.bounds() {
                // Nominally all of this month's data is at or after `t`
                if start >= t {
                    continue;
                }
                // Every remaining month is older than the best hit
                if let Some((best_ts, _)) = best {
                    if end <= best_ts {
                        break;
                    }
                }
            }
            if let Some(shard) = self.shard(signal, period) {
                Self::merge_candidate(&mut best, shard.query(t).before(), |ts, best_ts| {
                    ts > best_ts
                });
            }
        }

        best.map(|(_, groups)| union_groups(groups)).unwrap_or_default()
    }

    /// Earliest group strictly after `t`: seed from the live shard, then
    /// walk months oldest-first while they can still improve the hit
    fn best_after(
        &self,
        signal: &str,
        t: i64,
        live_result: Option<&TimestampSearch>,
        months: &[ShardPeriod],
    ) -> Vec<Record> {
        let mut best: Option<(i64, Vec<Vec<Record>>)> = None;
        if let Some(result) = live_result {
            Self::merge_candidate(&mut best, result.after(), |ts, best_ts| ts < best_ts);
        }

        for &period in months.iter() {
            if let Some((start, end)) = period.bounds() {
                // Nominally all of this month's data is at or before `t`
                if end <= t + 1 {
                    continue;
                }
                // Every remaining month is newer than the best hit
                if let Some((best_ts, _)) = best {
                    if start > best_ts {
                        break;
                    }
                }
            }
            if let Some(shard) = self.shard(signal, period) {
                Self::merge_candidate(&mut best, shard.query(t).after(), |ts, best_ts| {
                    ts < best_ts
                });
            }
        }

        best.map(|(_, groups)| union_groups(groups)).unwrap_or_default()
    }

    /// Fold one shard's candidate group into the best hit so far:
    /// `wins` decides whether a new timestamp replaces the current best,
    /// equal timestamps accumulate for the deduplicated union
    fn merge_candidate(
        best: &mut Option<(i64, Vec<Vec<Record>>)>,
        group: &[Record],
        wins: impl Fn(i64, i64) -> bool,
    ) {
        let Some(first) = group.first() else { return };
        let ts = first.timestamp;
        match best {
            Some((best_ts, groups)) => {
                if wins(ts, *best_ts) {
                    *best_ts = ts;
                    *groups = vec![group.to_vec()];
                } else if ts == *best_ts {
                    groups.push(group.to_vec());
                }
            }
            None => *best = Some((ts, vec![group.to_vec()])),
        }
    }

    /// Lazy, globally time-ordered stream of equal-timestamp groups
    /// across every shard of the signal.
    ///
    /// A streaming k-way merge keeps one cursor per open shard, so memory
    /// is bounded by the number of open sources rather than the record
    /// count. Months whose calendar range lies entirely outside
    /// `[start, stop]` are pruned before being opened.
    pub fn groups(
        &self,
        signal: &str,
        start: Option<i64>,
        stop: Option<i64>,
    ) -> impl Iterator<Item = (i64, Vec<Record>)> {
        let mut cursors: Vec<GroupCursor> = Vec::new();
        for period in self.sources() {
            if let Some((p_start, p_end)) = period.bounds() {
                if start.is_some_and(|s| p_end <= s) {
                    continue;
                }
                if stop.is_some_and(|s| p_start > s) {
                    continue;
                }
            }
            if let Some(shard) = self.shard(signal, period) {
                cursors.push(shard.groups_between(start, stop));
            }
        }

        KWayMerge::new(cursors).map(|(ts, groups)| (ts, union_groups(groups)))
    }
}
