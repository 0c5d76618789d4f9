//! Search tracking records and the aggregate views computed over them.
//!
//! The aggregation functions are pure so that any store holding
//! [`SearchRecord`]s can reuse them.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One tracked search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub query: String,
    pub search_type: String,
    pub results_count: usize,
    /// Ids of the documents returned, used to detect orphaned records.
    #[serde(default)]
    pub result_ids: Vec<String>,
    pub execution_time_ms: u64,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyticsOverview {
    pub total_searches: usize,
    pub unique_queries: usize,
    pub avg_results_per_search: f64,
    pub avg_execution_time: f64,
    pub search_types: BTreeMap<String, usize>,
    pub searches_with_results: usize,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

impl HistoryFilter {
    fn matches(&self, record: &SearchRecord) -> bool {
        let user_ok = self
            .user_id
            .as_ref()
            .is_none_or(|u| record.user_id.as_ref() == Some(u));
        let session_ok = self
            .session_id
            .as_ref()
            .is_none_or(|s| record.session_id.as_ref() == Some(s));
        user_ok && session_ok
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingQuery {
    pub query: String,
    pub count: usize,
    pub avg_results: f64,
    pub last_searched: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanupReport {
    /// Records whose returned documents have all since been deleted.
    pub orphaned_count: usize,
    /// Records that returned nothing.
    pub unused_count: usize,
    pub dry_run: bool,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.orphaned_count + self.unused_count
    }
}

/// Start of a `days`-long window ending at `now`. Windows reaching past the
/// earliest representable instant cover all time.
fn cutoff(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(days))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn query_key(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Summarize searches made within the last `days` days.
pub fn overview(
    records: &[SearchRecord],
    now: DateTime<Utc>,
    days: u32,
) -> AnalyticsOverview {
    let since = cutoff(now, days);
    let window: Vec<&SearchRecord> =
        records.iter().filter(|r| r.created_at >= since).collect();

    if window.is_empty() {
        return AnalyticsOverview::default();
    }

    let total = window.len();
    let mut search_types = BTreeMap::new();
    let mut unique = std::collections::HashSet::new();
    let mut results_sum = 0usize;
    let mut time_sum = 0u64;
    let mut with_results = 0usize;

    for r in &window {
        *search_types.entry(r.search_type.clone()).or_insert(0) += 1;
        unique.insert(query_key(&r.query));
        results_sum += r.results_count;
        time_sum += r.execution_time_ms;
        if r.results_count > 0 {
            with_results += 1;
        }
    }

    AnalyticsOverview {
        total_searches: total,
        unique_queries: unique.len(),
        avg_results_per_search: round2(results_sum as f64 / total as f64),
        avg_execution_time: round2(time_sum as f64 / total as f64),
        search_types,
        searches_with_results: with_results,
    }
}

/// Most recent searches first, optionally restricted to a user or session.
pub fn history(
    records: &[SearchRecord],
    limit: usize,
    filter: &HistoryFilter,
) -> Vec<SearchRecord> {
    let mut matching: Vec<SearchRecord> =
        records.iter().filter(|r| filter.matches(r)).cloned().collect();
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    matching.truncate(limit);
    matching
}

/// Queries ranked by how often they were searched in the last `days` days.
///
/// Queries are grouped case-insensitively. Ties break on recency.
pub fn trending(
    records: &[SearchRecord],
    now: DateTime<Utc>,
    limit: usize,
    days: u32,
) -> Vec<TrendingQuery> {
    let since = cutoff(now, days);
    let mut groups: HashMap<String, (usize, usize, DateTime<Utc>)> =
        HashMap::new();

    for r in records.iter().filter(|r| r.created_at >= since) {
        let entry = groups
            .entry(query_key(&r.query))
            .or_insert((0, 0, r.created_at));
        entry.0 += 1;
        entry.1 += r.results_count;
        entry.2 = entry.2.max(r.created_at);
    }

    let mut trending: Vec<TrendingQuery> = groups
        .into_iter()
        .map(|(query, (count, results, last))| TrendingQuery {
            query,
            count,
            avg_results: round2(results as f64 / count as f64),
            last_searched: last,
        })
        .collect();

    trending.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| b.last_searched.cmp(&a.last_searched))
    });
    trending.truncate(limit);
    trending
}

/// Pick the records older than `days` days that are orphaned or unused.
///
/// Returns the keys to delete alongside the report; the caller decides
/// whether to act on them.
pub fn cleanup_candidates<K: Copy>(
    records: &[(K, SearchRecord)],
    now: DateTime<Utc>,
    days: u32,
    document_exists: impl Fn(&str) -> bool,
) -> (Vec<K>, CleanupReport) {
    let before = cutoff(now, days);
    let mut keys = Vec::new();
    let mut report = CleanupReport::default();

    for (key, record) in records.iter().filter(|(_, r)| r.created_at < before)
    {
        if record.results_count == 0 {
            report.unused_count += 1;
            keys.push(*key);
        } else if !record.result_ids.is_empty()
            && !record.result_ids.iter().any(|id| document_exists(id))
        {
            report.orphaned_count += 1;
            keys.push(*key);
        }
    }

    (keys, report)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
