use std::collections::HashMap;
use std::sync::Arc;

use time::{Duration, OffsetDateTime, UtcOffset};

use crate::dates::midnight_ts;
use crate::domains::event::EventKind;
use crate::error::Result;
use crate::ledger::EventLedger;

/// A civil-calendar aggregation range, computed in the configured UTC
/// offset rather than UTC: the org records across one working day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Today,
    Trailing7Days,
    MonthToDate,
}

impl Window {
    /// Half-open unix-second range `[start, end)` for the civil day(s)
    /// this window covers at `now`.
    pub fn bounds(self, now: OffsetDateTime, offset: UtcOffset) -> (i64, i64) {
        let today = now.to_offset(offset).date();
        let end = midnight_ts(today.next_day().unwrap_or(today), offset);
        let start = match self {
            Window::Today => midnight_ts(today, offset),
            Window::Trailing7Days => midnight_ts(today - Duration::days(6), offset),
            Window::MonthToDate => midnight_ts(today.replace_day(1).unwrap_or(today), offset),
        };
        (start, end)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    pub daily_sets: i64,
    pub weekly_closes: i64,
    pub monthly_closes: i64,
    pub monthly_installs: i64,
    /// (actor id, sets today), ranked; ties keep first-appearance order.
    pub leaderboard: Vec<(String, i64)>,
}

/// Read-only rollups over the ledger. No caching: every call re-scans,
/// which is fine at a few hundred rows a day and keeps results fresh.
#[derive(Clone)]
pub struct StatsAggregator {
    ledger: Arc<EventLedger>,
    offset: UtcOffset,
}

impl StatsAggregator {
    pub fn new(ledger: Arc<EventLedger>, offset: UtcOffset) -> Self {
        Self { ledger, offset }
    }

    pub async fn count_in_window(&self, kind: EventKind, window: Window) -> Result<i64> {
        self.count_in_window_at(kind, window, OffsetDateTime::now_utc())
            .await
    }

    /// `Today` for sets is judged by the business `set_at`; every other
    /// (kind, window) pair by ledger insertion time.
    pub async fn count_in_window_at(
        &self,
        kind: EventKind,
        window: Window,
        now: OffsetDateTime,
    ) -> Result<i64> {
        let (start, end) = window.bounds(now, self.offset);
        if kind == EventKind::Set && window == Window::Today {
            self.ledger.count_sets_between(start, end).await
        } else {
            self.ledger.count_created_between(kind, start, end).await
        }
    }

    pub async fn top_setters_today(&self, limit: usize) -> Result<Vec<(String, i64)>> {
        self.top_setters_today_at(limit, OffsetDateTime::now_utc())
            .await
    }

    pub async fn top_setters_today_at(
        &self,
        limit: usize,
        now: OffsetDateTime,
    ) -> Result<Vec<(String, i64)>> {
        let (start, end) = Window::Today.bounds(now, self.offset);
        let rows = self.ledger.list_sets_between(start, end).await?;

        // Fold in id order and stable-sort so ties rank by first
        // appearance; SQL GROUP BY leaves tie order unspecified.
        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<String, i64> = HashMap::new();
        for row in rows {
            if !counts.contains_key(&row.actor_id) {
                order.push(row.actor_id.clone());
            }
            *counts.entry(row.actor_id).or_insert(0) += 1;
        }
        let mut ranked: Vec<(String, i64)> = order
            .into_iter()
            .map(|actor| {
                let count = counts.get(&actor).copied().unwrap_or(0);
                (actor, count)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(limit);
        Ok(ranked)
    }

    pub async fn snapshot(&self) -> Result<StatsSnapshot> {
        self.snapshot_at(OffsetDateTime::now_utc()).await
    }

    pub async fn snapshot_at(&self, now: OffsetDateTime) -> Result<StatsSnapshot> {
        Ok(StatsSnapshot {
            daily_sets: self
                .count_in_window_at(EventKind::Set, Window::Today, now)
                .await?,
            weekly_closes: self
                .count_in_window_at(EventKind::Closed, Window::Trailing7Days, now)
                .await?,
            monthly_closes: self
                .count_in_window_at(EventKind::Closed, Window::MonthToDate, now)
                .await?,
            monthly_installs: self
                .count_in_window_at(EventKind::InstallScheduled, Window::MonthToDate, now)
                .await?,
            leaderboard: self.top_setters_today_at(10, now).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn window_bounds_follow_the_civil_day() {
        let offset = UtcOffset::from_hms(-5, 0, 0).unwrap();
        // 01:30 UTC on the 6th is still the evening of the 5th locally.
        let now = datetime!(2024-07-06 01:30 UTC);
        let (start, end) = Window::Today.bounds(now, offset);
        assert_eq!(start, datetime!(2024-07-05 00:00 -5).unix_timestamp());
        assert_eq!(end, datetime!(2024-07-06 00:00 -5).unix_timestamp());

        let (start, _) = Window::Trailing7Days.bounds(now, offset);
        assert_eq!(start, datetime!(2024-06-29 00:00 -5).unix_timestamp());

        let (start, _) = Window::MonthToDate.bounds(now, offset);
        assert_eq!(start, datetime!(2024-07-01 00:00 -5).unix_timestamp());
    }
}
