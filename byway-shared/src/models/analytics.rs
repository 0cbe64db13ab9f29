/// Creation-count rollups over the last twelve 28-day windows
///
/// Windows are anchored at the next UTC midnight so the most recent one
/// includes everything created today. They are returned oldest first.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Number of windows in a rollup
pub const WINDOW_COUNT: i64 = 12;

/// Length of one window in days
pub const WINDOW_DAYS: i64 = 28;

/// Table a rollup counts rows from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsSource {
    Users,
    Courses,
    Orders,
}

impl AnalyticsSource {
    fn table(&self) -> &'static str {
        match self {
            AnalyticsSource::Users => "users",
            AnalyticsSource::Courses => "courses",
            AnalyticsSource::Orders => "orders",
        }
    }
}

/// Half-open `[start, end)` time window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// Label shown to clients, e.g. `"7 Mar 2025"`
    pub fn label(&self) -> String {
        self.end.format("%-d %b %Y").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthCount {
    pub month: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Last12Months {
    #[serde(rename = "last12Months")]
    pub last_12_months: Vec<MonthCount>,
}

/// Computes the twelve windows ending at the UTC midnight after `now`
pub fn windows(now: DateTime<Utc>) -> Vec<Window> {
    let tomorrow = (now + Duration::days(1)).date_naive();
    let anchor = tomorrow.and_time(chrono::NaiveTime::MIN).and_utc();

    (0..WINDOW_COUNT)
        .rev()
        .map(|i| {
            let end = anchor - Duration::days(WINDOW_DAYS * i);
            Window {
                start: end - Duration::days(WINDOW_DAYS),
                end,
            }
        })
        .collect()
}

/// Counts rows of `source` created within each window ending after `now`
pub async fn last_12_months(
    pool: &PgPool,
    source: AnalyticsSource,
    now: DateTime<Utc>,
) -> Result<Last12Months, sqlx::Error> {
    let query = format!(
        "SELECT COUNT(*) FROM {} WHERE created_at >= $1 AND created_at < $2",
        source.table()
    );

    let mut last_12_months = Vec::with_capacity(WINDOW_COUNT as usize);

    for window in windows(now) {
        let count: i64 = sqlx::query_scalar(&query)
            .bind(window.start)
            .bind(window.end)
            .fetch_one(pool)
            .await?;

        last_12_months.push(MonthCount {
            month: window.label(),
            count,
        });
    }

    Ok(Last12Months { last_12_months })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_twelve_contiguous_windows_oldest_first() {
        let now = Utc.with_ymd_and_hms(2025, 6, 16, 14, 30, 0).unwrap();
        let ws = windows(now);

        assert_eq!(ws.len(), 12);
        assert_eq!(ws[11].end, Utc.with_ymd_and_hms(2025, 6, 17, 0, 0, 0).unwrap());

        for pair in ws.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        for w in &ws {
            assert_eq!(w.end - w.start, Duration::days(28));
        }
    }

    #[test]
    fn test_window_labels() {
        let now = Utc.with_ymd_and_hms(2025, 3, 6, 23, 59, 59).unwrap();
        let ws = windows(now);

        assert_eq!(ws[11].label(), "7 Mar 2025");
        assert_eq!(ws[10].label(), "7 Feb 2025");
    }

    #[test]
    fn test_rollup_serializes_with_camel_case_key() {
        let rollup = Last12Months {
            last_12_months: vec![MonthCount {
                month: "7 Mar 2025".into(),
                count: 3,
            }],
        };

        let json = serde_json::to_value(&rollup).unwrap();
        assert_eq!(json["last12Months"][0]["count"], 3);
    }
}
