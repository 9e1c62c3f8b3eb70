//! OHLC(V) bar representation.

use chrono::NaiveDateTime;

use super::error::StratTestError;

/// Canonical timestamp format used for parsing and reporting.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One bar, identified by its period-end timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

impl Bar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// A bar whose close is below its open.
    pub fn is_down(&self) -> bool {
        self.close < self.open
    }

    /// A bar whose close is above its open.
    pub fn is_up(&self) -> bool {
        self.close > self.open
    }
}

/// Fails unless timestamps are strictly increasing.
pub fn ensure_strictly_increasing<I>(timestamps: I) -> Result<(), StratTestError>
where
    I: IntoIterator<Item = NaiveDateTime>,
{
    let mut prev: Option<NaiveDateTime> = None;
    for (index, ts) in timestamps.into_iter().enumerate() {
        if let Some(p) = prev {
            if ts <= p {
                return Err(StratTestError::UnorderedInput {
                    index,
                    timestamp: format_timestamp(ts),
                });
            }
        }
        prev = Some(ts);
    }
    Ok(())
}

/// Parse `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or a bare date (midnight).
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M"))
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> Bar {
        Bar {
            timestamp: parse_timestamp("2024-01-15 10:30:00").unwrap(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: Some(50_000.0),
        }
    }

    #[test]
    fn true_range_hl_dominates() {
        let bar = sample_bar();
        assert!((bar.true_range(100.0) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bar = sample_bar();
        // high-low=20, |110-70|=40, |90-70|=20 → 40
        assert!((bar.true_range(70.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_down() {
        let bar = sample_bar();
        assert!((bar.true_range(130.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn direction_helpers() {
        let bar = sample_bar();
        assert!(bar.is_up());
        assert!(!bar.is_down());
    }

    #[test]
    fn parse_timestamp_variants() {
        let full = parse_timestamp("2024-03-01 12:30:00").unwrap();
        assert_eq!(parse_timestamp("2024-03-01T12:30:00"), Some(full));
        assert_eq!(parse_timestamp("2024-03-01 12:30"), Some(full));
        assert_eq!(
            parse_timestamp("2024-03-01"),
            parse_timestamp("2024-03-01 00:00:00")
        );
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn strictly_increasing_accepts_ordered() {
        let ts = ["2024-01-01", "2024-01-02", "2024-01-03"]
            .iter()
            .map(|s| parse_timestamp(s).unwrap());
        assert!(ensure_strictly_increasing(ts).is_ok());
    }

    #[test]
    fn strictly_increasing_rejects_duplicates() {
        let ts = ["2024-01-01", "2024-01-02", "2024-01-02"]
            .iter()
            .map(|s| parse_timestamp(s).unwrap());
        let err = ensure_strictly_increasing(ts).unwrap_err();
        assert!(matches!(err, StratTestError::UnorderedInput { index: 2, .. }));
    }
}
