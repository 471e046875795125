//! Time window calculation
//!
//! Each run covers one block of history, counted back from now: block 1 is
//! the most recent block, block 2 the one before it, and so on. Fractional
//! indices are allowed so overlapping catch-up runs can be scheduled. The
//! window is computed and validated before any network or database activity.

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, SubsecRound, Utc};

/// An immutable `[start, end)` UTC pair for one run. `start` lies further
/// back in time than `end`, and `end` is never in the future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Derive the window for `block_index` blocks back from `now`.
    ///
    /// The caller must supply an index yielding a span that lies entirely in
    /// the past; anything else is a configuration error.
    pub fn from_block_index(block_index: f64, block_hours: f64, now: DateTime<Utc>) -> Result<Self> {
        let hours_back_start = block_hours * block_index;
        let hours_back_end = block_hours * (block_index - 1.0);

        if !(hours_back_start > hours_back_end) {
            bail!(
                "window start must lie further back than its end \
                 (block index {block_index} with {block_hours} block hours)"
            );
        }
        if !(hours_back_end >= 0.0) {
            bail!(
                "window end must not lie in the future \
                 (block index {block_index} puts it {:.1} hours ahead)",
                -hours_back_end
            );
        }

        Ok(Self {
            start: instant_hours_back(now, hours_back_start),
            end: instant_hours_back(now, hours_back_end),
        })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Window start formatted for the reports API query string
    pub fn start_param(&self) -> String {
        format_instant(self.start)
    }

    /// Window end formatted for the reports API query string
    pub fn end_param(&self) -> String {
        format_instant(self.end)
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }
}

fn instant_hours_back(now: DateTime<Utc>, hours: f64) -> DateTime<Utc> {
    (now - Duration::milliseconds((hours * 3_600_000.0).round() as i64)).trunc_subsecs(0)
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_block_spans_exactly_one_block() {
        let now = Utc::now();
        let window = TimeWindow::from_block_index(1.0, 256.0, now).unwrap();
        assert_eq!(window.span(), Duration::hours(256));
        assert!(window.start() < window.end());
        assert!(window.end() <= now);
    }

    #[test]
    fn test_second_block_ends_where_the_first_starts() {
        let now = Utc::now();
        let first = TimeWindow::from_block_index(1.0, 256.0, now).unwrap();
        let second = TimeWindow::from_block_index(2.0, 256.0, now).unwrap();
        assert_eq!(second.end(), first.start());
        assert_eq!(second.span(), Duration::hours(256));
    }

    #[test]
    fn test_fractional_index_is_allowed() {
        let now = Utc::now();
        let window = TimeWindow::from_block_index(1.5, 256.0, now).unwrap();
        assert_eq!(window.span(), Duration::hours(256));
        assert!(window.end() <= now);
    }

    #[test]
    fn test_shorter_block_hours_can_be_injected() {
        let now = Utc::now();
        let window = TimeWindow::from_block_index(1.0, 8.0, now).unwrap();
        assert_eq!(window.span(), Duration::hours(8));
    }

    #[test]
    fn test_index_below_one_is_rejected() {
        let err = TimeWindow::from_block_index(0.5, 256.0, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("future"));
    }

    #[test]
    fn test_nan_index_is_rejected() {
        assert!(TimeWindow::from_block_index(f64::NAN, 256.0, Utc::now()).is_err());
    }

    #[test]
    fn test_instants_are_truncated_to_whole_seconds() {
        let now = Utc::now();
        let window = TimeWindow::from_block_index(1.0, 256.0, now).unwrap();
        assert_eq!(window.start().timestamp_subsec_nanos(), 0);
        assert_eq!(window.end().timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_query_parameter_format() {
        let now = DateTime::parse_from_rfc3339("2024-03-10T12:30:45.500Z")
            .unwrap()
            .with_timezone(&Utc);
        let window = TimeWindow::from_block_index(1.0, 24.0, now).unwrap();
        assert_eq!(window.end_param(), "2024-03-10T12:30:45Z");
        assert_eq!(window.start_param(), "2024-03-09T12:30:45Z");
    }
}
