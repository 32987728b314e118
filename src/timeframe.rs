use crate::error::{Result, SimulationError};
use crate::models::{Period, Quadrant, Season};
use chrono::{Datelike, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::sync::OnceLock;

fn window_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})h(\d{2})-(\d{1,2})h(\d{2})$").unwrap())
}

/// One off-peak window with inclusive bounds on both ends.
///
/// When `start >= end` the window wraps past midnight and covers
/// `[start, 24h)` plus `[00h, end]`; an equal pair therefore covers the
/// whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HcWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl HcWindow {
    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start < self.end {
            self.start <= t && t <= self.end
        } else {
            t >= self.start || t <= self.end
        }
    }
}

/// High season runs November through March.
pub fn season_of(timestamp: NaiveDateTime) -> Season {
    let month = timestamp.month();
    if month < 4 || month > 10 {
        Season::High
    } else {
        Season::Low
    }
}

/// Assigns season, period and quadrant to timestamps, given the meter's
/// off-peak windows.
#[derive(Debug)]
pub struct IntervalClassifier {
    windows: Vec<HcWindow>,
}

impl IntervalClassifier {
    /// Parses a window spec like `"22h00-06h00;12h00-14h00"`.
    ///
    /// Spaces and parentheses are stripped first (distributors print both),
    /// empty segments are skipped, and any remaining token that does not
    /// match `HHhMM-HHhMM` with a valid time of day is rejected.
    pub fn from_spec(spec: &str) -> Result<Self> {
        let cleaned: String = spec
            .chars()
            .filter(|c| !matches!(c, ' ' | '(' | ')'))
            .collect();

        let mut windows = Vec::new();
        for token in cleaned.split(';') {
            if token.is_empty() {
                continue;
            }
            windows.push(parse_window_token(token)?);
        }
        Ok(Self { windows })
    }

    pub fn windows(&self) -> &[HcWindow] {
        &self.windows
    }

    /// Off-peak if the time of day falls inside any window; with no windows
    /// every timestamp is peak.
    pub fn period_of(&self, time: NaiveTime) -> Period {
        if self.windows.iter().any(|w| w.contains(time)) {
            Period::OffPeak
        } else {
            Period::Peak
        }
    }

    pub fn classify(&self, timestamp: NaiveDateTime) -> (Season, Period, Quadrant) {
        let season = season_of(timestamp);
        let period = self.period_of(timestamp.time());
        (season, period, Quadrant::from_parts(period, season))
    }
}

fn parse_window_token(token: &str) -> Result<HcWindow> {
    let reject = || SimulationError::WindowFormat(token.to_string());

    let caps = window_token_re().captures(token).ok_or_else(reject)?;
    let field = |i: usize| caps[i].parse::<u32>().map_err(|_| reject());

    let start = NaiveTime::from_hms_opt(field(1)?, field(2)?, 0).ok_or_else(reject)?;
    let end = NaiveTime::from_hms_opt(field(3)?, field(4)?, 0).ok_or_else(reject)?;
    Ok(HcWindow { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_season_split_by_month() {
        assert_eq!(season_of(ts("2025-01-15 12:00:00")), Season::High);
        assert_eq!(season_of(ts("2025-03-31 23:59:00")), Season::High);
        assert_eq!(season_of(ts("2025-04-01 00:00:00")), Season::Low);
        assert_eq!(season_of(ts("2025-10-31 12:00:00")), Season::Low);
        assert_eq!(season_of(ts("2025-11-01 00:00:00")), Season::High);
    }

    #[test]
    fn test_midnight_wrap_window() {
        let classifier = IntervalClassifier::from_spec("22h00-06h00").unwrap();

        // January night reading lands in HCH, midday in HPH
        assert_eq!(
            classifier.classify(ts("2025-01-10 23:00:00")).2,
            Quadrant::Hch
        );
        assert_eq!(
            classifier.classify(ts("2025-01-10 12:00:00")).2,
            Quadrant::Hph
        );

        // Early morning is still inside the wrapped window
        assert_eq!(classifier.period_of(t(3, 30)), Period::OffPeak);
        assert_eq!(classifier.period_of(t(6, 30)), Period::Peak);
    }

    #[test]
    fn test_window_boundaries_are_inclusive() {
        let classifier = IntervalClassifier::from_spec("22h00-06h00").unwrap();
        assert_eq!(classifier.period_of(t(22, 0)), Period::OffPeak);
        assert_eq!(classifier.period_of(t(6, 0)), Period::OffPeak);
        assert_eq!(classifier.period_of(t(21, 59)), Period::Peak);
        assert_eq!(classifier.period_of(t(6, 1)), Period::Peak);

        let plain = IntervalClassifier::from_spec("12h00-14h00").unwrap();
        assert_eq!(plain.period_of(t(12, 0)), Period::OffPeak);
        assert_eq!(plain.period_of(t(14, 0)), Period::OffPeak);
        assert_eq!(plain.period_of(t(14, 1)), Period::Peak);
    }

    #[test]
    fn test_equal_bounds_cover_whole_day() {
        let classifier = IntervalClassifier::from_spec("05h00-05h00").unwrap();
        for hour in 0..24 {
            assert_eq!(classifier.period_of(t(hour, 17)), Period::OffPeak);
        }
    }

    #[test]
    fn test_spec_cleanup_and_multiple_windows() {
        let classifier =
            IntervalClassifier::from_spec("(22h30 - 06h30); (12h00-14h00);").unwrap();
        assert_eq!(classifier.windows().len(), 2);
        assert_eq!(classifier.period_of(t(13, 0)), Period::OffPeak);
        assert_eq!(classifier.period_of(t(23, 0)), Period::OffPeak);
        assert_eq!(classifier.period_of(t(11, 0)), Period::Peak);

        // Single-digit hours are accepted
        let short = IntervalClassifier::from_spec("2h00-6h00").unwrap();
        assert_eq!(short.period_of(t(3, 0)), Period::OffPeak);
    }

    #[test]
    fn test_empty_spec_means_always_peak() {
        let classifier = IntervalClassifier::from_spec("").unwrap();
        assert_eq!(classifier.windows().len(), 0);
        assert_eq!(classifier.period_of(t(2, 0)), Period::Peak);
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        for bad in [
            "22h00/06h00",
            "22h00-",
            "25h00-06h00",
            "22h61-06h00",
            "2200-0600",
            "22h0-06h00",
        ] {
            let err = IntervalClassifier::from_spec(bad).unwrap_err();
            assert!(
                matches!(err, SimulationError::WindowFormat(_)),
                "expected WindowFormat for {:?}, got {:?}",
                bad,
                err
            );
        }
    }
}
