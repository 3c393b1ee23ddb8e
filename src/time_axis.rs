//! Time axis and time selection
//!
//! A [`TimeAxis`] is the strictly increasing sequence of UTC timestamps a
//! resource collection is indexed by. [`TimeSelector`] describes which part of
//! that axis a caller wants and resolves to positional indices.

use crate::errors::{ExtractError, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::ops::Range;

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a timestamp string as UTC.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`,
/// `YYYY-MM-DD HH:MM` and bare dates (midnight).
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(ExtractError::InvalidTimestamp {
        value: s.to_string(),
    })
}

/// Convert seconds since the Unix epoch to a UTC timestamp
pub fn from_epoch_seconds(seconds: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
        ExtractError::configuration(format!("Epoch seconds {seconds} are out of range"))
    })
}

/// Ordered, strictly increasing sequence of timestamps
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimeAxis {
    steps: Vec<DateTime<Utc>>,
}

impl TimeAxis {
    /// Build a time axis, rejecting unsorted or duplicated timestamps
    pub fn new(steps: Vec<DateTime<Utc>>) -> Result<Self> {
        if let Some(pos) = steps.windows(2).position(|w| w[0] >= w[1]) {
            return Err(ExtractError::configuration(format!(
                "Time axis is not strictly increasing at position {}: {} >= {}",
                pos + 1,
                steps[pos],
                steps[pos + 1]
            )));
        }
        Ok(Self { steps })
    }

    /// Regularly spaced axis starting at `start`
    pub fn regular(start: DateTime<Utc>, step: chrono::Duration, len: usize) -> Result<Self> {
        if step <= chrono::Duration::zero() && len > 1 {
            return Err(ExtractError::configuration("Time step must be positive"));
        }
        let steps = (0..len as i32).map(|i| start + step * i).collect();
        Ok(Self { steps })
    }

    /// Build from seconds since the Unix epoch
    pub fn from_epoch_seconds(seconds: &[i64]) -> Result<Self> {
        let steps = seconds
            .iter()
            .map(|&s| from_epoch_seconds(s))
            .collect::<Result<Vec<_>>>()?;
        Self::new(steps)
    }

    /// Concatenate axes in the given order, the result must stay strictly increasing
    pub fn concat<'a>(axes: impl IntoIterator<Item = &'a TimeAxis>) -> Result<Self> {
        let steps = axes
            .into_iter()
            .flat_map(|a| a.steps.iter().copied())
            .collect();
        Self::new(steps)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn first(&self) -> Option<DateTime<Utc>> {
        self.steps.first().copied()
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.steps.last().copied()
    }

    pub fn get(&self, index: usize) -> Option<DateTime<Utc>> {
        self.steps.get(index).copied()
    }

    pub fn as_slice(&self) -> &[DateTime<Utc>] {
        &self.steps
    }

    pub fn iter(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.steps.iter()
    }

    /// Seconds since the Unix epoch for every step
    pub fn to_epoch_seconds(&self) -> Vec<i64> {
        self.steps.iter().map(|t| t.timestamp()).collect()
    }

    /// Position of an exact timestamp match
    pub fn locate(&self, timestamp: &DateTime<Utc>) -> Result<usize> {
        self.steps
            .binary_search(timestamp)
            .map_err(|_| ExtractError::TimestampNotFound {
                timestamp: timestamp.to_rfc3339(),
            })
    }

    /// Positions of the steps inside the inclusive interval
    pub fn span(&self, start: &DateTime<Utc>, end: &DateTime<Utc>) -> Range<usize> {
        let lo = self.steps.partition_point(|t| t < start);
        let hi = self.steps.partition_point(|t| t <= end);
        lo..hi.max(lo)
    }

    /// Labels for a list of positions
    pub fn labels(&self, indices: &[usize]) -> Vec<DateTime<Utc>> {
        indices.iter().filter_map(|&i| self.get(i)).collect()
    }

    /// Resolve a selector to positions on this axis, in caller order
    pub fn resolve(&self, selector: &TimeSelector) -> Result<Vec<usize>> {
        let len = self.len();
        match selector {
            TimeSelector::All => Ok((0..len).collect()),
            TimeSelector::Index(i) => {
                check_index(*i, len)?;
                Ok(vec![*i])
            }
            TimeSelector::Range(range) => {
                if range.start > range.end || range.end > len {
                    return Err(ExtractError::invalid_slice(format!(
                        "Time range {}..{} is invalid for {} time steps",
                        range.start, range.end, len
                    )));
                }
                Ok(range.clone().collect())
            }
            TimeSelector::Indices(indices) => {
                for &i in indices {
                    check_index(i, len)?;
                }
                Ok(indices.clone())
            }
            TimeSelector::Timestamp(t) => Ok(vec![self.locate(t)?]),
            TimeSelector::Between(start, end) => {
                let span = self.span(start, end);
                if span.is_empty() {
                    return Err(ExtractError::TimeRangeNotCovered {
                        start: start.to_rfc3339(),
                        end: end.to_rfc3339(),
                    });
                }
                Ok(span.collect())
            }
            TimeSelector::Years(years) => {
                let indices: Vec<usize> = self
                    .steps
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| years.contains(&t.year()))
                    .map(|(i, _)| i)
                    .collect();
                if indices.is_empty() {
                    let first = years.iter().min().copied().unwrap_or_default();
                    let last = years.iter().max().copied().unwrap_or_default();
                    return Err(ExtractError::TimeRangeNotCovered {
                        start: format!("{first}-01-01"),
                        end: format!("{last}-12-31"),
                    });
                }
                Ok(indices)
            }
        }
    }
}

fn check_index(index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(ExtractError::invalid_slice(format!(
            "Time index {index} is out of range for {len} time steps"
        )));
    }
    Ok(())
}

/// Which part of the time axis to extract
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TimeSelector {
    /// Every time step
    #[default]
    All,
    /// A single position
    Index(usize),
    /// A half-open range of positions
    Range(Range<usize>),
    /// Arbitrary positions, output follows this order
    Indices(Vec<usize>),
    /// A single exact timestamp
    Timestamp(DateTime<Utc>),
    /// All steps in the inclusive interval
    Between(DateTime<Utc>, DateTime<Utc>),
    /// All steps that fall in the given calendar years
    Years(Vec<i32>),
}

impl From<Range<usize>> for TimeSelector {
    fn from(range: Range<usize>) -> Self {
        Self::Range(range)
    }
}

impl From<usize> for TimeSelector {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<Vec<usize>> for TimeSelector {
    fn from(indices: Vec<usize>) -> Self {
        Self::Indices(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn hourly(start: &str, len: usize) -> TimeAxis {
        TimeAxis::regular(parse_timestamp(start).unwrap(), Duration::hours(1), len).unwrap()
    }

    #[test]
    fn test_parse_formats() {
        let a = parse_timestamp("2012-07-04 12:00:00").unwrap();
        let b = parse_timestamp("2012-07-04T12:00:00").unwrap();
        let c = parse_timestamp("2012-07-04T12:00:00+00:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(
            parse_timestamp("2012-07-04").unwrap(),
            parse_timestamp("2012-07-04 00:00:00").unwrap()
        );
        assert!(parse_timestamp("not a date").is_err());
    }

    #[test]
    fn test_rejects_unsorted_axis() {
        let t0 = parse_timestamp("2012-01-01 00:00:00").unwrap();
        let t1 = parse_timestamp("2012-01-01 01:00:00").unwrap();
        assert!(TimeAxis::new(vec![t1, t0]).is_err());
        assert!(TimeAxis::new(vec![t0, t0]).is_err());
        assert!(TimeAxis::new(vec![t0, t1]).is_ok());
    }

    #[test]
    fn test_malformed_timestamp_is_not_a_lookup_miss() {
        match parse_timestamp("2012-07-04 noon") {
            Err(ExtractError::InvalidTimestamp { value }) => assert_eq!(value, "2012-07-04 noon"),
            other => panic!("Expected InvalidTimestamp, got {:?}", other),
        }
        assert!(!parse_timestamp("07/04/2012").unwrap_err().is_not_found());
    }

    #[test]
    fn test_locate_exact_only() {
        let axis = hourly("2012-01-01 00:00:00", 48);
        let t = parse_timestamp("2012-01-02 03:00:00").unwrap();
        assert_eq!(axis.locate(&t).unwrap(), 27);

        let off_grid = parse_timestamp("2012-01-02 03:30:00").unwrap();
        match axis.locate(&off_grid) {
            Err(ExtractError::TimestampNotFound { .. }) => {}
            other => panic!("Expected TimestampNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_between_and_years() {
        let axis = hourly("2012-12-31 22:00:00", 4);
        let start = parse_timestamp("2012-12-31 23:00:00").unwrap();
        let end = parse_timestamp("2013-01-01 00:00:00").unwrap();
        assert_eq!(
            axis.resolve(&TimeSelector::Between(start, end)).unwrap(),
            vec![1, 2]
        );
        assert_eq!(
            axis.resolve(&TimeSelector::Years(vec![2013])).unwrap(),
            vec![2, 3]
        );
        assert!(matches!(
            axis.resolve(&TimeSelector::Years(vec![2015])),
            Err(ExtractError::TimeRangeNotCovered { .. })
        ));
    }

    #[test]
    fn test_resolve_bounds() {
        let axis = hourly("2012-01-01 00:00:00", 10);
        assert_eq!(axis.resolve(&TimeSelector::All).unwrap().len(), 10);
        assert_eq!(axis.resolve(&(2..5).into()).unwrap(), vec![2, 3, 4]);
        assert_eq!(
            axis.resolve(&vec![7, 1, 7].into()).unwrap(),
            vec![7, 1, 7]
        );
        assert!(axis.resolve(&TimeSelector::Index(10)).is_err());
        assert!(axis.resolve(&(5..11).into()).is_err());
    }

    #[test]
    fn test_epoch_round_trip() {
        let axis = hourly("2012-01-01 00:00:00", 3);
        let seconds = axis.to_epoch_seconds();
        assert_eq!(seconds[1] - seconds[0], 3600);
        assert_eq!(TimeAxis::from_epoch_seconds(&seconds).unwrap(), axis);
    }
}
