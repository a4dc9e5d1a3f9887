use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::InvenError;

/// Reporting window used by the manager dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Today,
    ThisWeek,
    ThisMonth,
    ThisYear,
    AllTime,
    Custom { from: NaiveDate, to: NaiveDate },
}

/// Half-open `[start, end)` bounds; `None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodBounds {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

/// Bucket width for sales trends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendGranularity {
    Hour,
    Day,
    Month,
}

impl TrendGranularity {
    /// `strftime` format producing the bucket label.
    pub fn sqlite_format(self) -> &'static str {
        match self {
            TrendGranularity::Hour => "%Y-%m-%d %H:00",
            TrendGranularity::Day => "%Y-%m-%d",
            TrendGranularity::Month => "%Y-%m",
        }
    }
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

impl Period {
    /// Parse the `period` query parameter; `custom` needs both dates.
    pub fn parse(
        name: Option<&str>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Period, InvenError> {
        let period = match name.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("today") => Period::Today,
            Some("this_week") | Some("week") => Period::ThisWeek,
            Some("this_month") | Some("month") => Period::ThisMonth,
            Some("this_year") | Some("year") => Period::ThisYear,
            Some("all_time") | Some("all") => Period::AllTime,
            Some("custom") => match (from, to) {
                (Some(from), Some(to)) if from <= to => Period::Custom { from, to },
                (Some(_), Some(_)) => {
                    return Err(InvenError::validation("to", "end date precedes start date"));
                }
                _ => {
                    return Err(InvenError::validation(
                        "period",
                        "custom period requires both `from` and `to`",
                    ));
                }
            },
            Some(other) => {
                return Err(InvenError::validation(
                    "period",
                    format!("unknown period '{other}'"),
                ));
            }
        };
        Ok(period)
    }

    pub fn bounds(self, now: NaiveDateTime) -> PeriodBounds {
        let today = now.date();
        let start = match self {
            Period::Today => Some(midnight(today)),
            Period::ThisWeek => {
                let back = u64::from(today.weekday().num_days_from_monday());
                today.checked_sub_days(Days::new(back)).map(midnight)
            }
            Period::ThisMonth => today.with_day(1).map(midnight),
            Period::ThisYear => NaiveDate::from_ymd_opt(today.year(), 1, 1).map(midnight),
            Period::AllTime => None,
            Period::Custom { from, to } => {
                return PeriodBounds {
                    start: Some(midnight(from)),
                    end: to.checked_add_days(Days::new(1)).map(midnight),
                };
            }
        };
        PeriodBounds { start, end: None }
    }

    pub fn granularity(self) -> TrendGranularity {
        match self {
            Period::Today => TrendGranularity::Hour,
            Period::ThisWeek | Period::ThisMonth | Period::Custom { .. } => TrendGranularity::Day,
            Period::ThisYear | Period::AllTime => TrendGranularity::Month,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 30, 0)
            .unwrap()
    }

    #[test]
    fn week_starts_on_monday() {
        // 2026-10-22 is a Thursday.
        let b = Period::ThisWeek.bounds(at(2026, 10, 22, 15));
        assert_eq!(b.start, Some(midnight(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())));
        assert_eq!(b.end, None);
    }

    #[test]
    fn custom_range_is_inclusive_of_the_last_day() {
        let from = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        let b = Period::Custom { from, to }.bounds(at(2026, 10, 22, 15));
        assert_eq!(b.start, Some(midnight(from)));
        assert_eq!(b.end, Some(midnight(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap())));
    }

    #[test]
    fn parse_rejects_incomplete_custom_and_unknown_names() {
        assert_eq!(Period::parse(None, None, None).unwrap(), Period::Today);
        assert_eq!(
            Period::parse(Some("This_Month"), None, None).unwrap(),
            Period::ThisMonth
        );
        assert!(Period::parse(Some("custom"), None, None).is_err());
        assert!(Period::parse(Some("fortnight"), None, None).is_err());

        let from = NaiveDate::from_ymd_opt(2026, 2, 1);
        let to = NaiveDate::from_ymd_opt(2026, 1, 1);
        assert!(Period::parse(Some("custom"), from, to).is_err());
    }

    #[test]
    fn granularity_follows_period_length() {
        assert_eq!(Period::Today.granularity(), TrendGranularity::Hour);
        assert_eq!(Period::ThisMonth.granularity(), TrendGranularity::Day);
        assert_eq!(Period::AllTime.granularity(), TrendGranularity::Month);
    }
}
