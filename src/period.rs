use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// How often a recurring calculation fires within its period.
///
/// Every variant carries an `every` step: `Daily { every: 2 }` fires every
/// second day counted from the period's start date, `Monthly { every: 3 }`
/// every third month, and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frequency", rename_all = "snake_case")]
pub enum Frequency {
    Daily {
        every: u32,
    },
    Weekly {
        every: u32,
        weekdays: Vec<Weekday>,
    },
    Monthly {
        every: u32,
        day_rule: DayRule,
    },
    Yearly {
        every: u32,
        /// Calendar months (1-12) the rule applies to within each included year.
        months: Vec<u32>,
        day_rule: DayRule,
    },
}

/// Which day of a month a monthly or yearly rule lands on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayRule {
    /// A fixed day of the month (1-31). Months that are too short clamp to
    /// their last day, and for monthly rules the clamped day becomes the
    /// basis for every following month.
    Each { day: u32 },
    /// A positional day, e.g. the second Tuesday or the last weekend day.
    On { ordinal: Ordinal, day: DayKind },
}

/// Position of the matching day within the month.
///
/// `First` through `Fifth` count from the start of the month; a month
/// without that many matches is skipped. `Last` and `NextToLast` count
/// from the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ordinal {
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    Last,
    NextToLast,
}

/// The kind of day a positional rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayKind {
    /// One specific weekday.
    Fixed(Weekday),
    /// Any calendar day.
    Any,
    /// Monday through Friday.
    Weekday,
    /// Saturday or Sunday.
    Weekend,
}

impl DayKind {
    pub fn matches(&self, date: NaiveDate) -> bool {
        let weekday = chrono::Datelike::weekday(&date);
        match self {
            DayKind::Fixed(day) => weekday == *day,
            DayKind::Any => true,
            DayKind::Weekday => !matches!(weekday, Weekday::Sat | Weekday::Sun),
            DayKind::Weekend => matches!(weekday, Weekday::Sat | Weekday::Sun),
        }
    }
}

/// A recurrence period: a required start, an optional inclusive end, and a
/// frequency. An absent end means the period runs forward unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub frequency: Frequency,
}

/// Inclusive membership test; an absent `end` is unbounded forward.
pub fn in_period(date: NaiveDate, start: NaiveDate, end: Option<NaiveDate>) -> bool {
    date >= start && end.is_none_or(|end| date <= end)
}

impl Period {
    pub fn contains(&self, date: NaiveDate) -> bool {
        in_period(date, self.start_date, self.end_date)
    }

    /// True when the two spans share at least one date, boundary-touching
    /// included.
    pub fn overlaps(&self, other: &Period) -> bool {
        let start = self.start_date.max(other.start_date);
        match joint_end(self.end_date, other.end_date) {
            Some(end) => start <= end,
            None => true,
        }
    }

    /// The overlapping sub-range, or `None` when the spans are disjoint.
    /// When both spans are unbounded the result is unbounded with the later
    /// start. The result keeps `self`'s frequency.
    pub fn intersection(&self, other: &Period) -> Option<Period> {
        let start = self.start_date.max(other.start_date);
        let end = joint_end(self.end_date, other.end_date);
        if end.is_some_and(|end| start > end) {
            return None;
        }
        Some(Period {
            start_date: start,
            end_date: end,
            frequency: self.frequency.clone(),
        })
    }
}

fn joint_end(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(end), None) | (None, Some(end)) => Some(end),
        (None, None) => None,
    }
}

/// Collapses a list of periods into the minimal ascending list of disjoint,
/// non-adjacent spans. Periods whose start falls on or before the running
/// span's end plus one day are absorbed into it; an unbounded running span
/// absorbs everything after it. The input is left untouched and re-merging
/// the output is a no-op.
pub fn merge(periods: &[Period]) -> Vec<Period> {
    let mut sorted: Vec<Period> = periods.to_vec();
    sorted.sort_by_key(|period| period.start_date);

    let mut merged: Vec<Period> = Vec::with_capacity(sorted.len());
    for period in sorted {
        let Some(run) = merged.last_mut() else {
            merged.push(period);
            continue;
        };
        let absorb = match run.end_date {
            None => true,
            Some(end) => {
                let boundary = end.succ_opt().unwrap_or(end);
                period.start_date <= boundary
            }
        };
        if absorb {
            run.end_date = match (run.end_date, period.end_date) {
                (Some(a), Some(b)) => Some(a.max(b)),
                _ => None,
            };
        } else {
            merged.push(period);
        }
    }
    merged
}
