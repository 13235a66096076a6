use crate::period::{DayKind, DayRule, Frequency, Ordinal, Period};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use tracing::warn;

/// All firing dates of `period` inside the inclusive window `[from, to]`,
/// ascending.
///
/// The emitted dates are drawn from the intersection of the rule's own span
/// (`start_date` to `end_date`, unbounded when absent) and the query window.
/// Malformed input never raises: an inverted span or window, an empty
/// weekday or month list, all yield an empty vector.
pub fn occurrences(period: &Period, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let lo = period.start_date.max(from);
    let hi = match period.end_date {
        Some(end) => end.min(to),
        None => to,
    };
    if lo > hi {
        if period.end_date.is_some_and(|end| end < period.start_date) {
            warn!(
                start = %period.start_date,
                end = %period.end_date.unwrap(),
                "recurrence period ends before it starts; emitting nothing"
            );
        }
        return Vec::new();
    }

    match &period.frequency {
        Frequency::Daily { every } => daily(period.start_date, *every, lo, hi),
        Frequency::Weekly { every, weekdays } => {
            weekly(period.start_date, *every, weekdays, lo, hi)
        }
        Frequency::Monthly { every, day_rule } => {
            monthly(period.start_date, *every, day_rule, lo, hi)
        }
        Frequency::Yearly {
            every,
            months,
            day_rule,
        } => yearly(period.start_date, *every, months, day_rule, lo, hi),
    }
}

/// True when `date` is one of the period's firing dates.
pub fn occurs_on(period: &Period, date: NaiveDate) -> bool {
    !occurrences(period, date, date).is_empty()
}

// A zero step would never advance; the smallest meaningful step is 1.
fn step_of(every: u32) -> i64 {
    i64::from(every.max(1))
}

fn daily(start: NaiveDate, every: u32, lo: NaiveDate, hi: NaiveDate) -> Vec<NaiveDate> {
    let step = step_of(every);
    // First date >= lo that is congruent to `start` modulo the step.
    let offset = (lo - start).num_days();
    let remainder = offset.rem_euclid(step);
    let mut date = if remainder == 0 {
        lo
    } else {
        lo + Duration::days(step - remainder)
    };

    let mut dates = Vec::new();
    while date <= hi {
        dates.push(date);
        date += Duration::days(step);
    }
    dates
}

fn weekly(
    start: NaiveDate,
    every: u32,
    weekdays: &[Weekday],
    lo: NaiveDate,
    hi: NaiveDate,
) -> Vec<NaiveDate> {
    let mut days: Vec<Weekday> = weekdays.to_vec();
    days.sort_by_key(|day| day.num_days_from_monday());
    days.dedup();
    if days.is_empty() {
        return Vec::new();
    }

    // Weeks are Monday-based and step from the week containing the start date.
    let anchor = start.week(Weekday::Mon).first_day();
    let step = 7 * step_of(every);
    let skipped = (lo - anchor).num_days().max(0) / step;
    let mut week = anchor + Duration::days(skipped * step);

    let mut dates = Vec::new();
    while week <= hi {
        for day in &days {
            let date = week + Duration::days(i64::from(day.num_days_from_monday()));
            if date >= lo && date <= hi {
                dates.push(date);
            }
        }
        week += Duration::days(step);
    }
    dates
}

fn monthly(
    start: NaiveDate,
    every: u32,
    day_rule: &DayRule,
    lo: NaiveDate,
    hi: NaiveDate,
) -> Vec<NaiveDate> {
    let step = step_of(every) as u32;
    let mut year = start.year();
    let mut month = start.month();

    // The fixed-day basis is sticky: once a short month clamps it, later
    // months keep the clamped day. Months are therefore walked from the
    // rule's start even when the window begins later.
    let mut basis = match day_rule {
        DayRule::Each { day } => (*day).clamp(1, 31),
        DayRule::On { .. } => 0,
    };

    let mut dates = Vec::new();
    loop {
        let Some(first_of_month) = NaiveDate::from_ymd_opt(year, month, 1) else {
            break;
        };
        if first_of_month > hi {
            break;
        }

        let date = match day_rule {
            DayRule::Each { .. } => {
                let clamped = basis.min(days_in_month(year, month));
                basis = clamped;
                NaiveDate::from_ymd_opt(year, month, clamped)
            }
            DayRule::On { ordinal, day } => positional_day(year, month, *ordinal, day),
        };
        if let Some(date) = date {
            if date >= lo && date <= hi {
                dates.push(date);
            }
        }

        let months0 = month - 1 + step;
        year += (months0 / 12) as i32;
        month = months0 % 12 + 1;
    }
    dates
}

fn yearly(
    start: NaiveDate,
    every: u32,
    months: &[u32],
    day_rule: &DayRule,
    lo: NaiveDate,
    hi: NaiveDate,
) -> Vec<NaiveDate> {
    let mut months: Vec<u32> = months
        .iter()
        .copied()
        .filter(|month| (1..=12).contains(month))
        .collect();
    months.sort_unstable();
    months.dedup();
    if months.is_empty() {
        return Vec::new();
    }

    let step = step_of(every) as i32;
    let mut year = start.year();

    let mut dates = Vec::new();
    while year <= hi.year() {
        for &month in &months {
            // The day rule applies to each listed month on its own; clamping
            // never carries across months or years here.
            let date = match day_rule {
                DayRule::Each { day } => {
                    let clamped = (*day).clamp(1, 31).min(days_in_month(year, month));
                    NaiveDate::from_ymd_opt(year, month, clamped)
                }
                DayRule::On { ordinal, day } => positional_day(year, month, *ordinal, day),
            };
            if let Some(date) = date {
                if date >= lo && date <= hi {
                    dates.push(date);
                }
            }
        }
        year += step;
    }
    dates
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match next {
        Some(first_of_next) => first_of_next.pred_opt().map_or(28, |d| d.day()),
        None => 28,
    }
}

/// The date selected by a positional day rule within one month, or `None`
/// when the month has too few matching days.
fn positional_day(year: i32, month: u32, ordinal: Ordinal, day: &DayKind) -> Option<NaiveDate> {
    let matches = matching_days(year, month, day);
    match ordinal {
        Ordinal::First => matches.first().copied(),
        Ordinal::Second => matches.get(1).copied(),
        Ordinal::Third => matches.get(2).copied(),
        Ordinal::Fourth => matches.get(3).copied(),
        Ordinal::Fifth => matches.get(4).copied(),
        Ordinal::Last => matches.last().copied(),
        Ordinal::NextToLast => matches.len().checked_sub(2).and_then(|i| matches.get(i)).copied(),
    }
}

/// All days of one month matched by `day`, ascending.
fn matching_days(year: i32, month: u32, day: &DayKind) -> Vec<NaiveDate> {
    let mut date = match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(first) => first,
        None => return Vec::new(),
    };
    let mut matches = Vec::new();
    while date.month() == month {
        if day.matches(date) {
            matches.push(date);
        }
        date += Duration::days(1);
    }
    matches
}
