//! Due-date arithmetic for recurring expenses.
//!
//! [`calculate_next_due_date`] serves both callers: template creation catches the due
//! date up past "now", while generation moves it forward by exactly one period.

use crate::{
    entities::{Frequency, recurring_expense},
    errors::{Error, Result},
};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};

/// When a recurring expense falls due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrenceRule {
    /// Period length
    pub frequency: Frequency,
    /// Day of month (1-31) pinned after each monthly/quarterly/yearly step
    pub day_of_month: Option<u32>,
    /// Weekday (0 = Sunday .. 6 = Saturday) a weekly schedule snaps to initially
    pub day_of_week: Option<u32>,
}

impl RecurrenceRule {
    /// Rule stored on a recurring expense template.
    #[must_use]
    pub fn from_model(model: &recurring_expense::Model) -> Self {
        Self {
            frequency: model.frequency,
            day_of_month: model.day_of_month.and_then(|d| u32::try_from(d).ok()),
            day_of_week: model.day_of_week.and_then(|d| u32::try_from(d).ok()),
        }
    }
}

/// How far [`calculate_next_due_date`] advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceMode {
    /// Advance until strictly after `now`; a reference already in the future is kept.
    CatchUpToNow,
    /// Advance exactly one period, regardless of `now`.
    SingleStep,
}

fn out_of_range() -> Error {
    Error::validation("next_due_date", "date out of range")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map_or(31, |last| last.day())
}

/// Moves `date` to `day` of its month, clamped to the month's last day.
fn pin_day_of_month(date: DateTime<Utc>, day: u32) -> Result<DateTime<Utc>> {
    let day = day.clamp(1, days_in_month(date.year(), date.month()));
    date.with_day(day).ok_or_else(out_of_range)
}

/// Moves `date` forward (0-6 days) onto the given weekday.
fn snap_to_weekday(date: DateTime<Utc>, day_of_week: u32) -> Result<DateTime<Utc>> {
    let current = date.weekday().num_days_from_sunday();
    let delta = (day_of_week % 7 + 7 - current) % 7;
    date.checked_add_signed(Duration::days(i64::from(delta)))
        .ok_or_else(out_of_range)
}

fn step(date: DateTime<Utc>, rule: &RecurrenceRule) -> Result<DateTime<Utc>> {
    let months = match rule.frequency {
        Frequency::Daily => {
            return date.checked_add_signed(Duration::days(1)).ok_or_else(out_of_range);
        }
        Frequency::Weekly => {
            return date.checked_add_signed(Duration::days(7)).ok_or_else(out_of_range);
        }
        Frequency::Monthly => 1,
        Frequency::Quarterly => 3,
        Frequency::Yearly => 12,
    };
    let next = date
        .checked_add_months(Months::new(months))
        .ok_or_else(out_of_range)?;
    match rule.day_of_month {
        Some(day) => pin_day_of_month(next, day),
        None => Ok(next),
    }
}

/// Computes the next due date of a recurring expense from `reference`.
///
/// With [`AdvanceMode::CatchUpToNow`] a weekly rule with a weekday first snaps onto that
/// weekday, any other rule takes one step, and stepping repeats while the result is not
/// after `now`. With [`AdvanceMode::SingleStep`] exactly one step is taken: +1 day,
/// +7 days, or +1/3/12 months with the day-of-month pin reapplied.
///
/// # Errors
/// `Validation` if the result would leave chrono's representable range.
pub fn calculate_next_due_date(
    reference: DateTime<Utc>,
    rule: &RecurrenceRule,
    mode: AdvanceMode,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    match mode {
        AdvanceMode::SingleStep => step(reference, rule),
        AdvanceMode::CatchUpToNow => {
            if reference > now {
                return Ok(reference);
            }
            let mut next = match (rule.frequency, rule.day_of_week) {
                (Frequency::Weekly, Some(day)) => snap_to_weekday(reference, day)?,
                _ => step(reference, rule)?,
            };
            while next <= now {
                next = step(next, rule)?;
            }
            Ok(next)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::{TimeZone, Weekday};

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 9, 0, 0).unwrap()
    }

    const fn rule(frequency: Frequency) -> RecurrenceRule {
        RecurrenceRule {
            frequency,
            day_of_month: None,
            day_of_week: None,
        }
    }

    #[test]
    fn test_monthly_pinned_always_lands_on_the_15th() {
        let pinned = RecurrenceRule {
            day_of_month: Some(15),
            ..rule(Frequency::Monthly)
        };
        let now = at(2024, 1, 1);
        for start_day in [1, 14, 15, 16, 28, 31] {
            let mut date = at(2024, 1, start_day);
            let mut expected_month = 1;
            for _ in 0..14 {
                date = calculate_next_due_date(date, &pinned, AdvanceMode::SingleStep, now)
                    .unwrap();
                expected_month = expected_month % 12 + 1;
                assert_eq!(date.day(), 15);
                assert_eq!(date.month(), expected_month);
            }
        }
    }

    #[test]
    fn test_future_reference_is_returned_unchanged() {
        let now = at(2024, 3, 10);
        let start = at(2024, 6, 1);
        for frequency in [
            Frequency::Daily,
            Frequency::Weekly,
            Frequency::Monthly,
            Frequency::Quarterly,
            Frequency::Yearly,
        ] {
            let next =
                calculate_next_due_date(start, &rule(frequency), AdvanceMode::CatchUpToNow, now)
                    .unwrap();
            assert_eq!(next, start);
        }
    }

    #[test]
    fn test_single_step_ignores_now() {
        let now = at(2030, 1, 1);
        let start = at(2024, 1, 10);
        let step = |frequency| {
            calculate_next_due_date(start, &rule(frequency), AdvanceMode::SingleStep, now)
                .unwrap()
        };
        assert_eq!(step(Frequency::Daily), at(2024, 1, 11));
        assert_eq!(step(Frequency::Weekly), at(2024, 1, 17));
        assert_eq!(step(Frequency::Monthly), at(2024, 2, 10));
        assert_eq!(step(Frequency::Quarterly), at(2024, 4, 10));
        assert_eq!(step(Frequency::Yearly), at(2025, 1, 10));
    }

    #[test]
    fn test_catch_up_moves_past_now() {
        let now = at(2024, 3, 10);
        let daily = calculate_next_due_date(
            at(2024, 3, 1),
            &rule(Frequency::Daily),
            AdvanceMode::CatchUpToNow,
            now,
        )
        .unwrap();
        assert_eq!(daily, at(2024, 3, 11));

        let monthly = calculate_next_due_date(
            at(2023, 11, 20),
            &rule(Frequency::Monthly),
            AdvanceMode::CatchUpToNow,
            now,
        )
        .unwrap();
        assert_eq!(monthly, at(2024, 3, 20));
    }

    #[test]
    fn test_weekly_snaps_to_weekday() {
        // 2024-03-01 is a Friday; 1 = Monday
        let monday = RecurrenceRule {
            day_of_week: Some(1),
            ..rule(Frequency::Weekly)
        };
        let next = calculate_next_due_date(
            at(2024, 3, 1),
            &monday,
            AdvanceMode::CatchUpToNow,
            at(2024, 3, 1),
        )
        .unwrap();
        assert_eq!(next, at(2024, 3, 4));
        assert_eq!(next.weekday(), Weekday::Mon);

        // Snapped date not after now keeps advancing by whole weeks
        let next = calculate_next_due_date(
            at(2024, 3, 1),
            &monday,
            AdvanceMode::CatchUpToNow,
            at(2024, 3, 20),
        )
        .unwrap();
        assert_eq!(next, at(2024, 3, 25));
    }

    #[test]
    fn test_day_of_month_clamps_in_short_months() {
        let end_of_month = RecurrenceRule {
            day_of_month: Some(31),
            ..rule(Frequency::Monthly)
        };
        let now = at(2000, 1, 1);
        let feb = calculate_next_due_date(at(2024, 1, 31), &end_of_month, AdvanceMode::SingleStep, now)
            .unwrap();
        assert_eq!(feb, at(2024, 2, 29));
        let mar = calculate_next_due_date(feb, &end_of_month, AdvanceMode::SingleStep, now).unwrap();
        assert_eq!(mar, at(2024, 3, 31));
        let apr = calculate_next_due_date(mar, &end_of_month, AdvanceMode::SingleStep, now).unwrap();
        assert_eq!(apr, at(2024, 4, 30));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 12), 31);
        assert_eq!(days_in_month(2024, 4), 30);
    }
}
