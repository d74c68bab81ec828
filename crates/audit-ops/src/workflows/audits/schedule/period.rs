use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;
use serde::Serialize;

use super::super::domain::{Frequency, Organization};

/// Inclusive scheduling window containing the evaluation instant. The end is
/// the last millisecond of the unit, not midnight of the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeriodError {
    #[error("unknown time zone '{0}'")]
    UnknownTimeZone(String),
    #[error("calendar arithmetic out of range")]
    OutOfRange,
}

/// Computes the start/end instants of the period containing `now` for the
/// organization's zone and week-start convention.
///
/// Boundaries are computed on the org-local calendar and mapped back to UTC
/// by preserving the offset the zone observes at `now`. `Unlimited` surveys
/// are scheduled on a weekly cadence; there is no "no period" state.
pub fn period_range(
    frequency: Frequency,
    now: DateTime<Utc>,
    org: &Organization,
) -> Result<PeriodRange, PeriodError> {
    let tz: Tz = org
        .time_zone
        .parse()
        .map_err(|_| PeriodError::UnknownTimeZone(org.time_zone.clone()))?;

    let local = now.with_timezone(&tz);
    let offset = local.offset().fix();
    let today = local.date_naive();

    let (start_date, end_date) = match frequency {
        Frequency::Daily => (today, today),
        Frequency::Weekly | Frequency::Unlimited => week_bounds(today, org),
        Frequency::Monthly => month_bounds(today)?,
        Frequency::Quarterly => quarter_bounds(today)?,
    };

    let start_local = start_date
        .and_hms_opt(0, 0, 0)
        .ok_or(PeriodError::OutOfRange)?;
    let end_local = end_date
        .and_hms_milli_opt(23, 59, 59, 999)
        .ok_or(PeriodError::OutOfRange)?;

    Ok(PeriodRange {
        start: to_utc(start_local, offset),
        end: to_utc(end_local, offset),
    })
}

fn week_bounds(today: NaiveDate, org: &Organization) -> (NaiveDate, NaiveDate) {
    let days_back =
        (today.weekday().num_days_from_sunday() + 7 - org.week_start.days_from_sunday()) % 7;
    let start = today - Duration::days(i64::from(days_back));
    (start, start + Duration::days(6))
}

fn month_bounds(today: NaiveDate) -> Result<(NaiveDate, NaiveDate), PeriodError> {
    let first = today.with_day(1).ok_or(PeriodError::OutOfRange)?;
    let last = first_of_next_month(first)? - Duration::days(1);
    Ok((first, last))
}

fn quarter_bounds(today: NaiveDate) -> Result<(NaiveDate, NaiveDate), PeriodError> {
    // Quarters are anchored to January: Jan-Mar, Apr-Jun, Jul-Sep, Oct-Dec.
    let quarter_month = ((today.month0() / 3) * 3) + 1;
    let first =
        NaiveDate::from_ymd_opt(today.year(), quarter_month, 1).ok_or(PeriodError::OutOfRange)?;
    let last_month = NaiveDate::from_ymd_opt(today.year(), quarter_month + 2, 1)
        .ok_or(PeriodError::OutOfRange)?;
    let last = first_of_next_month(last_month)? - Duration::days(1);
    Ok((first, last))
}

fn first_of_next_month(date: NaiveDate) -> Result<NaiveDate, PeriodError> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).ok_or(PeriodError::OutOfRange)
}

fn to_utc(local: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    Utc.from_utc_datetime(&(local - offset))
}
