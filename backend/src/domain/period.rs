//! Period window calculations for budgets.
//!
//! This is the only place period math lives: everything else consumes the
//! (start, end) window it produces. Windows are inclusive on both ends and
//! always clamped to the budget's own start/end dates.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Utc};

use shared::{Budget, PeriodType};

/// The budget's period window containing `now`, or `None` when `now`
/// falls outside the budget's active date range.
pub fn current_period(budget: &Budget, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    if now < budget.start_date || now > budget.end_date {
        return None;
    }

    let today = now.date_naive();

    let (window_start, window_end) = match budget.period_type {
        PeriodType::Custom => (budget.start_date, budget.end_date),
        PeriodType::Daily => day_window(today, today)?,
        PeriodType::Weekly => {
            let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
            day_window(monday, monday + Duration::days(6))?
        }
        PeriodType::Monthly => {
            let first = today.with_day(1)?;
            day_window(first, last_day_of_month(first)?)?
        }
        PeriodType::Quarterly => {
            let quarter_start_month = (today.month0() / 3) * 3 + 1;
            let first = NaiveDate::from_ymd_opt(today.year(), quarter_start_month, 1)?;
            let last_month = first.checked_add_months(Months::new(2))?;
            day_window(first, last_day_of_month(last_month)?)?
        }
        PeriodType::Yearly => day_window(
            NaiveDate::from_ymd_opt(today.year(), 1, 1)?,
            NaiveDate::from_ymd_opt(today.year(), 12, 31)?,
        )?,
    };

    // Clamp the rolling window to the budget's own bounds
    let start = window_start.max(budget.start_date);
    let end = window_end.min(budget.end_date);
    if start > end {
        return None;
    }

    Some((start, end))
}

fn day_window(first: NaiveDate, last: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0)?);
    let end = Utc.from_utc_datetime(&last.and_hms_milli_opt(23, 59, 59, 999)?);
    Some((start, end))
}

fn last_day_of_month(date: NaiveDate) -> Option<NaiveDate> {
    let first = date.with_day(1)?;
    Some(first.checked_add_months(Months::new(1))? - Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_budget(period_type: PeriodType) -> Budget {
        Budget {
            id: "budget::1".to_string(),
            user_id: "user-1".to_string(),
            category_id: None,
            name: "Groceries".to_string(),
            amount: 500.0,
            period_type,
            start_date: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap(),
            currency: "USD".to_string(),
            warning_threshold_pct: 80,
            is_active: true,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_monthly_window() {
        let budget = test_budget(PeriodType::Monthly);
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 10, 30, 0).unwrap();
        let (start, end) = current_period(&budget, now).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
    }

    #[test]
    fn test_weekly_window_starts_monday() {
        let budget = test_budget(PeriodType::Weekly);
        // 2025-06-15 is a Sunday
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap();
        let (start, end) = current_period(&budget, now).unwrap();
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2025, 6, 9).unwrap());
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2025, 6, 15).unwrap());
    }

    #[test]
    fn test_quarterly_window() {
        let budget = test_budget(PeriodType::Quarterly);
        let now = Utc.with_ymd_and_hms(2025, 11, 3, 0, 0, 0).unwrap();
        let (start, end) = current_period(&budget, now).unwrap();
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn test_custom_window_is_budget_bounds() {
        let budget = test_budget(PeriodType::Custom);
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap();
        let (start, end) = current_period(&budget, now).unwrap();
        assert_eq!(start, budget.start_date);
        assert_eq!(end, budget.end_date);
    }

    #[test]
    fn test_outside_budget_range_has_no_period() {
        let budget = test_budget(PeriodType::Monthly);
        let before = Utc.with_ymd_and_hms(2024, 12, 31, 23, 0, 0).unwrap();
        assert!(current_period(&budget, before).is_none());
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(current_period(&budget, after).is_none());
    }

    #[test]
    fn test_window_clamped_to_budget_start() {
        let mut budget = test_budget(PeriodType::Monthly);
        budget.start_date = Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap();
        let (start, _) = current_period(&budget, now).unwrap();
        // The June window starts at the budget's start, not June 1st
        assert_eq!(start, budget.start_date);
    }

    #[test]
    fn test_yearly_window_crosses_december() {
        let budget = test_budget(PeriodType::Yearly);
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 12, 0, 0).unwrap();
        let (start, end) = current_period(&budget, now).unwrap();
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }
}
