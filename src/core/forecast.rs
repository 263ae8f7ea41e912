//! Budget forecasting - projects end-of-period spend from the current burn rate.

use crate::{
    core::{
        budget::{budget_expense_query, budget_period, list_active_budgets},
        expense::sum_expenses,
        organization::find_organization,
        session::Actor,
    },
    entities::budget,
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::debug;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Projection figures for one budget period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Forecast {
    /// Sum of matching expenses so far
    pub current_spending: f64,
    /// Whole days since the period started, rounded up
    pub days_elapsed: i64,
    /// Days left in the period
    pub days_remaining: i64,
    /// Period length in days, rounded up
    pub total_days: i64,
    /// Average spend per elapsed day
    pub daily_burn_rate: f64,
    /// Spend at the end of the period at the current burn rate
    pub projected_spending: f64,
    /// Projected spend above the budget amount
    pub projected_overage: f64,
    /// Daily spend that would land exactly on the budget amount
    pub recommended_daily_spending: f64,
    /// Share of the amount already spent, in percent
    pub percent_used: f64,
    /// Spending has reached the alert threshold
    pub alert_triggered: bool,
}

/// A budget together with its forecast.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetForecast {
    /// The forecast budget
    pub budget: budget::Model,
    /// Period start
    pub period_start: DateTime<Utc>,
    /// Period end (exclusive)
    pub period_end: DateTime<Utc>,
    /// Projection figures
    pub forecast: Forecast,
}

/// Whole days in `to - from`, rounded up; zero when `to` is not after `from`.
fn ceil_days(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let millis = (to - from).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
    }
}

/// Computes the forecast figures from already measured day counts.
#[must_use]
pub fn project(
    amount: f64,
    current_spending: f64,
    alert_threshold: f64,
    days_elapsed: i64,
    total_days: i64,
) -> Forecast {
    let days_remaining = (total_days - days_elapsed).max(0);

    #[allow(clippy::cast_precision_loss)]
    let daily_burn_rate = if days_elapsed > 0 {
        current_spending / days_elapsed as f64
    } else {
        0.0
    };
    #[allow(clippy::cast_precision_loss)]
    let projected_spending = daily_burn_rate * total_days as f64;
    let projected_overage = (projected_spending - amount).max(0.0);
    #[allow(clippy::cast_precision_loss)]
    let recommended_daily_spending = if days_remaining > 0 {
        ((amount - current_spending) / days_remaining as f64).max(0.0)
    } else {
        0.0
    };
    let used = if amount > 0.0 {
        current_spending / amount
    } else {
        0.0
    };

    Forecast {
        current_spending,
        days_elapsed,
        days_remaining,
        total_days,
        daily_burn_rate,
        projected_spending,
        projected_overage,
        recommended_daily_spending,
        percent_used: used * 100.0,
        alert_triggered: used >= alert_threshold,
    }
}

/// Forecasts a period `[start, end)` at `now`.
///
/// # Arguments
/// * `amount` - Budgeted amount for the whole period
/// * `current_spending` - Spent so far
/// * `alert_threshold` - Fraction of `amount` (0-1) that triggers an alert
/// * `start`, `end` - The period; partial days count as whole days
/// * `now` - Forecast time
///
/// # Returns
/// Burn rate, projection and alert state
#[must_use]
pub fn compute_forecast(
    amount: f64,
    current_spending: f64,
    alert_threshold: f64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Forecast {
    project(
        amount,
        current_spending,
        alert_threshold,
        ceil_days(start, now),
        ceil_days(start, end),
    )
}

/// Forecasts every active budget of an organization whose period has not ended at `now`.
///
/// Spending counts expenses of every approval status whose primary category, business
/// and location match the budget's.
///
/// # Errors
/// `NotFound` if the organization does not exist.
pub async fn budget_forecasts_at(
    db: &DatabaseConnection,
    organization_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<BudgetForecast>> {
    find_organization(db, organization_id).await?;

    let mut forecasts = Vec::new();
    for budget in list_active_budgets(db, organization_id).await? {
        let (period_start, period_end) = budget_period(&budget)?;
        if period_end <= now {
            debug!(budget_id = budget.id, "Skipping budget with elapsed period");
            continue;
        }

        let spent = sum_expenses(db, organization_id, &budget_expense_query(&budget)?).await?;
        let forecast = compute_forecast(
            budget.amount,
            spent,
            budget.alert_threshold,
            period_start,
            period_end,
            now,
        );
        forecasts.push(BudgetForecast {
            budget,
            period_start,
            period_end,
            forecast,
        });
    }
    Ok(forecasts)
}

/// Forecasts the caller's organization's budgets at the current time.
pub async fn budget_forecasts(
    db: &DatabaseConnection,
    actor: &Actor,
) -> Result<Vec<BudgetForecast>> {
    budget_forecasts_at(db, actor.organization_id, Utc::now()).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::budget::{NewBudget, create_budget};
    use crate::entities::{BudgetPeriod, Role};
    use crate::errors::Error;
    use crate::test_utils::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_reference_projection() {
        let forecast = project(1000.0, 500.0, 0.8, 10, 30);
        assert_eq!(forecast.daily_burn_rate, 50.0);
        assert_eq!(forecast.projected_spending, 1500.0);
        assert_eq!(forecast.projected_overage, 500.0);
        assert_eq!(forecast.days_remaining, 20);
        assert_eq!(forecast.recommended_daily_spending, 25.0);
        assert_eq!(forecast.percent_used, 50.0);
        assert!(!forecast.alert_triggered);
    }

    #[test]
    fn test_compute_forecast_rounds_days_up() {
        let start = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let now = start + Duration::days(9) + Duration::hours(3);

        let forecast = compute_forecast(1000.0, 500.0, 0.8, start, end, now);
        assert_eq!(forecast.days_elapsed, 10);
        assert_eq!(forecast.total_days, 30);
        assert_eq!(forecast.projected_spending, 1500.0);
    }

    #[test]
    fn test_period_not_started_and_overspent() {
        let start = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        let early = compute_forecast(1000.0, 0.0, 0.8, start, end, start - Duration::days(2));
        assert_eq!(early.days_elapsed, 0);
        assert_eq!(early.daily_burn_rate, 0.0);
        assert_eq!(early.days_remaining, 30);

        let over = project(1000.0, 1200.0, 0.8, 20, 30);
        assert_eq!(over.recommended_daily_spending, 0.0);
        assert!(over.alert_triggered);

        let finished = project(1000.0, 900.0, 0.8, 30, 30);
        assert_eq!(finished.days_remaining, 0);
        assert_eq!(finished.recommended_daily_spending, 0.0);
    }

    #[tokio::test]
    async fn test_budget_forecasts_at() -> Result<()> {
        let (db, org) = setup_with_organization().await?;
        let manager = create_test_actor(&db, org.id, Role::Manager).await?;
        let start = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let now = start + Duration::days(10);

        let travel = create_budget(
            &db,
            &manager,
            NewBudget {
                name: "Travel".to_string(),
                amount: 1000.0,
                period: BudgetPeriod::Monthly,
                start_date: start,
                end_date: None,
                category: Some("Travel".to_string()),
                business_id: None,
                location_id: None,
                alert_threshold: Some(0.5),
            },
        )
        .await?;
        // Period ended before `now`
        create_budget(
            &db,
            &manager,
            NewBudget {
                name: "March".to_string(),
                amount: 500.0,
                period: BudgetPeriod::Monthly,
                start_date: start - Duration::days(31),
                end_date: Some(start),
                category: None,
                business_id: None,
                location_id: None,
                alert_threshold: None,
            },
        )
        .await?;

        insert_expense(&db, &manager, 300.0, "Travel", None, start + Duration::days(1)).await?;
        insert_expense(&db, &manager, 200.0, "Travel", None, start + Duration::days(5)).await?;
        insert_expense(&db, &manager, 999.0, "Meals", None, start + Duration::days(2)).await?;
        insert_expense(&db, &manager, 999.0, "Travel", None, start - Duration::days(1)).await?;

        let forecasts = budget_forecasts_at(&db, org.id, now).await?;
        assert_eq!(forecasts.len(), 1);
        let forecast = &forecasts[0];
        assert_eq!(forecast.budget.id, travel.id);
        assert_eq!(forecast.forecast.current_spending, 500.0);
        assert_eq!(forecast.forecast.days_elapsed, 10);
        assert_eq!(forecast.forecast.total_days, 30);
        assert_eq!(forecast.forecast.projected_overage, 500.0);
        assert!(forecast.forecast.alert_triggered);
        Ok(())
    }

    #[tokio::test]
    async fn test_budget_forecasts_empty_and_missing_organization() -> Result<()> {
        let (db, org) = setup_with_organization().await?;
        let employee = create_test_actor(&db, org.id, Role::Employee).await?;
        assert!(budget_forecasts(&db, &employee).await?.is_empty());

        let missing = budget_forecasts_at(&db, 9999, Utc::now()).await;
        assert!(matches!(missing, Err(Error::NotFound { .. })));
        Ok(())
    }
}
