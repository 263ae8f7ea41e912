//! Budget business logic - spending ceilings scoped to a period and optional dimensions.

use crate::{
    core::{
        business::validate_dimensions,
        expense::{ExpenseQuery, validate_amount},
        session::Actor,
    },
    entities::{Budget, BudgetPeriod, Role, budget},
    errors::{Error, Result},
};
use chrono::{DateTime, Months, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

/// Alert threshold used when none is given.
pub const DEFAULT_ALERT_THRESHOLD: f64 = 0.8;

/// Input for a new budget.
#[derive(Debug, Clone)]
pub struct NewBudget {
    /// Display name
    pub name: String,
    /// Positive spending ceiling
    pub amount: f64,
    /// Period length used when no end date is given
    pub period: BudgetPeriod,
    /// Period start
    pub start_date: DateTime<Utc>,
    /// Explicit period end
    pub end_date: Option<DateTime<Utc>>,
    /// Only expenses with this primary category count
    pub category: Option<String>,
    /// Only expenses of this business count
    pub business_id: Option<i64>,
    /// Only expenses at this location count
    pub location_id: Option<i64>,
    /// Fraction of the amount (0-1) at which the budget alerts
    pub alert_threshold: Option<f64>,
}

/// End of a period of the given length starting at `start`.
pub fn period_end(start: DateTime<Utc>, period: BudgetPeriod) -> Result<DateTime<Utc>> {
    let months = match period {
        BudgetPeriod::Monthly => 1,
        BudgetPeriod::Quarterly => 3,
        BudgetPeriod::Yearly => 12,
    };
    start
        .checked_add_months(Months::new(months))
        .ok_or_else(|| Error::validation("start_date", "date out of range"))
}

/// The `[start, end)` window a budget covers.
pub fn budget_period(budget: &budget::Model) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let end = match budget.end_date {
        Some(end) => end,
        None => period_end(budget.start_date, budget.period)?,
    };
    Ok((budget.start_date, end))
}

/// Filter selecting the expenses that count against `budget` within its period.
pub fn budget_expense_query(budget: &budget::Model) -> Result<ExpenseQuery> {
    let (start, end) = budget_period(budget)?;
    Ok(ExpenseQuery {
        categories: budget.category.iter().cloned().collect(),
        business_ids: budget.business_id.into_iter().collect(),
        location_ids: budget.location_id.into_iter().collect(),
        ..ExpenseQuery::between(start, end)
    })
}

/// Creates a budget in the caller's organization.
///
/// # Arguments
/// * `db` - Database connection
/// * `actor` - The caller; `Manager` or above
/// * `new_budget` - Amount, period, alert threshold and optional category/business/location scope
///
/// # Errors
/// `Forbidden` below `Manager`; `InvalidAmount`; `Validation` for an empty name, a
/// threshold outside 0-1 or an end date not after the start date; `NotFound` for
/// business/location ids outside the organization.
pub async fn create_budget(
    db: &DatabaseConnection,
    actor: &Actor,
    new_budget: NewBudget,
) -> Result<budget::Model> {
    actor.require_role(Role::Manager)?;
    validate_amount(new_budget.amount)?;
    let name = new_budget.name.trim();
    if name.is_empty() {
        return Err(Error::validation("name", "cannot be empty"));
    }
    let alert_threshold = new_budget.alert_threshold.unwrap_or(DEFAULT_ALERT_THRESHOLD);
    if !(0.0..=1.0).contains(&alert_threshold) {
        return Err(Error::validation("alert_threshold", "must be between 0 and 1"));
    }
    if new_budget
        .end_date
        .is_some_and(|end| end <= new_budget.start_date)
    {
        return Err(Error::validation("end_date", "must be after start_date"));
    }
    let category = new_budget
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    validate_dimensions(db, actor, new_budget.business_id, new_budget.location_id).await?;

    let created = budget::ActiveModel {
        organization_id: Set(actor.organization_id),
        name: Set(name.to_string()),
        amount: Set(new_budget.amount),
        period: Set(new_budget.period),
        start_date: Set(new_budget.start_date),
        end_date: Set(new_budget.end_date),
        category: Set(category),
        business_id: Set(new_budget.business_id),
        location_id: Set(new_budget.location_id),
        alert_threshold: Set(alert_threshold),
        is_active: Set(true),
        created_by: Set(actor.user_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(budget_id = created.id, amount = created.amount, "Budget created");
    Ok(created)
}

/// Lists the organization's active budgets, oldest period first.
pub async fn list_active_budgets<C: ConnectionTrait>(
    conn: &C,
    organization_id: i64,
) -> Result<Vec<budget::Model>> {
    Budget::find()
        .filter(budget::Column::OrganizationId.eq(organization_id))
        .filter(budget::Column::IsActive.eq(true))
        .order_by_asc(budget::Column::StartDate)
        .order_by_asc(budget::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Deactivates a budget (≥ `Manager`).
pub async fn deactivate_budget(
    db: &DatabaseConnection,
    actor: &Actor,
    budget_id: i64,
) -> Result<budget::Model> {
    actor.require_role(Role::Manager)?;
    let budget = Budget::find_by_id(budget_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("budget", budget_id))?;
    actor.ensure_same_organization(budget.organization_id, "budget", budget_id)?;

    let mut active_model: budget::ActiveModel = budget.into();
    active_model.is_active = Set(false);
    let updated = active_model.update(db).await?;
    info!(budget_id, "Budget deactivated");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn new_budget(start_date: DateTime<Utc>) -> NewBudget {
        NewBudget {
            name: "Travel Q1".to_string(),
            amount: 1000.0,
            period: BudgetPeriod::Monthly,
            start_date,
            end_date: None,
            category: Some("Travel".to_string()),
            business_id: None,
            location_id: None,
            alert_threshold: None,
        }
    }

    #[test]
    fn test_period_end() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        assert_eq!(
            period_end(start, BudgetPeriod::Monthly).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap()
        );
        assert_eq!(
            period_end(start, BudgetPeriod::Quarterly).unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 30, 0, 0, 0).unwrap()
        );
        assert_eq!(
            period_end(start, BudgetPeriod::Yearly).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_create_budget_validation() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let manager = Actor {
            user_id: 1,
            organization_id: 1,
            role: Role::Manager,
        };
        let employee = Actor {
            role: Role::Employee,
            ..manager
        };
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert!(matches!(
            create_budget(&db, &employee, new_budget(start)).await,
            Err(Error::Forbidden { .. })
        ));

        let mut threshold = new_budget(start);
        threshold.alert_threshold = Some(1.5);
        assert!(matches!(
            create_budget(&db, &manager, threshold).await,
            Err(Error::Validation { field: "alert_threshold", .. })
        ));

        let mut end = new_budget(start);
        end.end_date = Some(start);
        assert!(matches!(
            create_budget(&db, &manager, end).await,
            Err(Error::Validation { field: "end_date", .. })
        ));

        let mut amount = new_budget(start);
        amount.amount = -1.0;
        assert!(matches!(
            create_budget(&db, &manager, amount).await,
            Err(Error::InvalidAmount { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_list_and_deactivate() -> Result<()> {
        let (db, org) = setup_with_organization().await?;
        let manager = create_test_actor(&db, org.id, Role::Manager).await?;
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let created = create_budget(&db, &manager, new_budget(start)).await?;
        assert_eq!(created.alert_threshold, DEFAULT_ALERT_THRESHOLD);
        assert_eq!(created.created_by, manager.user_id);
        assert_eq!(list_active_budgets(&db, org.id).await?.len(), 1);

        let query = budget_expense_query(&created)?;
        assert_eq!(query.categories, vec!["Travel".to_string()]);
        assert_eq!(query.start, Some(start));
        assert_eq!(query.end, Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()));

        deactivate_budget(&db, &manager, created.id).await?;
        assert!(list_active_budgets(&db, org.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_explicit_end_date_wins() -> Result<()> {
        let (db, org) = setup_with_organization().await?;
        let manager = create_test_actor(&db, org.id, Role::Manager).await?;
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();

        let mut input = new_budget(start);
        input.end_date = Some(end);
        let created = create_budget(&db, &manager, input).await?;
        assert_eq!(budget_period(&created)?, (start, end));
        Ok(())
    }

    #[tokio::test]
    async fn test_deactivate_foreign_budget_is_not_found() -> Result<()> {
        let (db, org) = setup_with_organization().await?;
        let other = create_test_organization(&db, "Globex").await?;
        let manager = create_test_actor(&db, org.id, Role::Manager).await?;
        let other_manager = create_test_actor(&db, other.id, Role::Manager).await?;
        let created = create_budget(&db, &manager, new_budget(Utc::now())).await?;

        let result = deactivate_budget(&db, &other_manager, created.id).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }
}
