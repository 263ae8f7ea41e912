//! Expense business logic - recording expenses and querying them.
//!
//! [`ExpenseQuery`] is the one filter used by budgets, forecasts and analytics, so every
//! aggregate is computed over the same notion of "matching expenses".

use crate::{
    core::{business::validate_dimensions, session::Actor},
    entities::{ApprovalStatus, Expense, expense},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, QuerySelect, Select, Set, prelude::*};
use tracing::info;

/// Input for a user-entered expense.
#[derive(Debug, Clone)]
pub struct NewExpense {
    /// Positive amount
    pub amount: f64,
    /// Primary category
    pub category: String,
    /// Extra category tags
    pub categories: Vec<String>,
    /// Optional description
    pub description: Option<String>,
    /// When the expense happened
    pub date: DateTime<Utc>,
    /// Vendor name
    pub vendor: Option<String>,
    /// Business dimension
    pub business_id: Option<i64>,
    /// Location dimension
    pub location_id: Option<i64>,
    /// Tax-deductible flag
    pub tax_deductible: bool,
}

/// Filter over an organization's expenses. Empty lists and `None` mean "no constraint".
#[derive(Debug, Clone, Default)]
pub struct ExpenseQuery {
    /// Inclusive lower bound on `date`
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `date`
    pub end: Option<DateTime<Utc>>,
    /// Primary category in this set
    pub categories: Vec<String>,
    /// Business in this set
    pub business_ids: Vec<i64>,
    /// Location in this set
    pub location_ids: Vec<i64>,
    /// Vendor in this set
    pub vendors: Vec<String>,
    /// Inclusive minimum amount
    pub min_amount: Option<f64>,
    /// Inclusive maximum amount
    pub max_amount: Option<f64>,
    /// Only tax-deductible expenses
    pub tax_deductible_only: bool,
    /// Only expenses generated from this recurring template
    pub recurring_expense_id: Option<i64>,
}

impl ExpenseQuery {
    /// Query covering `[start, end)`.
    #[must_use]
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Self::default()
        }
    }

    fn apply(&self, organization_id: i64) -> Select<Expense> {
        let mut select = Expense::find().filter(expense::Column::OrganizationId.eq(organization_id));
        if let Some(start) = self.start {
            select = select.filter(expense::Column::Date.gte(start));
        }
        if let Some(end) = self.end {
            select = select.filter(expense::Column::Date.lt(end));
        }
        if !self.categories.is_empty() {
            select = select.filter(expense::Column::Category.is_in(self.categories.clone()));
        }
        if !self.business_ids.is_empty() {
            select = select.filter(expense::Column::BusinessId.is_in(self.business_ids.clone()));
        }
        if !self.location_ids.is_empty() {
            select = select.filter(expense::Column::LocationId.is_in(self.location_ids.clone()));
        }
        if !self.vendors.is_empty() {
            select = select.filter(expense::Column::Vendor.is_in(self.vendors.clone()));
        }
        if let Some(min) = self.min_amount {
            select = select.filter(expense::Column::Amount.gte(min));
        }
        if let Some(max) = self.max_amount {
            select = select.filter(expense::Column::Amount.lte(max));
        }
        if self.tax_deductible_only {
            select = select.filter(expense::Column::TaxDeductible.eq(true));
        }
        if let Some(recurring_id) = self.recurring_expense_id {
            select = select.filter(expense::Column::RecurringExpenseId.eq(recurring_id));
        }
        select
    }
}

/// Serializes category tags into the JSON column representation.
#[must_use]
pub fn tags_to_json(tags: &[String]) -> Json {
    Json::Array(
        tags.iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| Json::String(t.to_string()))
            .collect(),
    )
}

/// Reads category tags back from the JSON column. Non-string entries are skipped.
#[must_use]
pub fn tags_from_json(value: &Json) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}

pub(crate) fn validate_category(category: &str) -> Result<String> {
    let category = category.trim();
    if category.is_empty() {
        return Err(Error::validation("category", "cannot be empty"));
    }
    Ok(category.to_string())
}

/// Records an expense for the caller. New expenses start out `pending`.
///
/// # Errors
/// `InvalidAmount` for a non-positive or non-finite amount, `Validation` for an empty
/// category, `NotFound` for business/location ids outside the caller's organization.
pub async fn create_expense(
    db: &DatabaseConnection,
    actor: &Actor,
    new_expense: NewExpense,
) -> Result<expense::Model> {
    validate_amount(new_expense.amount)?;
    let category = validate_category(&new_expense.category)?;
    validate_dimensions(db, actor, new_expense.business_id, new_expense.location_id).await?;

    let created = expense::ActiveModel {
        organization_id: Set(actor.organization_id),
        user_id: Set(actor.user_id),
        amount: Set(new_expense.amount),
        category: Set(category),
        categories: Set(tags_to_json(&new_expense.categories)),
        description: Set(new_expense.description),
        date: Set(new_expense.date),
        vendor: Set(new_expense.vendor.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())),
        business_id: Set(new_expense.business_id),
        location_id: Set(new_expense.location_id),
        recurring_expense_id: Set(None),
        approval_status: Set(ApprovalStatus::Pending),
        tax_deductible: Set(new_expense.tax_deductible),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(expense_id = created.id, amount = created.amount, "Expense recorded");
    Ok(created)
}

/// Loads one of the caller's expenses.
pub async fn get_expense(
    db: &DatabaseConnection,
    actor: &Actor,
    expense_id: i64,
) -> Result<expense::Model> {
    let expense = Expense::find_by_id(expense_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("expense", expense_id))?;
    actor.ensure_same_organization(expense.organization_id, "expense", expense_id)?;
    Ok(expense)
}

/// Returns the organization's expenses matching `query`, oldest first.
///
/// # Arguments
/// * `conn` - Database connection or transaction
/// * `organization_id` - Tenant to read from; never crossed
/// * `query` - Date range, category, amount and dimension filters
pub async fn find_expenses<C: ConnectionTrait>(
    conn: &C,
    organization_id: i64,
    query: &ExpenseQuery,
) -> Result<Vec<expense::Model>> {
    query
        .apply(organization_id)
        .order_by_asc(expense::Column::Date)
        .order_by_asc(expense::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Sums the amounts of the organization's expenses matching `query`.
pub async fn sum_expenses<C: ConnectionTrait>(
    conn: &C,
    organization_id: i64,
    query: &ExpenseQuery,
) -> Result<f64> {
    let total: Option<Option<f64>> = query
        .apply(organization_id)
        .select_only()
        .column_as(expense::Column::Amount.sum(), "total")
        .into_tuple()
        .one(conn)
        .await?;
    Ok(total.flatten().unwrap_or(0.0))
}
