//! Recurring expense business logic - templates that periodically materialize expenses.
//!
//! Generation inserts the expense and advances `next_due_date` in one transaction. The
//! advance is a compare-and-swap on the previous due date, so a retried or concurrent
//! request for the same occurrence produces `NotDue` instead of a duplicate expense.

use crate::{
    core::{
        business::validate_dimensions,
        expense::{tags_to_json, validate_amount, validate_category},
        schedule::{AdvanceMode, RecurrenceRule, calculate_next_due_date},
        session::Actor,
        unit_of_work::run_in_transaction,
    },
    entities::{ApprovalStatus, Frequency, RecurringExpense, Role, expense, recurring_expense},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Condition, QueryOrder, Set, prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// Input for a new recurring expense template.
#[derive(Debug, Clone)]
pub struct NewRecurringExpense {
    /// Positive amount of every generated expense
    pub amount: f64,
    /// Primary category
    pub category: String,
    /// Extra category tags
    pub categories: Vec<String>,
    /// Description copied to generated expenses
    pub description: Option<String>,
    /// Vendor copied to generated expenses
    pub vendor: Option<String>,
    /// Tax-deductible flag
    pub tax_deductible: bool,
    /// Business dimension
    pub business_id: Option<i64>,
    /// Location dimension
    pub location_id: Option<i64>,
    /// Period length
    pub frequency: Frequency,
    /// First occurrence
    pub start_date: DateTime<Utc>,
    /// No generation after this instant
    pub end_date: Option<DateTime<Utc>>,
    /// Day of month (1-31) for month-based frequencies
    pub day_of_month: Option<u32>,
    /// Weekday (0 = Sunday .. 6 = Saturday) for weekly frequency
    pub day_of_week: Option<u32>,
    /// Picked up by [`process_auto_create`]
    pub auto_create: bool,
}

/// Result of generating one expense from a template.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedExpense {
    /// The inserted expense
    pub expense: expense::Model,
    /// The template's new due date
    pub next_due_date: DateTime<Utc>,
}

/// Counts from one [`process_auto_create`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoCreateSummary {
    /// Expenses generated
    pub generated: usize,
    /// Templates another request generated first
    pub skipped: usize,
    /// Templates whose generation failed
    pub failed: usize,
}

fn to_column(value: Option<u32>) -> Result<Option<i32>> {
    value.map(i32::try_from).transpose().map_err(Into::into)
}

/// Creates a recurring expense owned by the caller, with its first due date computed
/// from `start_date` relative to `now`.
///
/// # Errors
/// `InvalidAmount`, `Validation` for an empty category, a day-of-month outside 1-31, a
/// weekday outside 0-6 or an end date before the start date, and `NotFound` for
/// business/location ids outside the caller's organization.
pub async fn create_recurring_expense_at(
    db: &DatabaseConnection,
    actor: &Actor,
    new_recurring: NewRecurringExpense,
    now: DateTime<Utc>,
) -> Result<recurring_expense::Model> {
    validate_amount(new_recurring.amount)?;
    let category = validate_category(&new_recurring.category)?;
    if new_recurring.day_of_month.is_some_and(|d| !(1..=31).contains(&d)) {
        return Err(Error::validation("day_of_month", "must be between 1 and 31"));
    }
    if new_recurring.day_of_week.is_some_and(|d| d > 6) {
        return Err(Error::validation(
            "day_of_week",
            "must be between 0 (Sunday) and 6 (Saturday)",
        ));
    }
    if new_recurring
        .end_date
        .is_some_and(|end| end < new_recurring.start_date)
    {
        return Err(Error::validation("end_date", "must not be before start_date"));
    }
    validate_dimensions(db, actor, new_recurring.business_id, new_recurring.location_id).await?;

    let rule = RecurrenceRule {
        frequency: new_recurring.frequency,
        day_of_month: new_recurring.day_of_month,
        day_of_week: new_recurring.day_of_week,
    };
    let next_due_date = calculate_next_due_date(
        new_recurring.start_date,
        &rule,
        AdvanceMode::CatchUpToNow,
        now,
    )?;

    let created = recurring_expense::ActiveModel {
        organization_id: Set(actor.organization_id),
        user_id: Set(actor.user_id),
        amount: Set(new_recurring.amount),
        category: Set(category),
        categories: Set(tags_to_json(&new_recurring.categories)),
        description: Set(new_recurring.description),
        vendor: Set(new_recurring.vendor),
        tax_deductible: Set(new_recurring.tax_deductible),
        business_id: Set(new_recurring.business_id),
        location_id: Set(new_recurring.location_id),
        frequency: Set(new_recurring.frequency),
        start_date: Set(new_recurring.start_date),
        end_date: Set(new_recurring.end_date),
        next_due_date: Set(next_due_date),
        day_of_month: Set(to_column(new_recurring.day_of_month)?),
        day_of_week: Set(to_column(new_recurring.day_of_week)?),
        auto_create: Set(new_recurring.auto_create),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        recurring_expense_id = created.id,
        next_due_date = %created.next_due_date,
        "Recurring expense created"
    );
    Ok(created)
}

/// [`create_recurring_expense_at`] relative to the current time.
pub async fn create_recurring_expense(
    db: &DatabaseConnection,
    actor: &Actor,
    new_recurring: NewRecurringExpense,
) -> Result<recurring_expense::Model> {
    create_recurring_expense_at(db, actor, new_recurring, Utc::now()).await
}

async fn find_own_active(
    db: &DatabaseConnection,
    actor: &Actor,
    recurring_expense_id: i64,
) -> Result<recurring_expense::Model> {
    RecurringExpense::find_by_id(recurring_expense_id)
        .filter(recurring_expense::Column::OrganizationId.eq(actor.organization_id))
        .filter(recurring_expense::Column::UserId.eq(actor.user_id))
        .filter(recurring_expense::Column::IsActive.eq(true))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("recurring expense", recurring_expense_id))
}

/// Generates the due expense of `template` and advances its due date by one period.
async fn generate_from_template(
    db: &DatabaseConnection,
    template: recurring_expense::Model,
    now: DateTime<Utc>,
) -> Result<GeneratedExpense> {
    if template.next_due_date > now {
        return Err(Error::NotDue {
            id: template.id,
            next_due_date: template.next_due_date,
        });
    }
    if let Some(end_date) = template.end_date.filter(|end| now > *end) {
        return Err(Error::RecurringExpired {
            id: template.id,
            end_date,
        });
    }

    let rule = RecurrenceRule::from_model(&template);
    let next_due_date =
        calculate_next_due_date(template.next_due_date, &rule, AdvanceMode::SingleStep, now)?;

    run_in_transaction(db, move |txn| {
        Box::pin(async move {
            let advanced = RecurringExpense::update_many()
                .col_expr(
                    recurring_expense::Column::NextDueDate,
                    Expr::value(next_due_date),
                )
                .col_expr(recurring_expense::Column::UpdatedAt, Expr::value(now))
                .filter(recurring_expense::Column::Id.eq(template.id))
                .filter(recurring_expense::Column::IsActive.eq(true))
                .filter(recurring_expense::Column::NextDueDate.eq(template.next_due_date))
                .exec(txn)
                .await?;
            if advanced.rows_affected != 1 {
                debug!(
                    recurring_expense_id = template.id,
                    "Occurrence already generated by another request"
                );
                return Err(Error::NotDue {
                    id: template.id,
                    next_due_date,
                });
            }

            let expense = expense::ActiveModel {
                organization_id: Set(template.organization_id),
                user_id: Set(template.user_id),
                amount: Set(template.amount),
                category: Set(template.category),
                categories: Set(template.categories),
                description: Set(template.description),
                date: Set(now),
                vendor: Set(template.vendor),
                business_id: Set(template.business_id),
                location_id: Set(template.location_id),
                recurring_expense_id: Set(Some(template.id)),
                approval_status: Set(ApprovalStatus::AutoApproved),
                tax_deductible: Set(template.tax_deductible),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await?;

            info!(
                recurring_expense_id = template.id,
                expense_id = expense.id,
                next_due_date = %next_due_date,
                "Recurring expense generated"
            );
            Ok(GeneratedExpense {
                expense,
                next_due_date,
            })
        })
    })
    .await
}

/// Generates the due expense of one of the caller's recurring expenses as of `now`.
///
/// # Arguments
/// * `db` - Database connection
/// * `actor` - Owner of the template
/// * `recurring_expense_id` - ID of the template to materialize
/// * `now` - Reference time for due checks and the catch-up advance
///
/// # Returns
/// The new expense and the template's advanced `next_due_date`
///
/// # Errors
/// `NotFound` unless the template is active and owned by the caller, `NotDue` before its
/// due date (or when the occurrence was generated concurrently), `RecurringExpired` after
/// its end date.
pub async fn generate_recurring_expense_at(
    db: &DatabaseConnection,
    actor: &Actor,
    recurring_expense_id: i64,
    now: DateTime<Utc>,
) -> Result<GeneratedExpense> {
    let template = find_own_active(db, actor, recurring_expense_id).await?;
    generate_from_template(db, template, now).await
}

/// [`generate_recurring_expense_at`] at the current time.
pub async fn generate_recurring_expense(
    db: &DatabaseConnection,
    actor: &Actor,
    recurring_expense_id: i64,
) -> Result<GeneratedExpense> {
    generate_recurring_expense_at(db, actor, recurring_expense_id, Utc::now()).await
}

/// Lists the caller's recurring expenses, soonest due first.
pub async fn list_recurring_expenses(
    db: &DatabaseConnection,
    actor: &Actor,
) -> Result<Vec<recurring_expense::Model>> {
    RecurringExpense::find()
        .filter(recurring_expense::Column::OrganizationId.eq(actor.organization_id))
        .filter(recurring_expense::Column::UserId.eq(actor.user_id))
        .order_by_asc(recurring_expense::Column::NextDueDate)
        .all(db)
        .await
        .map_err(Into::into)
}

fn due_condition(now: DateTime<Utc>) -> Condition {
    Condition::all()
        .add(recurring_expense::Column::IsActive.eq(true))
        .add(recurring_expense::Column::NextDueDate.lte(now))
        .add(
            Condition::any()
                .add(recurring_expense::Column::EndDate.is_null())
                .add(recurring_expense::Column::EndDate.gte(now)),
        )
}

/// Lists the caller's active recurring expenses that can be generated at `now`.
pub async fn list_due_recurring_expenses(
    db: &DatabaseConnection,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<Vec<recurring_expense::Model>> {
    RecurringExpense::find()
        .filter(recurring_expense::Column::OrganizationId.eq(actor.organization_id))
        .filter(recurring_expense::Column::UserId.eq(actor.user_id))
        .filter(due_condition(now))
        .order_by_asc(recurring_expense::Column::NextDueDate)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Deactivates a recurring expense. Owners may deactivate their own; managers and above
/// any in their organization.
pub async fn deactivate_recurring_expense(
    db: &DatabaseConnection,
    actor: &Actor,
    recurring_expense_id: i64,
) -> Result<recurring_expense::Model> {
    let template = RecurringExpense::find_by_id(recurring_expense_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("recurring expense", recurring_expense_id))?;
    actor.ensure_same_organization(
        template.organization_id,
        "recurring expense",
        recurring_expense_id,
    )?;
    if template.user_id != actor.user_id {
        actor.require_role(Role::Manager)?;
    }

    let mut active_model: recurring_expense::ActiveModel = template.into();
    active_model.is_active = Set(false);
    active_model.updated_at = Set(Utc::now());
    let updated = active_model.update(db).await?;
    info!(recurring_expense_id, "Recurring expense deactivated");
    Ok(updated)
}

/// Generates one expense for every due `auto_create` template, on behalf of its owner.
///
/// A template that fails is logged and counted, and the batch carries on with the rest.
///
/// # Returns
/// Counts of generated, skipped (generated concurrently) and failed templates
#[instrument(skip(db))]
pub async fn process_auto_create(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<AutoCreateSummary> {
    let due = RecurringExpense::find()
        .filter(recurring_expense::Column::AutoCreate.eq(true))
        .filter(due_condition(now))
        .order_by_asc(recurring_expense::Column::Id)
        .all(db)
        .await?;

    let mut summary = AutoCreateSummary::default();
    for template in due {
        let id = template.id;
        match generate_from_template(db, template, now).await {
            Ok(_) => summary.generated += 1,
            Err(Error::NotDue { .. }) => summary.skipped += 1,
            Err(e) => {
                warn!(recurring_expense_id = id, "Auto-create failed: {e}");
                summary.failed += 1;
            }
        }
    }

    info!(
        generated = summary.generated,
        skipped = summary.skipped,
        failed = summary.failed,
        "Auto-create run finished"
    );
    Ok(summary)
}
