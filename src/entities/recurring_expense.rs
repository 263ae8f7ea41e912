//! Recurring expense entity - a template that materializes expenses.
//!
//! `next_due_date` is the earliest instant at which the next expense may be
//! generated. It advances by exactly one period every time an expense is
//! generated from the template.

use super::enums::Frequency;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Recurring expense database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "recurring_expenses")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning organization
    pub organization_id: i64,
    /// User who owns the template
    pub user_id: i64,
    /// Amount copied into each generated expense
    pub amount: f64,
    /// Primary category copied into each generated expense
    pub category: String,
    /// Category tags copied into each generated expense
    pub categories: Json,
    /// Description copied into each generated expense
    pub description: Option<String>,
    /// Vendor copied into each generated expense
    pub vendor: Option<String>,
    /// Tax flag copied into each generated expense
    pub tax_deductible: bool,
    /// Business copied into each generated expense
    pub business_id: Option<i64>,
    /// Location copied into each generated expense
    pub location_id: Option<i64>,
    /// Recurrence frequency
    pub frequency: Frequency,
    /// First instant of the schedule
    pub start_date: DateTimeUtc,
    /// Generation is refused after this instant
    pub end_date: Option<DateTimeUtc>,
    /// Earliest instant at which the next generation is permitted
    pub next_due_date: DateTimeUtc,
    /// Day of month (1-31) pinned after each monthly/quarterly/yearly step
    pub day_of_month: Option<i32>,
    /// Weekday (0 = Sunday .. 6 = Saturday) weekly schedules snap to
    pub day_of_week: Option<i32>,
    /// Whether the maintenance run generates this template automatically
    pub auto_create: bool,
    /// Inactive templates are never generated
    pub is_active: bool,
    /// When the template was created
    pub created_at: DateTimeUtc,
    /// When the template was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `RecurringExpense` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One template has many generated expenses
    #[sea_orm(has_many = "super::expense::Entity")]
    Expenses,
}

impl Related<super::expense::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
