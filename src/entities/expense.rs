//! Expense entity - a concrete spending record.
//!
//! Expenses are either entered by users or materialized from a recurring
//! expense template, in which case `recurring_expense_id` links back to it and
//! the status is `auto_approved`.

use super::enums::ApprovalStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Expense database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning organization
    pub organization_id: i64,
    /// User who recorded (or owns the template of) the expense
    pub user_id: i64,
    /// Amount in the organization's currency, always positive
    pub amount: f64,
    /// Primary category
    pub category: String,
    /// Additional category tags, a JSON array of strings
    pub categories: Json,
    /// Optional free-text description
    pub description: Option<String>,
    /// When the expense happened
    pub date: DateTimeUtc,
    /// Vendor name
    pub vendor: Option<String>,
    /// Business dimension
    pub business_id: Option<i64>,
    /// Location dimension
    pub location_id: Option<i64>,
    /// Template this expense was generated from
    pub recurring_expense_id: Option<i64>,
    /// Review workflow state
    pub approval_status: ApprovalStatus,
    /// Whether the expense is tax-deductible
    pub tax_deductible: bool,
    /// When the row was inserted
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Expense and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each expense belongs to one organization
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id"
    )]
    Organization,
    /// Generated expenses point at their template
    #[sea_orm(
        belongs_to = "super::recurring_expense::Entity",
        from = "Column::RecurringExpenseId",
        to = "super::recurring_expense::Column::Id"
    )]
    RecurringExpense,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl Related<super::recurring_expense::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecurringExpense.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
