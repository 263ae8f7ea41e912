//! Budget entity - a spending ceiling over a period.
//!
//! When `end_date` is absent the period is derived from `start_date` and
//! `period`. The optional category/business/location columns narrow which
//! expenses count against the ceiling.

use super::enums::BudgetPeriod;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Budget database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning organization
    pub organization_id: i64,
    /// Display name
    pub name: String,
    /// Spending ceiling for the period
    pub amount: f64,
    /// Period length
    pub period: BudgetPeriod,
    /// First instant of the period
    pub start_date: DateTimeUtc,
    /// Explicit end, overrides `start_date + period`
    pub end_date: Option<DateTimeUtc>,
    /// Only expenses with this primary category count
    pub category: Option<String>,
    /// Only expenses of this business count
    pub business_id: Option<i64>,
    /// Only expenses of this location count
    pub location_id: Option<i64>,
    /// Fraction of `amount` (0-1) at which the budget raises an alert
    pub alert_threshold: f64,
    /// Inactive budgets are never forecast
    pub is_active: bool,
    /// User who created the budget
    pub created_by: i64,
    /// When the budget was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Budget and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each budget belongs to one organization
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id"
    )]
    Organization,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
