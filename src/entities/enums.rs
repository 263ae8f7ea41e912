//! String-backed enumerations shared by several entities.
//!
//! Each enum is stored as a short upper- or lower-case string so rows stay
//! readable in the database. `Role` additionally carries the permission
//! ordering used by every authorization check.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Permission level of a user. Variants are declared from least to most
/// privileged, so the derived ordering is the permission ordering.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Records expenses
    #[sea_orm(string_value = "EMPLOYEE")]
    Employee,
    /// Imports/exports data, creates budgets
    #[sea_orm(string_value = "MANAGER")]
    Manager,
    /// Manages businesses and locations
    #[sea_orm(string_value = "BUSINESS_OWNER")]
    BusinessOwner,
    /// Manages users and invite codes of the organization
    #[sea_orm(string_value = "ORGANIZATION_ADMIN")]
    OrganizationAdmin,
    /// Platform operator
    #[sea_orm(string_value = "SUPER_ADMIN")]
    SuperAdmin,
}

/// How often a recurring expense materializes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Every day
    #[sea_orm(string_value = "daily")]
    Daily,
    /// Every seven days, optionally anchored to a weekday
    #[sea_orm(string_value = "weekly")]
    Weekly,
    /// Every month, optionally anchored to a day of the month
    #[sea_orm(string_value = "monthly")]
    Monthly,
    /// Every three months
    #[sea_orm(string_value = "quarterly")]
    Quarterly,
    /// Every twelve months
    #[sea_orm(string_value = "yearly")]
    Yearly,
}

/// Length of a budget period.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    /// One calendar month from the start date
    #[sea_orm(string_value = "monthly")]
    Monthly,
    /// Three calendar months from the start date
    #[sea_orm(string_value = "quarterly")]
    Quarterly,
    /// One calendar year from the start date
    #[sea_orm(string_value = "yearly")]
    Yearly,
}

/// Workflow state of an expense.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting review
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Approved by a reviewer
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Rejected by a reviewer
    #[sea_orm(string_value = "rejected")]
    Rejected,
    /// Created by the system (recurring generation)
    #[sea_orm(string_value = "auto_approved")]
    AutoApproved,
}
