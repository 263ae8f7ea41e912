//! Organization entity - the tenant boundary.
//!
//! Every other row (users, businesses, budgets, expenses, invite codes) carries
//! an `organization_id`, and every query is scoped by it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Organization database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "organizations")]
pub struct Model {
    /// Unique identifier for the organization
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g., "Acme")
    pub name: String,
    /// Legacy flat invite code; joining with it grants `EMPLOYEE`
    #[sea_orm(unique)]
    pub invite_code: Option<String>,
    /// Free-form settings blob
    pub settings: Option<Json>,
    /// When the organization was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Organization and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One organization has many users
    #[sea_orm(has_many = "super::user::Entity")]
    Users,
    /// One organization has many invite codes
    #[sea_orm(has_many = "super::invite_code::Entity")]
    InviteCodes,
    /// One organization has many businesses
    #[sea_orm(has_many = "super::business::Entity")]
    Businesses,
    /// One organization has many budgets
    #[sea_orm(has_many = "super::budget::Entity")]
    Budgets,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::invite_code::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InviteCodes.def()
    }
}

impl Related<super::business::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Businesses.def()
    }
}

impl Related<super::budget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budgets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
