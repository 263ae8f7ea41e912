//! Business entity - a filtering dimension below the organization.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Business database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "businesses")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning organization
    pub organization_id: i64,
    /// Name, unique within the organization
    pub name: String,
    /// Optional free-text description
    pub description: Option<String>,
    /// When the business was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Business and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each business belongs to one organization
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id"
    )]
    Organization,
    /// One business has many locations
    #[sea_orm(has_many = "super::location::Entity")]
    Locations,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl Related<super::location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Locations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
