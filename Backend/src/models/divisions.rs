use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Branche d'activité (Storage, Contracting, Real Estate)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "divisions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_divisions::Entity")]
    UserDivisions,
}

impl Related<super::user_divisions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserDivisions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
