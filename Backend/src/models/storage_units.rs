// ============================================================================
// MODÈLE : STORAGE UNITS
// ============================================================================
//
// Description:
//   Unité de stockage physique (locker), indépendante des locataires.
//
// Points d'attention:
//   - unit_id est comparé de façon exacte (sensible à la casse)
//   - Une unité peut avoir plusieurs contrats dans le temps,
//     un seul avec is_active = true
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "storage_units")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub unit_id: String,

    pub unit_size: String,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub base_rent: Decimal,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::storage_contracts::Entity")]
    StorageContracts,
}

impl Related<super::storage_contracts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StorageContracts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
