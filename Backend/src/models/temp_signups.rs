// ============================================================================
// MODÈLE : TEMP SIGNUPS
// ============================================================================
//
// Description:
//   Pré-inscription en attente de vérification email.
//
// Workflow:
//   1. POST /api/auth/signup crée la ligne (display_id réservé, token unique)
//   2. Email envoyé avec le lien contenant verification_token
//   3. POST /api/auth/complete-registration crée le User (Client, confirmé)
//      avec le même display_id, puis supprime la ligne
//   4. Sinon la ligne est supprimée par le nettoyage des expirés
//
// Points d'attention:
//   - expires_at = created_at + SIGNUP_TTL_MINUTES (60 par défaut)
//   - Une nouvelle inscription supprime les anciennes pour le même email
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "temp_signups")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub display_id: String,

    pub first_name: String,
    pub last_name: String,
    pub email: String,

    #[serde(skip_serializing)]
    #[sea_orm(unique)]
    pub verification_token: String,

    pub created_at: DateTimeUtc,
    pub expires_at: DateTimeUtc,
}

impl Model {
    pub fn is_expired_at(&self, now: DateTimeUtc) -> bool {
        self.expires_at <= now
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
