// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque modèle correspond à une table (PostgreSQL en prod, SQLite en test) avec SeaORM.
//
// Liste des modules:
//   - health : Health check API
//   - dto : Data Transfer Objects (résultats d'import, listes admin)
//   - users : Utilisateurs (credential salé + session)
//   - temp_signups : Inscriptions en attente de vérification email
//   - divisions / user_divisions : Branches d'activité et rattachement des users
//   - storage_units : Unités de stockage
//   - storage_contracts : Contrats de location (un seul actif par unité)
//   - storage_contract_users : Locataires d'un contrat (primary holder + co-locataires)
//
// Points d'attention:
//   - Tous les modèles utilisent SeaORM (pas de SQL brut)
//   - Les tables sont créées au démarrage depuis les entités (voir db.rs)
//
// ============================================================================

pub mod health;
pub mod dto;
pub mod users;
pub mod temp_signups;
pub mod divisions;
pub mod user_divisions;
pub mod storage_units;
pub mod storage_contracts;
pub mod storage_contract_users;
