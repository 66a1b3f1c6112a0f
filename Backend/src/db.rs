// connexion BD + création du schéma

use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Schema, Condition,
};
use tracing::{info, warn};

use crate::models::dto::DatabaseStatus;
use crate::models::{
    divisions, storage_contract_users, storage_contracts, storage_units, temp_signups, user_divisions, users,
};
use crate::utils::password::{SALT_NEEDS_RESET, STORAGE_IMPORT_PLACEHOLDER};

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Crée les tables manquantes à partir des entités (ordre = dépendances des clés étrangères)
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(users::Entity),
        schema.create_table_from_entity(divisions::Entity),
        schema.create_table_from_entity(storage_units::Entity),
        schema.create_table_from_entity(storage_contracts::Entity),
        schema.create_table_from_entity(user_divisions::Entity),
        schema.create_table_from_entity(storage_contract_users::Entity),
        schema.create_table_from_entity(temp_signups::Entity),
    ];

    for stmt in statements.iter_mut() {
        stmt.if_not_exists();
        db.execute(backend.build(&*stmt)).await?;
    }

    Ok(())
}

/// Marque les comptes qui ont un mot de passe mais pas de salt
/// (salt = TEMP_SALT_NEEDS_RESET) : ils passeront par le chemin legacy.
pub async fn mark_legacy_salts(db: &DatabaseConnection) -> Result<u64, DbErr> {
    let result = users::Entity::update_many()
        .col_expr(users::Column::Salt, Expr::value(SALT_NEEDS_RESET))
        .filter(
            Condition::any()
                .add(users::Column::Salt.is_null())
                .add(users::Column::Salt.eq("")),
        )
        .filter(users::Column::PasswordHash.ne(""))
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        warn!(
            "⚠️  {} user(s) without salt marked with {}",
            result.rows_affected, SALT_NEEDS_RESET
        );
    }

    Ok(result.rows_affected)
}

/// Compteurs pour la page d'état admin
pub async fn database_status(db: &DatabaseConnection) -> Result<DatabaseStatus, DbErr> {
    let user_count = users::Entity::find().count(db).await?;
    let users_needing_password_reset = users::Entity::find()
        .filter(
            Condition::any()
                .add(users::Column::Salt.is_null())
                .add(users::Column::Salt.is_in([SALT_NEEDS_RESET, STORAGE_IMPORT_PLACEHOLDER, ""])),
        )
        .count(db)
        .await?;
    let pending_signups = temp_signups::Entity::find().count(db).await?;
    let storage_units = storage_units::Entity::find().count(db).await?;
    let storage_contracts = storage_contracts::Entity::find().count(db).await?;

    let recommendation = if user_count == 0 {
        "Database is empty. Import users or set BOOTSTRAP_ADMIN_EMAIL to create the first admin."
    } else if users_needing_password_reset > 0 {
        "Some users still use legacy or placeholder credentials. Reset their passwords."
    } else {
        "Database is ready."
    };

    info!("📊 Database status: {} users, {} contracts", user_count, storage_contracts);

    Ok(DatabaseStatus {
        status: "connected".to_string(),
        user_count,
        users_needing_password_reset,
        pending_signups,
        storage_units,
        storage_contracts,
        recommendation: recommendation.to_string(),
    })
}

#[cfg(test)]
pub async fn test_connection() -> DatabaseConnection {
    use sea_orm::ConnectOptions;

    // Une seule connexion : chaque connexion sqlite::memory: a sa propre base
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(options).await.expect("sqlite memory connection");
    ensure_schema(&db).await.expect("schema creation");
    db
}
