/*
services/user_import_service.rs
├─ import_users()          ← ADDITIF : ajoute les users du fichier
├─ replace_all_users()     ← DESTRUCTIF : supprime tous les users puis importe (confirm obligatoire)
├─ create_initial_users()  ← seed du premier admin, seulement si la table est vide
└─ list_users()            ← résumé pour la page admin, filtre par divisions (AND / OR)

Les erreurs de ligne sont accumulées dans le résultat, le batch continue.
*/
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use tracing::{error, info, warn};
use validator::ValidateEmail;

use crate::error::ImportError;
use crate::models::dto::{ImportedUser, RowIssue, SeededUser, UserImportResult, UserSummary};
use crate::models::users::{self, PhoneType, Role};
use crate::models::{divisions, storage_contract_users, temp_signups, user_divisions};
use crate::services::division_service::{DivisionFilter, DivisionService, parse_division_list};
use crate::services::import::{self, FieldSpec, FileFormat, ParsedRow};
use crate::utils::display_id::generate_display_id;
use crate::utils::password::{self, CredentialState};

pub const USER_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("email", &["email", "e-mail", "emailaddress"]),
    FieldSpec::required("firstname", &["firstname", "first name", "fname"]),
    FieldSpec::required("lastname", &["lastname", "last name", "lname"]),
    FieldSpec::required("role", &["role"]),
    FieldSpec::required("password", &["password", "pwd"]),
    FieldSpec::optional("phone", &["phone", "phonenumber", "phone number", "telephone"]),
    FieldSpec::optional("phonetype", &["phonetype", "phone type", "phone_type"]),
    FieldSpec::optional("phone2", &["phone2", "phone 2", "second phone", "secondphone"]),
    FieldSpec::optional("phone2type", &["phone2type", "phone 2 type", "phone2_type", "second phone type"]),
    FieldSpec::optional("address", &["address", "street", "streetaddress", "street address"]),
    FieldSpec::optional("city", &["city"]),
    FieldSpec::optional("state", &["state", "st"]),
    FieldSpec::optional("zip", &["zip", "zipcode", "zip code", "postal code"]),
    FieldSpec::optional("division", &["division", "divisions", "business line"]).exact_only(),
];

const MAX_DISPLAY_ID_ATTEMPTS: usize = 50;

/// Tire des display ids jusqu'à en trouver un libre (users, temp_signups, ids déjà réservés dans l'import)
pub async fn allocate_display_id<C: ConnectionTrait>(
    db: &C,
    in_flight: &HashSet<String>,
) -> Result<Option<String>, DbErr> {
    for _ in 0..MAX_DISPLAY_ID_ATTEMPTS {
        let candidate = generate_display_id();
        if in_flight.contains(&candidate) {
            continue;
        }
        let taken_by_user = users::Entity::find()
            .filter(users::Column::DisplayId.eq(candidate.as_str()))
            .count(db)
            .await?
            > 0;
        let taken_by_signup = temp_signups::Entity::find()
            .filter(temp_signups::Column::DisplayId.eq(candidate.as_str()))
            .count(db)
            .await?
            > 0;
        if !taken_by_user && !taken_by_signup {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

// Ligne validée, en attente d'écriture
struct PendingUser {
    row: usize,
    email: String,
    model: users::ActiveModel,
    division_ids: Vec<i32>,
    echo: ImportedUser,
}

pub struct UserImportService;

impl UserImportService {
    /// Import additif : les emails déjà présents sont rejetés ligne par ligne
    pub async fn import_users(
        db: &DatabaseConnection,
        bytes: &[u8],
        format: FileFormat,
        batch_size: usize,
    ) -> Result<UserImportResult, ImportError> {
        let table = import::parse_table(bytes, format, USER_FIELDS)?;

        let mut result = Self::import_rows(db, table.rows, batch_size).await?;
        prepend_warnings(&mut result, table.warnings);
        Ok(result)
    }

    /// Remplacement complet : SUPPRIME tous les users (et leurs associations) avant l'import.
    /// Le fichier est validé avant toute suppression. `keep_user_id` (l'admin appelant) est conservé.
    pub async fn replace_all_users(
        db: &DatabaseConnection,
        bytes: &[u8],
        format: FileFormat,
        batch_size: usize,
        confirm: bool,
        keep_user_id: Option<i32>,
    ) -> Result<UserImportResult, ImportError> {
        if !confirm {
            return Err(ImportError::ConfirmationRequired);
        }

        let table = import::parse_table(bytes, format, USER_FIELDS)?;

        let removed = Self::clear_users(db, keep_user_id).await?;
        warn!("🧨 Full replace: {} existing user(s) deleted before import", removed);

        let mut result = Self::import_rows(db, table.rows, batch_size).await?;
        prepend_warnings(&mut result, table.warnings);
        result.message = format!("{} (replaced {} existing users)", result.message, removed);
        Ok(result)
    }

    /// Logique commune CSV / Excel
    pub async fn import_rows(
        db: &DatabaseConnection,
        rows: Vec<ParsedRow>,
        batch_size: usize,
    ) -> Result<UserImportResult, DbErr> {
        let batch_size = batch_size.max(1);
        let divisions = DivisionService::ensure_default_divisions(db).await?;

        let mut result = UserImportResult {
            total_processed: rows.len(),
            ..Default::default()
        };
        let mut pending: Vec<PendingUser> = Vec::with_capacity(batch_size);
        let mut seen_emails: HashMap<String, usize> = HashMap::new();
        let mut reserved_ids: HashSet<String> = HashSet::new();

        for row in rows {
            let n = row.row_number;

            // 1. Validation
            let (email, plain_password, role) = match validate_row(&row) {
                Ok(valid) => valid,
                Err(message) => {
                    result.errors.push(RowIssue::new(n, message));
                    continue;
                }
            };

            if let Some(first_row) = seen_emails.get(&email) {
                result.errors.push(RowIssue::new(
                    n,
                    format!("Duplicate email '{}' in file (first seen on row {})", email, first_row),
                ));
                continue;
            }
            match users::Entity::find().filter(users::email_matches(&email)).count(db).await {
                Ok(0) => {}
                Ok(_) => {
                    result.errors.push(RowIssue::new(n, format!("User with email {} already exists", email)));
                    continue;
                }
                Err(e) => {
                    error!(row = n, "❌ Failed to look up existing user: {}", e);
                    result.errors.push(RowIssue::new(n, "Failed to check for an existing user"));
                    continue;
                }
            }

            // 2. Display id unique
            let display_id = match allocate_display_id(db, &reserved_ids).await {
                Ok(Some(id)) => id,
                Ok(None) => {
                    result.errors.push(RowIssue::new(n, "Could not allocate a unique user id"));
                    continue;
                }
                Err(e) => {
                    error!(row = n, "❌ Failed to allocate user id: {}", e);
                    result.errors.push(RowIssue::new(n, "Could not allocate a unique user id"));
                    continue;
                }
            };

            // 3. Credential + user
            let (hash, salt) = password::new_credential(&plain_password);
            let first_name = row.get("firstname").unwrap_or("Unknown").to_string();
            let last_name = row.get("lastname").unwrap_or("User").to_string();

            let phone_type = phone_type_of(&row, "phonetype", &mut result.warnings);
            let phone2_type = phone_type_of(&row, "phone2type", &mut result.warnings);

            let mut division_ids = Vec::new();
            if let Some(text) = row.get("division") {
                let parsed = parse_division_list(text);
                for name in parsed.names {
                    if let Some(division) = divisions.get(&name.to_lowercase()) {
                        division_ids.push(division.id);
                    }
                }
                for unknown in parsed.unknown {
                    warn!(row = n, "Unknown division '{}'", unknown);
                    result.warnings.push(RowIssue::new(n, format!("Unknown division '{}' ignored", unknown)));
                }
            }

            let model = users::ActiveModel {
                display_id: Set(Some(display_id.clone())),
                email: Set(email.clone()),
                password_hash: Set(hash),
                salt: Set(Some(salt)),
                role: Set(role.as_str().to_string()),
                first_name: Set(first_name.clone()),
                last_name: Set(last_name.clone()),
                is_confirmed: Set(true),
                phone: Set(row.get("phone").map(str::to_string)),
                phone_type: Set(phone_type),
                phone2: Set(row.get("phone2").map(str::to_string)),
                phone2_type: Set(phone2_type),
                address: Set(row.get("address").map(str::to_string)),
                city: Set(row.get("city").map(str::to_string)),
                state: Set(row.get("state").map(str::to_string)),
                zip_code: Set(row.get("zip").map(str::to_string)),
                created_at: Set(Utc::now()),
                ..Default::default()
            };

            seen_emails.insert(email.clone(), n);
            reserved_ids.insert(display_id.clone());
            pending.push(PendingUser {
                row: n,
                email: email.clone(),
                model,
                division_ids,
                echo: ImportedUser {
                    email,
                    role: role.as_str().to_string(),
                    user_id: display_id,
                    name: format!("{} {}", first_name, last_name),
                },
            });

            // 4. Écriture par lots
            if pending.len() >= batch_size {
                flush(db, &mut pending, &mut result).await;
            }
        }

        flush(db, &mut pending, &mut result).await;

        result.error_count = result.errors.len();
        result.success = true;
        result.message = format!(
            "Imported {} of {} users ({} errors)",
            result.success_count, result.total_processed, result.error_count
        );
        info!(
            "📥 User import finished: {} created, {} errors",
            result.success_count, result.error_count
        );

        Ok(result)
    }

    /// Seed : crée un admin confirmé seulement si aucun user n'existe
    pub async fn create_initial_users(
        db: &DatabaseConnection,
        email: &str,
        initial_password: &str,
    ) -> Result<Option<SeededUser>, DbErr> {
        if users::Entity::find().count(db).await? > 0 {
            info!("Users already exist, initial seed skipped");
            return Ok(None);
        }

        let display_id = allocate_display_id(db, &HashSet::new())
            .await?
            .ok_or_else(|| DbErr::Custom("Could not allocate a unique user id".to_string()))?;
        let (hash, salt) = password::new_credential(initial_password);
        let email = users::normalize_email(email);

        users::ActiveModel {
            display_id: Set(Some(display_id.clone())),
            email: Set(email.clone()),
            password_hash: Set(hash),
            salt: Set(Some(salt)),
            role: Set(Role::Admin.as_str().to_string()),
            first_name: Set("System".to_string()),
            last_name: Set("Administrator".to_string()),
            is_confirmed: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(email = %email, "👤 Initial admin created");

        Ok(Some(SeededUser {
            email,
            role: Role::Admin.as_str().to_string(),
            user_id: display_id,
            password: "********".to_string(),
        }))
    }

    pub async fn list_users(db: &DatabaseConnection, filter: &DivisionFilter) -> Result<Vec<UserSummary>, DbErr> {
        let all_users = users::Entity::find().order_by_asc(users::Column::Id).all(db).await?;

        let division_names: HashMap<i32, String> = divisions::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|d| (d.id, d.name))
            .collect();

        // seules les associations actives comptent
        let mut divisions_by_user: HashMap<i32, Vec<String>> = HashMap::new();
        let mut active_ids: HashMap<i32, HashSet<i32>> = HashMap::new();
        for link in user_divisions::Entity::find()
            .filter(user_divisions::Column::IsActive.eq(true))
            .all(db)
            .await?
        {
            active_ids.entry(link.user_id).or_default().insert(link.division_id);
            if let Some(name) = division_names.get(&link.division_id) {
                divisions_by_user.entry(link.user_id).or_default().push(name.clone());
            }
        }

        let no_division = HashSet::new();
        Ok(all_users
            .into_iter()
            .filter(|u| filter.matches(active_ids.get(&u.id).unwrap_or(&no_division)))
            .map(|u| UserSummary {
                id: u.id,
                has_valid_salt: CredentialState::from_salt(u.salt.as_deref()) == CredentialState::Salted,
                divisions: divisions_by_user.remove(&u.id).unwrap_or_default(),
                display_id: u.display_id,
                email: u.email,
                role: u.role,
                first_name: u.first_name,
                last_name: u.last_name,
                is_confirmed: u.is_confirmed,
                last_login_at: u.last_login_at,
                created_at: u.created_at,
            })
            .collect())
    }

    /// Supprime tous les users (sauf `keep_user_id`) et leurs associations
    async fn clear_users(db: &DatabaseConnection, keep_user_id: Option<i32>) -> Result<u64, DbErr> {
        let txn = db.begin().await?;

        let mut divisions_delete = user_divisions::Entity::delete_many();
        let mut contract_users_delete = storage_contract_users::Entity::delete_many();
        let mut users_delete = users::Entity::delete_many();
        if let Some(id) = keep_user_id {
            divisions_delete = divisions_delete.filter(user_divisions::Column::UserId.ne(id));
            contract_users_delete = contract_users_delete.filter(storage_contract_users::Column::UserId.ne(id));
            users_delete = users_delete.filter(users::Column::Id.ne(id));
        }

        divisions_delete.exec(&txn).await?;
        contract_users_delete.exec(&txn).await?;
        let removed = users_delete.exec(&txn).await?.rows_affected;

        txn.commit().await?;
        Ok(removed)
    }
}

/// email, mot de passe et rôle ; les messages suivent l'ordre des contrôles
fn validate_row(row: &ParsedRow) -> Result<(String, String, Role), String> {
    let email = match row.get("email") {
        Some(email) => users::normalize_email(email),
        None => return Err("Email is required".to_string()),
    };
    let password = match row.get("password") {
        Some(password) => password.to_string(),
        None => return Err("Password is required".to_string()),
    };
    let raw_role = row.get("role").unwrap_or_default();
    let role = Role::parse(raw_role)
        .ok_or_else(|| format!("Invalid role '{}'. Must be Admin, Client, or Manager", raw_role))?;

    if !email.validate_email() {
        return Err(format!("Invalid email '{}'", email));
    }

    Ok((email, password, role))
}

fn prepend_warnings(result: &mut UserImportResult, mut header_warnings: Vec<RowIssue>) {
    header_warnings.append(&mut result.warnings);
    result.warnings = header_warnings;
}

fn phone_type_of(row: &ParsedRow, key: &str, warnings: &mut Vec<RowIssue>) -> Option<PhoneType> {
    let raw = row.get(key)?;
    let parsed = PhoneType::parse(raw);
    if parsed.is_none() {
        warnings.push(RowIssue::new(row.row_number, format!("Unknown phone type '{}' ignored", raw)));
    }
    parsed
}

/// Écrit le lot en une transaction ; si le lot échoue, on repasse ligne par ligne
/// pour isoler les lignes fautives.
async fn flush(db: &DatabaseConnection, pending: &mut Vec<PendingUser>, result: &mut UserImportResult) {
    if pending.is_empty() {
        return;
    }
    let batch = std::mem::take(pending);

    match write_batch(db, &batch).await {
        Ok(()) => {
            result.success_count += batch.len();
            result.created_users.extend(batch.into_iter().map(|p| p.echo));
        }
        Err(batch_error) => {
            warn!("⚠️  Batch insert failed ({}), retrying rows one by one", batch_error);

            for p in batch {
                match write_one(db, &p).await {
                    Ok(()) => {
                        result.success_count += 1;
                        result.created_users.push(p.echo);
                    }
                    Err(e) => {
                        let message = match e.sql_err() {
                            Some(SqlErr::UniqueConstraintViolation(_)) => {
                                format!("User with email {} already exists", p.email)
                            }
                            _ => {
                                error!(row = p.row, "❌ Failed to save user: {}", e);
                                "Failed to save user".to_string()
                            }
                        };
                        result.errors.push(RowIssue::new(p.row, message));
                    }
                }
            }
        }
    }
}

// insert_many + divisions, tout ou rien
async fn write_batch(db: &DatabaseConnection, batch: &[PendingUser]) -> Result<(), DbErr> {
    let txn = db.begin().await?;

    let written: Result<(), DbErr> = async {
        users::Entity::insert_many(batch.iter().map(|p| p.model.clone()))
            .exec(&txn)
            .await?;

        let emails: Vec<&str> = batch.iter().map(|p| p.email.as_str()).collect();
        let ids: HashMap<String, i32> = users::Entity::find()
            .filter(users::Column::Email.is_in(emails))
            .all(&txn)
            .await?
            .into_iter()
            .map(|u| (u.email, u.id))
            .collect();

        for p in batch {
            if let Some(user_id) = ids.get(&p.email) {
                for division_id in &p.division_ids {
                    DivisionService::assign(&txn, *user_id, *division_id).await?;
                }
            }
        }
        Ok(())
    }
    .await;

    match written {
        Ok(()) => txn.commit().await,
        Err(e) => {
            txn.rollback().await?;
            Err(e)
        }
    }
}

// Une ligne : user + divisions dans la même transaction
async fn write_one(db: &DatabaseConnection, p: &PendingUser) -> Result<(), DbErr> {
    let txn = db.begin().await?;

    let written: Result<(), DbErr> = async {
        let user = p.model.clone().insert(&txn).await?;
        for division_id in &p.division_ids {
            DivisionService::assign(&txn, user.id, *division_id).await?;
        }
        Ok(())
    }
    .await;

    match written {
        Ok(()) => txn.commit().await,
        Err(e) => {
            txn.rollback().await?;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::services::division_service::FilterOperator;
    use crate::services::security_service::SecurityService;
    use crate::utils::display_id::is_valid_display_id;
    use rust_xlsxwriter::Workbook;

    fn row(n: usize, email: &str, password: &str, role: &str) -> ParsedRow {
        ParsedRow::new(n)
            .with("email", email)
            .with("password", password)
            .with("role", role)
            .with("firstname", "Test")
            .with("lastname", "User")
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_rows() {
        let db = test_connection().await;
        let rows = vec![
            row(2, "a@example.com", "pw-a", "Client"),
            row(3, "b@example.com", "", "Client"),
            row(4, "c@example.com", "pw-c", "manager"),
        ];

        let result = UserImportService::import_rows(&db, rows, 50).await.unwrap();

        assert_eq!(result.success_count, 2);
        assert_eq!(result.errors, vec![RowIssue::new(3, "Password is required")]);
        assert!(SecurityService::get_user_by_email(&db, "a@example.com").await.unwrap().is_some());
        assert!(SecurityService::get_user_by_email(&db, "b@example.com").await.unwrap().is_none());
        let c = SecurityService::get_user_by_email(&db, "c@example.com").await.unwrap().unwrap();
        assert_eq!(c.role, "Manager");
        assert!(c.is_confirmed);
        assert!(is_valid_display_id(c.display_id.as_deref().unwrap()));

        // Le mot de passe importé fonctionne
        assert!(SecurityService::authenticate(&db, "c@example.com", "pw-c", true).await.is_ok());
    }

    #[tokio::test]
    async fn test_validation_messages() {
        let db = test_connection().await;
        let rows = vec![
            row(2, "", "pw", "Client"),
            row(3, "x@example.com", "pw", "Owner"),
            row(4, "not-an-email", "pw", "Admin"),
        ];

        let result = UserImportService::import_rows(&db, rows, 50).await.unwrap();

        assert_eq!(result.success_count, 0);
        assert_eq!(result.errors[0], RowIssue::new(2, "Email is required"));
        assert_eq!(
            result.errors[1],
            RowIssue::new(3, "Invalid role 'Owner'. Must be Admin, Client, or Manager")
        );
        assert_eq!(result.errors[2].row, 4);
        assert_eq!(result.error_count, 3);
    }

    #[tokio::test]
    async fn test_duplicates_in_file_and_database() {
        let db = test_connection().await;
        UserImportService::import_rows(&db, vec![row(2, "a@example.com", "pw", "Client")], 50)
            .await
            .unwrap();

        let rows = vec![
            row(2, "A@Example.com", "pw", "Client"),
            row(3, "b@example.com", "pw", "Client"),
            row(4, "B@example.com", "pw", "Client"),
        ];
        let result = UserImportService::import_rows(&db, rows, 50).await.unwrap();

        assert_eq!(result.success_count, 1);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].row, 2);
        assert_eq!(result.errors[1].row, 4);
    }

    #[tokio::test]
    async fn test_small_batches_and_echo_without_password() {
        let db = test_connection().await;
        let rows = (0..7)
            .map(|i| row(i + 2, &format!("user{}@example.com", i), "pw", "Client"))
            .collect();

        let result = UserImportService::import_rows(&db, rows, 3).await.unwrap();

        assert_eq!(result.success_count, 7);
        assert_eq!(result.created_users.len(), 7);
        assert_eq!(users::Entity::find().count(&db).await.unwrap(), 7);

        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("password"));
    }

    #[tokio::test]
    async fn test_lookup_failure_becomes_row_error() {
        let db = test_connection().await;
        db.execute_unprepared("DROP TABLE temp_signups").await.unwrap();

        let rows = vec![row(2, "a@example.com", "pw", "Client"), row(3, "b@example.com", "pw", "Client")];
        let result = UserImportService::import_rows(&db, rows, 50).await.unwrap();

        assert_eq!(result.success_count, 0);
        assert_eq!(result.error_count, 2);
        assert_eq!(result.errors[0], RowIssue::new(2, "Could not allocate a unique user id"));
        assert_eq!(result.errors[1].row, 3);
    }

    #[tokio::test]
    async fn test_failed_division_link_rolls_back_the_user() {
        let db = test_connection().await;
        db.execute_unprepared("DROP TABLE user_divisions").await.unwrap();

        let rows = vec![
            row(2, "a@example.com", "pw", "Client").with("division", "Storage"),
            row(3, "b@example.com", "pw", "Client"),
        ];
        let result = UserImportService::import_rows(&db, rows, 50).await.unwrap();

        assert_eq!(result.success_count, 1);
        assert_eq!(result.errors, vec![RowIssue::new(2, "Failed to save user")]);
        assert!(SecurityService::get_user_by_email(&db, "a@example.com").await.unwrap().is_none());
        assert!(SecurityService::get_user_by_email(&db, "b@example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_csv_import_with_divisions_and_contact_fields() {
        let db = test_connection().await;
        let csv = "Email,First Name,Last Name,Role,Password,Phone,Phone Type,Division\n\
                   jane@example.com,Jane,Doe,Client,pw,555-0100,mobile,\"Storage, Real Estate\"\n";

        let result = UserImportService::import_users(&db, csv.as_bytes(), FileFormat::Csv, 50)
            .await
            .unwrap();

        assert_eq!(result.success_count, 1);
        let summary = UserImportService::list_users(&db, &DivisionFilter::default()).await.unwrap();
        assert_eq!(summary.len(), 1);
        assert!(summary[0].has_valid_salt);
        assert_eq!(summary[0].divisions.len(), 2);

        let jane = SecurityService::get_user_by_email(&db, "jane@example.com").await.unwrap().unwrap();
        assert_eq!(jane.phone.as_deref(), Some("555-0100"));
        assert_eq!(jane.phone_type, Some(PhoneType::Cell));
    }

    #[tokio::test]
    async fn test_list_users_division_filter() {
        let db = test_connection().await;
        let rows = vec![
            row(2, "both@example.com", "pw", "Client").with("division", "Storage; Real Estate"),
            row(3, "storage@example.com", "pw", "Client").with("division", "Storage"),
            row(4, "none@example.com", "pw", "Client"),
        ];
        UserImportService::import_rows(&db, rows, 50).await.unwrap();

        let divisions = DivisionService::ensure_default_divisions(&db).await.unwrap();
        let storage = divisions["storage"].id;
        let real_estate = divisions["real estate"].id;
        let emails = |users: Vec<UserSummary>| users.into_iter().map(|u| u.email).collect::<Vec<_>>();

        let all = UserImportService::list_users(&db, &DivisionFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let and = DivisionFilter { division_ids: vec![storage, real_estate], operator: FilterOperator::And };
        assert_eq!(emails(UserImportService::list_users(&db, &and).await.unwrap()), vec!["both@example.com"]);

        let or = DivisionFilter { division_ids: vec![storage, real_estate], operator: FilterOperator::Or };
        assert_eq!(
            emails(UserImportService::list_users(&db, &or).await.unwrap()),
            vec!["both@example.com", "storage@example.com"]
        );

        // association désactivée → ignorée
        let storage_user = SecurityService::get_user_by_email(&db, "storage@example.com").await.unwrap().unwrap();
        user_divisions::Entity::update_many()
            .col_expr(user_divisions::Column::IsActive, sea_orm::sea_query::Expr::value(false))
            .filter(user_divisions::Column::UserId.eq(storage_user.id))
            .exec(&db)
            .await
            .unwrap();
        let only_storage = DivisionFilter { division_ids: vec![storage], operator: FilterOperator::Or };
        assert_eq!(
            emails(UserImportService::list_users(&db, &only_storage).await.unwrap()),
            vec!["both@example.com"]
        );
    }

    #[tokio::test]
    async fn test_xlsx_import_keeps_sheet_row_numbers() {
        let db = test_connection().await;
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, header) in ["Email", "First Name", "Last Name", "Role", "Password", "Phone"].into_iter().enumerate() {
            sheet.write_string(0, col as u16, header).unwrap();
        }
        for (col, value) in ["jane@example.com", "Jane", "Doe", "Client", "pw"].into_iter().enumerate() {
            sheet.write_string(1, col as u16, value).unwrap();
        }
        sheet.write_number(1, 5, 8143101159.0).unwrap();
        // ligne 3 vide
        for (col, value) in ["bob@example.com", "Bob", "Ray", "Owner", "pw"].into_iter().enumerate() {
            sheet.write_string(3, col as u16, value).unwrap();
        }
        let bytes = workbook.save_to_buffer().unwrap();

        let result = UserImportService::import_users(&db, &bytes, FileFormat::Spreadsheet, 50)
            .await
            .unwrap();

        assert_eq!(result.total_processed, 2);
        assert_eq!(result.success_count, 1);
        assert_eq!(
            result.errors,
            vec![RowIssue::new(4, "Invalid role 'Owner'. Must be Admin, Client, or Manager")]
        );
        let jane = SecurityService::get_user_by_email(&db, "jane@example.com").await.unwrap().unwrap();
        assert_eq!(jane.first_name, "Jane");
        assert_eq!(jane.phone.as_deref(), Some("8143101159"));
    }

    #[tokio::test]
    async fn test_missing_column_aborts_before_any_row() {
        let db = test_connection().await;
        let csv = "Email,First Name,Last Name,Password\njane@example.com,Jane,Doe,pw\n";

        let result = UserImportService::import_users(&db, csv.as_bytes(), FileFormat::Csv, 50).await;

        assert!(matches!(result, Err(ImportError::MissingColumns { .. })));
        assert_eq!(users::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_replace_requires_confirmation_and_keeps_caller() {
        let db = test_connection().await;
        UserImportService::import_rows(
            &db,
            vec![row(2, "admin@example.com", "pw", "Admin"), row(3, "old@example.com", "pw", "Client")],
            50,
        )
        .await
        .unwrap();
        let admin = SecurityService::get_user_by_email(&db, "admin@example.com").await.unwrap().unwrap();

        let csv = "email,firstname,lastname,role,password\nnew@example.com,New,User,Client,pw\n";

        let refused =
            UserImportService::replace_all_users(&db, csv.as_bytes(), FileFormat::Csv, 50, false, Some(admin.id)).await;
        assert!(matches!(refused, Err(ImportError::ConfirmationRequired)));
        assert_eq!(users::Entity::find().count(&db).await.unwrap(), 2);

        let result =
            UserImportService::replace_all_users(&db, csv.as_bytes(), FileFormat::Csv, 50, true, Some(admin.id))
                .await
                .unwrap();
        assert_eq!(result.success_count, 1);
        assert!(SecurityService::get_user_by_email(&db, "old@example.com").await.unwrap().is_none());
        assert!(SecurityService::get_user_by_email(&db, "admin@example.com").await.unwrap().is_some());
        assert!(SecurityService::get_user_by_email(&db, "new@example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_initial_users_only_on_empty_table() {
        let db = test_connection().await;

        let seeded = UserImportService::create_initial_users(&db, " Admin@Example.com ", "change-me")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seeded.email, "admin@example.com");
        assert_eq!(seeded.password, "********");

        let again = UserImportService::create_initial_users(&db, "other@example.com", "x").await.unwrap();
        assert!(again.is_none());

        let admin = SecurityService::authenticate(&db, "admin@example.com", "change-me", true).await.unwrap();
        assert!(admin.is_admin());
    }
}
