/*
services/storage_import_service.rs
├─ import_storage()      ← fichier → unités / contrats / locataires (find-or-create)
├─ list_contracts()      ← contrats + locataires actifs
├─ list_units()          ← unités + contrat actif
└─ clear_all_storage()   ← DESTRUCTIF : vide les 3 tables storage

Une ligne = une transaction. Les lignes sont traitées dans l'ordre : une ligne
peut réutiliser l'unité / le contrat / le user créés par une ligne précédente.
Réimporter le même fichier ne crée pas de doublons (warnings à la place).
*/
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::ImportError;
use crate::models::dto::{
    ContractSummary, ContractTenant, CreatedContract, RowIssue, StorageClearResult, StorageImportResult, UnitSummary,
};
use crate::models::storage_contract_users::{self, AccessLevel};
use crate::models::storage_contracts::{self, PaymentCycle};
use crate::models::{storage_units, users};
use crate::services::division_service::{self, DivisionService};
use crate::services::import::values::{
    PhoneEntry, parse_bool, parse_date, parse_decimal, parse_full_name, parse_phone_list, split_multi,
    zip_repeat_last,
};
use crate::services::import::{self, FieldSpec, FileFormat, ParsedRow};
use crate::services::user_import_service::allocate_display_id;
use crate::utils::password::STORAGE_IMPORT_PLACEHOLDER;

pub const STORAGE_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("unit", &["unit", "unitid", "unit id", "locker", "lockerid", "unit number", "unit #"]),
    FieldSpec::optional("unitsize", &["unit size", "unitsize", "size"]),
    FieldSpec::optional("moveindate", &["move-in date", "moveindate", "move in date", "move in"]),
    FieldSpec::optional("grossrent", &["gross rent", "grossrent", "rent", "monthly rent"]),
    FieldSpec::optional("paymentcycle", &["payment cycle", "paymentcycle", "cycle"]),
    FieldSpec::optional("deposit", &["security deposit", "securitydeposit", "deposit"]),
    FieldSpec::optional("depositbalance", &["sd balance", "sdbalance", "deposit balance", "security deposit balance"]),
    FieldSpec::optional("online", &["online", "online access"]),
    FieldSpec::optional("autopay", &["autopay", "auto pay", "automatic payment"]),
    FieldSpec::optional("email", &["email", "e-mail", "user email"]),
    FieldSpec::optional("firstname", &["first name", "firstname", "fname"]),
    FieldSpec::optional("lastname", &["last name", "lastname", "lname"]),
    FieldSpec::optional("fullname", &["full name", "fullname", "name", "tenant", "tenant name", "customer"]).exact_only(),
    FieldSpec::optional("phone", &["phone", "telephone", "phone number", "phones"]),
    FieldSpec::optional("phonetype", &["phone type", "phonetype"]),
    FieldSpec::optional("primary", &["primary", "primary holder", "main tenant"]),
];

/// Un locataire extrait d'une ligne (une ligne peut en contenir plusieurs, séparés par `;`)
#[derive(Debug, Clone, PartialEq)]
pub struct TenantRecord {
    pub unit_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phones: Vec<PhoneEntry>,
    /// Premier locataire de la ligne (et colonne primary pas à "no")
    pub primary_candidate: bool,
}

/// Termes du contrat, communs à tous les locataires de la ligne
#[derive(Debug, Clone)]
struct ContractTerms {
    unit_size: Option<String>,
    move_in_date: Option<NaiveDate>,
    gross_rent: Decimal,
    payment_cycle: PaymentCycle,
    security_deposit: Decimal,
    security_deposit_balance: Decimal,
    online_access: bool,
    autopay: bool,
}

/// Découpe une ligne en locataires :
///   - unit et fullname peuvent contenir plusieurs valeurs `;`, associées par index
///     (la liste la plus courte répète son dernier élément)
///   - emails associés par index, sans répétition
///   - téléphones : un par locataire si le compte correspond, sinon les deux premiers au primary
pub fn split_tenants(row: &ParsedRow) -> Vec<TenantRecord> {
    let units = row.get("unit").map(split_multi).unwrap_or_default();
    let names = row.get("fullname").map(split_multi).unwrap_or_default();
    let emails = row.get("email").map(split_multi).unwrap_or_default();
    let primary_flag = row.get("primary").and_then(parse_bool);

    let mut phones = row.get("phone").map(parse_phone_list).unwrap_or_default();
    if let (Some(kind), [single]) = (row.get("phonetype").and_then(users::PhoneType::parse), phones.as_mut_slice()) {
        single.phone_type = kind;
    }

    let pairs = zip_repeat_last(&units, &names);
    let tenant_count = pairs.len();

    pairs
        .into_iter()
        .enumerate()
        .filter_map(|(i, (unit, name))| {
            let unit_id = unit?;
            let (first_name, last_name) = match name {
                Some(full) => {
                    let (first, last) = parse_full_name(&full);
                    (non_empty(first), non_empty(last))
                }
                None => (
                    row.get("firstname").map(str::to_string),
                    row.get("lastname").map(str::to_string),
                ),
            };

            let tenant_phones = if tenant_count > 1 && phones.len() == tenant_count {
                vec![phones[i].clone()]
            } else if i == 0 {
                phones.iter().take(2).cloned().collect()
            } else {
                Vec::new()
            };

            Some(TenantRecord {
                unit_id,
                first_name,
                last_name,
                email: emails.get(i).map(|e| users::normalize_email(e)),
                phones: tenant_phones,
                primary_candidate: i == 0 && primary_flag != Some(false),
            })
        })
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}

pub struct StorageImportService;

impl StorageImportService {
    pub async fn import_storage(
        db: &DatabaseConnection,
        bytes: &[u8],
        format: FileFormat,
        placeholder_domain: &str,
    ) -> Result<StorageImportResult, ImportError> {
        let table = import::parse_table(bytes, format, STORAGE_FIELDS)?;

        let mut result = Self::import_rows(db, table.rows, placeholder_domain).await?;
        let mut warnings = table.warnings;
        warnings.append(&mut result.warnings);
        result.warnings = warnings;
        Ok(result)
    }

    pub async fn import_rows(
        db: &DatabaseConnection,
        rows: Vec<ParsedRow>,
        placeholder_domain: &str,
    ) -> Result<StorageImportResult, DbErr> {
        let divisions = DivisionService::ensure_default_divisions(db).await?;
        let storage_division_id = divisions
            .get(&division_service::STORAGE.to_lowercase())
            .map(|d| d.id);

        let mut result = StorageImportResult {
            total_processed: rows.len(),
            ..Default::default()
        };

        for row in rows {
            let n = row.row_number;

            let txn = db.begin().await?;
            let mut row_result = StorageImportResult::default();

            match process_row(&txn, &row, placeholder_domain, storage_division_id, &mut row_result).await {
                Ok(()) => {
                    txn.commit().await?;
                    merge(&mut result, row_result);
                }
                Err(e) => {
                    txn.rollback().await?;
                    error!(row = n, "❌ Error processing storage row: {}", e);
                    result.errors.push(RowIssue::new(n, "Failed to save row, nothing was imported for it"));
                }
            }
        }

        result.error_count = result.errors.len();
        result.success = true;
        result.message = format!("Successfully imported {} storage contract associations", result.success_count);
        info!(
            "📦 Storage import finished: {} associations, {} warnings, {} errors",
            result.success_count,
            result.warnings.len(),
            result.error_count
        );

        Ok(result)
    }

    pub async fn list_contracts(db: &DatabaseConnection) -> Result<Vec<ContractSummary>, DbErr> {
        let contracts = storage_contracts::Entity::find()
            .order_by_asc(storage_contracts::Column::Id)
            .all(db)
            .await?;
        let units: HashMap<i32, storage_units::Model> = storage_units::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();
        let links = storage_contract_users::Entity::find()
            .filter(storage_contract_users::Column::IsActive.eq(true))
            .order_by_asc(storage_contract_users::Column::Id)
            .all(db)
            .await?;
        let user_ids: HashSet<i32> = links.iter().map(|l| l.user_id).collect();
        let tenants: HashMap<i32, users::Model> = users::Entity::find()
            .filter(users::Column::Id.is_in(user_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let mut by_contract: HashMap<i32, Vec<ContractTenant>> = HashMap::new();
        for link in links {
            if let Some(user) = tenants.get(&link.user_id) {
                by_contract.entry(link.storage_contract_id).or_default().push(ContractTenant {
                    user_id: user.id,
                    display_id: user.display_id.clone(),
                    email: user.email.clone(),
                    first_name: user.first_name.clone(),
                    last_name: user.last_name.clone(),
                    is_primary: link.is_primary_contract_holder,
                    access_level: link.access_level,
                });
            }
        }

        Ok(contracts
            .into_iter()
            .map(|c| {
                let unit = units.get(&c.storage_unit_id);
                ContractSummary {
                    id: c.id,
                    unit_id: unit.map(|u| u.unit_id.clone()).unwrap_or_default(),
                    unit_size: unit.map(|u| u.unit_size.clone()).unwrap_or_default(),
                    tenants: by_contract.remove(&c.id).unwrap_or_default(),
                    contract_number: c.contract_number,
                    move_in_date: c.move_in_date,
                    gross_rent: c.gross_rent,
                    payment_cycle: c.payment_cycle,
                    security_deposit: c.security_deposit,
                    security_deposit_balance: c.security_deposit_balance,
                    online_access: c.online_access,
                    autopay: c.autopay,
                    is_active: c.is_active,
                }
            })
            .collect())
    }

    pub async fn list_units(db: &DatabaseConnection) -> Result<Vec<UnitSummary>, DbErr> {
        let units = storage_units::Entity::find()
            .order_by_asc(storage_units::Column::UnitId)
            .all(db)
            .await?;
        let active: HashMap<i32, String> = storage_contracts::Entity::find()
            .filter(storage_contracts::Column::IsActive.eq(true))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.storage_unit_id, c.contract_number))
            .collect();

        Ok(units
            .into_iter()
            .map(|u| UnitSummary {
                active_contract: active.get(&u.id).cloned(),
                id: u.id,
                unit_id: u.unit_id,
                unit_size: u.unit_size,
                base_rent: u.base_rent,
                is_active: u.is_active,
            })
            .collect())
    }

    /// Vide storage_contract_users, storage_contracts et storage_units.
    /// Les users (placeholders compris) sont conservés.
    pub async fn clear_all_storage(db: &DatabaseConnection) -> Result<StorageClearResult, DbErr> {
        let txn = db.begin().await?;
        let contract_users_deleted = storage_contract_users::Entity::delete_many().exec(&txn).await?.rows_affected;
        let contracts_deleted = storage_contracts::Entity::delete_many().exec(&txn).await?.rows_affected;
        let units_deleted = storage_units::Entity::delete_many().exec(&txn).await?.rows_affected;
        txn.commit().await?;

        warn!(
            "🧨 Storage data cleared: {} units, {} contracts, {} associations",
            units_deleted, contracts_deleted, contract_users_deleted
        );

        Ok(StorageClearResult {
            contract_users_deleted,
            contracts_deleted,
            units_deleted,
        })
    }
}

fn merge(total: &mut StorageImportResult, row: StorageImportResult) {
    total.success_count += row.success_count;
    total.errors.extend(row.errors);
    total.warnings.extend(row.warnings);
    total.created_contracts.extend(row.created_contracts);
}

fn contract_terms(row: &ParsedRow, warnings: &mut Vec<RowIssue>) -> ContractTerms {
    let n = row.row_number;

    let mut money = |key: &str, label: &str| -> Decimal {
        match row.get(key) {
            None => Decimal::ZERO,
            Some(raw) => parse_decimal(raw).unwrap_or_else(|| {
                warnings.push(RowIssue::new(n, format!("Invalid {} '{}', using 0", label, raw)));
                Decimal::ZERO
            }),
        }
    };
    let gross_rent = money("grossrent", "gross rent");
    let security_deposit = money("deposit", "security deposit");
    let security_deposit_balance = money("depositbalance", "deposit balance");

    let payment_cycle = match row.get("paymentcycle") {
        None => PaymentCycle::Monthly,
        Some(raw) => PaymentCycle::parse(raw).unwrap_or_else(|| {
            warnings.push(RowIssue::new(n, format!("Unknown payment cycle '{}', using Monthly", raw)));
            PaymentCycle::Monthly
        }),
    };

    let move_in_date = row.get("moveindate").and_then(|raw| {
        let parsed = parse_date(raw);
        if parsed.is_none() {
            warnings.push(RowIssue::new(n, format!("Invalid move-in date '{}' ignored", raw)));
        }
        parsed
    });

    ContractTerms {
        unit_size: row.get("unitsize").map(str::to_string),
        move_in_date,
        gross_rent,
        payment_cycle,
        security_deposit,
        security_deposit_balance,
        online_access: row.get("online").and_then(parse_bool).unwrap_or(false),
        autopay: row.get("autopay").and_then(parse_bool).unwrap_or(false),
    }
}

async fn process_row<C: ConnectionTrait>(
    db: &C,
    row: &ParsedRow,
    placeholder_domain: &str,
    storage_division_id: Option<i32>,
    result: &mut StorageImportResult,
) -> Result<(), DbErr> {
    let n = row.row_number;

    let tenants = split_tenants(row);
    if tenants.is_empty() {
        result.errors.push(RowIssue::new(n, "Unit ID is required"));
        return Ok(());
    }

    let terms = contract_terms(row, &mut result.warnings);

    for tenant in tenants {
        if tenant.email.is_none() && tenant.first_name.is_none() && tenant.last_name.is_none() {
            result.errors.push(RowIssue::new(
                n,
                format!("Could not create or find user for unit {} (no email or name)", tenant.unit_id),
            ));
            continue;
        }

        // 1. Unité
        let unit = find_or_create_unit(db, &tenant.unit_id, &terms).await?;

        // 2. Contrat actif de l'unité (réutilisé s'il existe)
        let contract = find_or_create_contract(db, &unit, &terms).await?;

        // 3. User
        let user = find_or_create_tenant(db, &tenant, &contract, placeholder_domain).await?;

        if let Some(division_id) = storage_division_id {
            DivisionService::assign(db, user.id, division_id).await?;
        }

        // 4. Association (idempotente)
        let existing = storage_contract_users::Entity::find()
            .filter(storage_contract_users::Column::StorageContractId.eq(contract.id))
            .filter(storage_contract_users::Column::UserId.eq(user.id))
            .filter(storage_contract_users::Column::IsActive.eq(true))
            .one(db)
            .await?;
        if existing.is_some() {
            result.warnings.push(RowIssue::new(
                n,
                format!("User {} already associated with unit {}", user.email, tenant.unit_id),
            ));
            continue;
        }

        let has_primary = storage_contract_users::Entity::find()
            .filter(storage_contract_users::Column::StorageContractId.eq(contract.id))
            .filter(storage_contract_users::Column::IsActive.eq(true))
            .filter(storage_contract_users::Column::IsPrimaryContractHolder.eq(true))
            .count(db)
            .await?
            > 0;
        let is_primary = tenant.primary_candidate && !has_primary;

        storage_contract_users::ActiveModel {
            storage_contract_id: Set(contract.id),
            user_id: Set(user.id),
            is_primary_contract_holder: Set(is_primary),
            access_level: Set(AccessLevel::Full),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        result.success_count += 1;
        result.created_contracts.push(CreatedContract {
            contract_number: contract.contract_number.clone(),
            unit_id: unit.unit_id.clone(),
            user_email: user.email.clone(),
            is_primary,
        });
    }

    Ok(())
}

/// Recherche exacte (sensible à la casse) sur unit_id
async fn find_or_create_unit<C: ConnectionTrait>(
    db: &C,
    unit_id: &str,
    terms: &ContractTerms,
) -> Result<storage_units::Model, DbErr> {
    if let Some(unit) = storage_units::Entity::find()
        .filter(storage_units::Column::UnitId.eq(unit_id))
        .one(db)
        .await?
    {
        return Ok(unit);
    }

    let unit = storage_units::ActiveModel {
        unit_id: Set(unit_id.to_string()),
        unit_size: Set(terms.unit_size.clone().unwrap_or_else(|| "Unknown".to_string())),
        base_rent: Set(terms.gross_rent),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("📦 Storage unit created: {}", unit.unit_id);
    Ok(unit)
}

async fn find_or_create_contract<C: ConnectionTrait>(
    db: &C,
    unit: &storage_units::Model,
    terms: &ContractTerms,
) -> Result<storage_contracts::Model, DbErr> {
    if let Some(contract) = storage_contracts::Entity::find()
        .filter(storage_contracts::Column::StorageUnitId.eq(unit.id))
        .filter(storage_contracts::Column::IsActive.eq(true))
        .one(db)
        .await?
    {
        return Ok(contract);
    }

    let contract_number = next_contract_number(db).await?;
    let today = Utc::now().date_naive();

    let contract = storage_contracts::ActiveModel {
        contract_number: Set(contract_number),
        storage_unit_id: Set(unit.id),
        move_in_date: Set(terms.move_in_date),
        gross_rent: Set(terms.gross_rent),
        payment_cycle: Set(terms.payment_cycle),
        security_deposit: Set(terms.security_deposit),
        security_deposit_balance: Set(terms.security_deposit_balance),
        online_access: Set(terms.online_access),
        autopay: Set(terms.autopay),
        is_active: Set(true),
        start_date: Set(terms.move_in_date.unwrap_or(today)),
        end_date: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("📝 Contract {} created for unit {}", contract.contract_number, unit.unit_id);
    Ok(contract)
}

/// SC-<année>-<nombre de contrats + 1>, incrémenté tant que le numéro existe déjà
async fn next_contract_number<C: ConnectionTrait>(db: &C) -> Result<String, DbErr> {
    let year = Utc::now().year();
    let mut sequence = storage_contracts::Entity::find().count(db).await? + 1;

    loop {
        let candidate = format!("SC-{}-{:03}", year, sequence);
        let taken = storage_contracts::Entity::find()
            .filter(storage_contracts::Column::ContractNumber.eq(candidate.as_str()))
            .count(db)
            .await?
            > 0;
        if !taken {
            return Ok(candidate);
        }
        sequence += 1;
    }
}

/// Par email si fourni ; sinon un locataire du contrat avec le même nom ;
/// sinon un user placeholder (credential TEMP_STORAGE_IMPORT, non utilisable).
async fn find_or_create_tenant<C: ConnectionTrait>(
    db: &C,
    tenant: &TenantRecord,
    contract: &storage_contracts::Model,
    placeholder_domain: &str,
) -> Result<users::Model, DbErr> {
    let existing = match &tenant.email {
        Some(email) => users::Entity::find().filter(users::email_matches(email)).one(db).await?,
        None => find_tenant_by_name(db, contract.id, tenant).await?,
    };
    if let Some(user) = existing {
        return Ok(user);
    }

    let display_id = allocate_display_id(db, &HashSet::new())
        .await?
        .ok_or_else(|| DbErr::Custom("Could not allocate a unique user id".to_string()))?;
    let email = tenant
        .email
        .clone()
        .unwrap_or_else(|| format!("storage.{}@{}", Uuid::new_v4().simple(), placeholder_domain));

    let phone = tenant.phones.first();
    let phone2 = tenant.phones.get(1);

    let user = users::ActiveModel {
        display_id: Set(Some(display_id)),
        email: Set(email),
        password_hash: Set(STORAGE_IMPORT_PLACEHOLDER.to_string()),
        salt: Set(Some(STORAGE_IMPORT_PLACEHOLDER.to_string())),
        role: Set(users::Role::Client.as_str().to_string()),
        first_name: Set(tenant.first_name.clone().unwrap_or_else(|| "Storage".to_string())),
        last_name: Set(tenant.last_name.clone().unwrap_or_else(|| "Client".to_string())),
        is_confirmed: Set(true),
        phone: Set(phone.map(|p| p.number.clone())),
        phone_type: Set(phone.map(|p| p.phone_type)),
        phone2: Set(phone2.map(|p| p.number.clone())),
        phone2_type: Set(phone2.map(|p| p.phone_type)),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(email = %user.email, "👤 Storage tenant provisioned (password reset required)");
    Ok(user)
}

async fn find_tenant_by_name<C: ConnectionTrait>(
    db: &C,
    contract_id: i32,
    tenant: &TenantRecord,
) -> Result<Option<users::Model>, DbErr> {
    let user_ids: Vec<i32> = storage_contract_users::Entity::find()
        .filter(storage_contract_users::Column::StorageContractId.eq(contract_id))
        .filter(storage_contract_users::Column::IsActive.eq(true))
        .all(db)
        .await?
        .into_iter()
        .map(|l| l.user_id)
        .collect();
    if user_ids.is_empty() {
        return Ok(None);
    }

    let first = tenant.first_name.as_deref().unwrap_or("Storage").to_lowercase();
    let last = tenant.last_name.as_deref().unwrap_or("Client").to_lowercase();

    Ok(users::Entity::find()
        .filter(users::Column::Id.is_in(user_ids))
        .all(db)
        .await?
        .into_iter()
        .find(|u| u.first_name.to_lowercase() == first && u.last_name.to_lowercase() == last))
}
