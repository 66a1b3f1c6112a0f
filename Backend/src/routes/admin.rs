use actix_web::http::header::CONTENT_TYPE;
use actix_web::{delete, get, post, web, HttpRequest, HttpResponse};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

use crate::config::AppConfig;
use crate::db;
use crate::error::{AppError, ImportError};
use crate::middleware::AdminUser;
use crate::services::division_service::DivisionFilter;
use crate::services::email_service::SharedMailer;
use crate::services::import::FileFormat;
use crate::services::security_service::SecurityService;
use crate::services::signup_service::SignupService;
use crate::services::storage_import_service::StorageImportService;
use crate::services::user_import_service::UserImportService;

// Paramètres d'upload : le corps de la requête = le fichier brut
#[derive(Deserialize)]
pub struct UploadQuery {
    pub format: Option<String>,
    pub filename: Option<String>,
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Deserialize)]
pub struct ConfirmQuery {
    #[serde(default)]
    pub confirm: bool,
}

// ?divisions=1,3&operator=AND|OR
#[derive(Deserialize)]
pub struct UserListQuery {
    pub divisions: Option<String>,
    pub operator: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub new_password: String,
}

fn upload_format(req: &HttpRequest, query: &UploadQuery, body: &[u8]) -> Result<FileFormat, ImportError> {
    if body.is_empty() {
        return Err(ImportError::EmptyFile);
    }
    let content_type = req.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    FileFormat::detect(query.format.as_deref(), content_type, query.filename.as_deref(), body)
}

// ==================== USERS ====================

/// POST /api/admin/users/import - Import additif CSV / Excel
#[post("/users/import")]
pub async fn import_users(
    admin: AdminUser,
    req: HttpRequest,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let format = upload_format(&req, &query, &body)?;
    info!(admin = %admin.0.email, bytes = body.len(), "📥 User import requested");

    let result = UserImportService::import_users(&db, &body, format, config.import_batch_size).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// POST /api/admin/users/replace?confirm=true - Remplacement complet (DESTRUCTIF)
#[post("/users/replace")]
pub async fn replace_users(
    admin: AdminUser,
    req: HttpRequest,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    if !query.confirm {
        return Err(ImportError::ConfirmationRequired.into());
    }
    let format = upload_format(&req, &query, &body)?;
    warn!(admin = %admin.0.email, "🧨 Full user replace requested");

    let result = UserImportService::replace_all_users(
        &db,
        &body,
        format,
        config.import_batch_size,
        query.confirm,
        Some(admin.0.id),
    )
    .await?;
    Ok(HttpResponse::Ok().json(result))
}

#[get("/users")]
pub async fn list_users(
    _admin: AdminUser,
    query: web::Query<UserListQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let filter = DivisionFilter::parse(query.divisions.as_deref(), query.operator.as_deref()).ok_or_else(|| {
        AppError::Validation("divisions must be a comma separated list of ids and operator AND or OR".to_string())
    })?;

    let users = UserImportService::list_users(&db, &filter).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": users.len(),
        "users": users
    })))
}

#[post("/users/reset-password")]
pub async fn reset_password(
    admin: AdminUser,
    body: web::Json<ResetPasswordRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    if let Err(errors) = body.validate() {
        return Ok(HttpResponse::BadRequest().json(errors));
    }

    if !SecurityService::reset_user_password(&db, &body.email, &body.new_password).await? {
        return Err(AppError::NotFound(format!("User {} not found", body.email)));
    }

    info!(admin = %admin.0.email, email = %body.email, "🔑 Password reset");
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": format!("Password reset for {}", body.email)
    })))
}

#[delete("/users/{email}")]
pub async fn delete_user(
    admin: AdminUser,
    email: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let email = email.into_inner();
    if admin.0.email.eq_ignore_ascii_case(email.trim()) {
        return Err(AppError::Validation("You cannot delete your own account".to_string()));
    }

    if !SecurityService::delete_user(&db, &email).await? {
        return Err(AppError::NotFound(format!("User {} not found", email)));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": format!("User {} deleted", email)
    })))
}

// ==================== SIGNUPS ====================

#[get("/signups")]
pub async fn list_signups(_admin: AdminUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let signups = SignupService::list_pending(&db, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": signups.len(),
        "signups": signups
    })))
}

#[post("/signups/cleanup")]
pub async fn cleanup_signups(_admin: AdminUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let deleted = SignupService::sweep_expired_signups(&db, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "deleted": deleted
    })))
}

#[delete("/signups/{id}")]
pub async fn delete_signup(
    _admin: AdminUser,
    id: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let id = id.into_inner();
    if !SignupService::delete_signup(&db, id).await? {
        return Err(AppError::NotFound(format!("Signup {} not found", id)));
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}

#[post("/signups/{id}/resend")]
pub async fn resend_signup(
    _admin: AdminUser,
    id: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    mailer: web::Data<SharedMailer>,
) -> Result<HttpResponse, AppError> {
    let signup =
        SignupService::resend_verification(&db, mailer.get_ref().as_ref(), &config, id.into_inner(), Utc::now())
            .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": format!("Verification email sent again to {}", signup.email)
    })))
}

// ==================== STORAGE ====================

#[post("/storage/import")]
pub async fn import_storage(
    admin: AdminUser,
    req: HttpRequest,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let format = upload_format(&req, &query, &body)?;
    info!(admin = %admin.0.email, bytes = body.len(), "📥 Storage import requested");

    let result =
        StorageImportService::import_storage(&db, &body, format, &config.placeholder_email_domain).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[get("/storage/contracts")]
pub async fn list_contracts(_admin: AdminUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let contracts = StorageImportService::list_contracts(&db).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": contracts.len(),
        "contracts": contracts
    })))
}

#[get("/storage/units")]
pub async fn list_units(_admin: AdminUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let units = StorageImportService::list_units(&db).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": units.len(),
        "units": units
    })))
}

/// DELETE /api/admin/storage?confirm=true - Vide toutes les données storage (DESTRUCTIF)
#[delete("/storage")]
pub async fn clear_storage(
    admin: AdminUser,
    query: web::Query<ConfirmQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    if !query.confirm {
        return Err(ImportError::ConfirmationRequired.into());
    }

    warn!(admin = %admin.0.email, "🧨 Storage clear requested");
    let cleared = StorageImportService::clear_all_storage(&db).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "result": cleared
    })))
}

// ==================== DATABASE ====================

#[get("/database/status")]
pub async fn database_status(_admin: AdminUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let status = db::database_status(&db).await?;
    Ok(HttpResponse::Ok().json(status))
}

pub fn admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .service(import_users)
            .service(replace_users)
            .service(list_users)
            .service(reset_password)
            .service(delete_user)
            .service(list_signups)
            .service(cleanup_signups)
            .service(delete_signup)
            .service(resend_signup)
            .service(import_storage)
            .service(list_contracts)
            .service(list_units)
            .service(clear_storage)
            .service(database_status),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::services::division_service::DivisionService;
    use crate::services::email_service::testing::RecordingMailer;
    use actix_web::{http::StatusCode, test, App};
    use chrono::Duration;
    use std::sync::Arc;

    const ADMIN_EMAIL: &str = "admin@example.com";
    const ADMIN_PASSWORD: &str = "admin-pass";

    macro_rules! test_app {
        ($db:expr) => {{
            let mailer: SharedMailer = Arc::new(RecordingMailer::default());
            test::init_service(
                App::new()
                    .app_data(web::Data::new($db.clone()))
                    .app_data(web::Data::new(AppConfig::default()))
                    .app_data(web::Data::new(mailer))
                    .configure(crate::routes::configure_routes),
            )
            .await
        }};
    }

    async fn session_token(db: &DatabaseConnection, email: &str, password: &str) -> String {
        let user = SecurityService::authenticate(db, email, password, false).await.unwrap();
        SecurityService::create_session(db, user, Duration::hours(1), None).await.unwrap()
    }

    fn bearer(token: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", token))
    }

    #[actix_web::test]
    async fn test_admin_routes_require_admin_role() {
        let db = test_connection().await;
        UserImportService::create_initial_users(&db, ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
        let app = test_app!(db);
        let admin_token = session_token(&db, ADMIN_EMAIL, ADMIN_PASSWORD).await;

        // pas de session
        let req = test::TestRequest::get().uri("/api/admin/users").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let csv = "Email,Password,Role,First Name,Last Name\nclient@example.com,client-pass,Client,Cal,Lee\n";
        let req = test::TestRequest::post()
            .uri("/api/admin/users/import?format=csv")
            .insert_header(bearer(&admin_token))
            .set_payload(csv)
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success_count"], 1);

        // un client authentifié n'a pas accès
        let client_token = session_token(&db, "client@example.com", "client-pass").await;
        let req = test::TestRequest::get()
            .uri("/api/admin/users")
            .insert_header(bearer(&client_token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::get()
            .uri("/api/admin/users")
            .insert_header(bearer(&admin_token))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 2);
    }

    #[actix_web::test]
    async fn test_list_users_filtered_by_division() {
        let db = test_connection().await;
        UserImportService::create_initial_users(&db, ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
        let app = test_app!(db);
        let token = session_token(&db, ADMIN_EMAIL, ADMIN_PASSWORD).await;

        let csv = "Email,Password,Role,First Name,Last Name,Division\n\
                   both@example.com,pw,Client,Bo,Th,\"Storage; Contracting\"\n\
                   storage@example.com,pw,Client,St,Or,Storage\n";
        let req = test::TestRequest::post()
            .uri("/api/admin/users/import?format=csv")
            .insert_header(bearer(&token))
            .set_payload(csv)
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success_count"], 2);

        let divisions = DivisionService::ensure_default_divisions(&db).await.unwrap();
        let ids = format!("{},{}", divisions["storage"].id, divisions["contracting"].id);

        let req = test::TestRequest::get()
            .uri(&format!("/api/admin/users?divisions={}&operator=AND", ids))
            .insert_header(bearer(&token))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["users"][0]["email"], "both@example.com");

        let req = test::TestRequest::get()
            .uri(&format!("/api/admin/users?divisions={}&operator=or", ids))
            .insert_header(bearer(&token))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 2);

        let req = test::TestRequest::get()
            .uri("/api/admin/users?divisions=abc")
            .insert_header(bearer(&token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_storage_import_and_confirmation_guard() {
        let db = test_connection().await;
        UserImportService::create_initial_users(&db, ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
        let app = test_app!(db);
        let token = session_token(&db, ADMIN_EMAIL, ADMIN_PASSWORD).await;

        let csv = "Unit ID,Tenant Name,Gross Rent\nA1; A1,\"Smith, Jane; Smith, John\",$75.00\n";
        let req = test::TestRequest::post()
            .uri("/api/admin/storage/import")
            .insert_header(bearer(&token))
            .insert_header((CONTENT_TYPE, "text/csv"))
            .set_payload(csv)
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success_count"], 2);

        let req = test::TestRequest::get()
            .uri("/api/admin/storage/contracts")
            .insert_header(bearer(&token))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 1);

        let req = test::TestRequest::delete()
            .uri("/api/admin/storage")
            .insert_header(bearer(&token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::delete()
            .uri("/api/admin/storage?confirm=true")
            .insert_header(bearer(&token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/api/admin/database/status")
            .insert_header(bearer(&token))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["storage_contracts"], 0);
    }

    #[actix_web::test]
    async fn test_structural_errors_and_self_delete() {
        let db = test_connection().await;
        UserImportService::create_initial_users(&db, ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
        let app = test_app!(db);
        let token = session_token(&db, ADMIN_EMAIL, ADMIN_PASSWORD).await;

        let req = test::TestRequest::post()
            .uri("/api/admin/users/import?filename=users.csv")
            .insert_header(bearer(&token))
            .set_payload("Name,Phone\nJane,555\n")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        let message = body["error"].as_str().unwrap();
        assert!(message.starts_with("Required column"));
        assert!(message.contains("'email'"));

        let req = test::TestRequest::post()
            .uri("/api/admin/users/import?format=pdf")
            .insert_header(bearer(&token))
            .set_payload("x")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/admin/users/{}", ADMIN_EMAIL))
            .insert_header(bearer(&token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::delete()
            .uri("/api/admin/users/ghost@example.com")
            .insert_header(bearer(&token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
