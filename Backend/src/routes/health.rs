use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use tracing::warn;

use crate::models::health::HealthResponse;

#[get("/health")]
pub async fn health_check(db: web::Data<DatabaseConnection>) -> HttpResponse {
    let database = match db.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("⚠️  Health check: database unreachable ({})", e);
            false
        }
    };

    let response = HealthResponse {
        status: if database { "ok" } else { "degraded" }.to_string(),
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        database,
        time: Utc::now(),
    };

    if database {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_health_reports_database() {
        let db = test_connection().await;
        let app = test::init_service(App::new().app_data(web::Data::new(db)).service(health_check)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], true);
        assert_eq!(body["service"], "storage-portal");
    }
}
