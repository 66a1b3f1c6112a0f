use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: &'static str,
    pub version: &'static str,
    /// La base répond au ping
    pub database: bool,
    pub time: DateTime<Utc>,
}
