pub mod division_service;
pub mod email_service;
pub mod import;
pub mod security_service;
pub mod signup_service;
pub mod storage_import_service;
pub mod user_import_service;
