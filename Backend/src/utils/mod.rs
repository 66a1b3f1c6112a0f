pub mod display_id;
pub mod password;
pub mod tokens;
