use rand::RngCore;
use uuid::Uuid;

/// Token de session opaque : 128 bits aléatoires en hexadécimal (32 caractères)
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Token de vérification email (UUID v4, sans tirets)
pub fn generate_verification_token() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_token_shape() {
        let token = generate_session_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_session_token());
    }

    #[test]
    fn test_verification_token_shape() {
        let token = generate_verification_token();
        assert_eq!(token.len(), 32);
        assert!(!token.contains('-'));
    }
}
