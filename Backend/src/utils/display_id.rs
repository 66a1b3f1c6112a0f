use rand::Rng;

/// Génère un identifiant lisible au format `####-AAA` (1000-9999 + 3 lettres majuscules).
/// L'unicité est vérifiée par l'appelant (boucle de regénération).
pub fn generate_display_id() -> String {
    let mut rng = rand::thread_rng();
    let number: u16 = rng.gen_range(1000..=9999);
    let letters: String = (0..3)
        .map(|_| char::from(rng.gen_range(b'A'..=b'Z')))
        .collect();
    format!("{}-{}", number, letters)
}

/// Vérifie le format `####-AAA`
pub fn is_valid_display_id(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 8
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..].iter().all(u8::is_ascii_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_match_format() {
        for _ in 0..200 {
            let id = generate_display_id();
            assert!(is_valid_display_id(&id), "bad id {}", id);
            assert!(!id.starts_with('0'));
        }
    }

    #[test]
    fn test_format_validation() {
        assert!(is_valid_display_id("1234-ABC"));
        assert!(!is_valid_display_id("123-ABC"));
        assert!(!is_valid_display_id("1234-abc"));
        assert!(!is_valid_display_id("1234ABC"));
        assert!(!is_valid_display_id("1234-ABCD"));
    }
}
