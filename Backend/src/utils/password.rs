use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Salt posé sur les comptes migrés d'avant le hachage salé
/// (le mot de passe est encore stocké en clair dans password_hash).
pub const SALT_NEEDS_RESET: &str = "TEMP_SALT_NEEDS_RESET";

/// Valeur posée sur password_hash ET salt des locataires créés par l'import storage.
/// Aucun mot de passe ne peut matcher tant qu'un admin n'a pas fait de reset.
pub const STORAGE_IMPORT_PLACEHOLDER: &str = "TEMP_STORAGE_IMPORT";

const SALT_BYTES: usize = 32;

/// État d'un credential stocké, déduit uniquement du champ salt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Salt valide: chemin sécurisé (hash + salt)
    Salted,
    /// Salt absent, vide ou TEMP_SALT_NEEDS_RESET: comparaison en clair
    Legacy,
    /// Compte provisionné par import, ne peut pas s'authentifier
    PendingReset,
}

impl CredentialState {
    pub fn from_salt(salt: Option<&str>) -> Self {
        match salt.map(str::trim) {
            None | Some("") | Some(SALT_NEEDS_RESET) => CredentialState::Legacy,
            Some(STORAGE_IMPORT_PLACEHOLDER) => CredentialState::PendingReset,
            Some(_) => CredentialState::Salted,
        }
    }
}

/// Génère un salt aléatoire de 32 bytes (256 bits), encodé en base64
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut salt);
    STANDARD.encode(salt)
}

/// Hash = base64(SHA-256(password + salt))
///
/// Une seule passe SHA-256, sans itérations : format hérité des comptes existants.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Recalcule le hash et compare en temps constant
pub fn verify_password(password: &str, stored_hash: &str, salt: &str) -> bool {
    let computed = hash_password(password, salt);
    computed.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

/// Comparaison du chemin legacy (mot de passe stocké en clair)
pub fn verify_legacy_password(password: &str, stored: &str) -> bool {
    password.as_bytes().ct_eq(stored.as_bytes()).into()
}

/// Génère le couple (hash, salt) pour un nouveau mot de passe
pub fn new_credential(password: &str) -> (String, String) {
    let salt = generate_salt();
    let hash = hash_password(password, &salt);
    (hash, salt)
}
