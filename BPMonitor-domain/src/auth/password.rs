use rand::{distributions::Uniform, rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Bytes of randomness in a salt
const SALT_BYTES: usize = 16;

/// Characters used for generated passwords
const PASSWORD_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()-_=+[]{};:,.<>?";

/// Generate a random salt as 32 hex characters
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hex SHA-256 of the password followed by the salt
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a password against a stored hash without leaking timing
pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    let computed = hash_password(password, salt);
    computed.as_bytes().ct_eq(expected_hash.as_bytes()).into()
}

/// Random password for accounts created through an external provider
pub fn generate_random_password(length: usize) -> String {
    let dist = Uniform::from(0..PASSWORD_ALPHABET.len());
    let mut rng = OsRng;
    (0..length)
        .map(|_| PASSWORD_ALPHABET[rng.sample(dist)] as char)
        .collect()
}

/// Random bytes as a lowercase hex string
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_round_trip() {
        let salt = generate_salt();
        let hash = hash_password("correct horse", &salt);

        assert!(verify_password("correct horse", &salt, &hash));
        assert!(!verify_password("correct horse!", &salt, &hash));
        assert!(!verify_password("correct horse", &generate_salt(), &hash));
    }

    #[test]
    fn test_known_digest() {
        // sha256("passwordsalt")
        assert_eq!(
            hash_password("password", "salt"),
            "7a37b85c8918eac19a9089c0fa5a2ab4dce3f90528dcdeec108b23ddf3607b99"
        );
    }

    #[test]
    fn test_salt_shape() {
        let salt = generate_salt();
        assert_eq!(salt.len(), 32);
        assert!(salt.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(salt, generate_salt());
    }

    #[test]
    fn test_generated_password() {
        let password = generate_random_password(16);
        assert_eq!(password.chars().count(), 16);
        assert!(password.bytes().all(|b| PASSWORD_ALPHABET.contains(&b)));
        assert_eq!(random_hex(32).len(), 64);
    }
}
