//! Password hashing and participant login codes.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::Rng;

pub const CODE_PREFIX: &str = "P-";

/// PHC-formatted argon2id hash with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| format!("failed to hash password: {err}"))
}

/// A malformed stored hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn generate_participant_code() -> String {
    let number: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    format!("{CODE_PREFIX}{number}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_round_trip() {
        let hash = hash_password("tulip-42").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("tulip-42", &hash));
        assert!(!verify_password("tulip-43", &hash));
    }

    #[test]
    fn salts_differ() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn garbage_hash_does_not_verify() {
        assert!(!verify_password("anything", "not-a-hash"));
    }

    #[test]
    fn codes_have_six_digits() {
        for _ in 0..100 {
            let code = generate_participant_code();
            let digits = code.strip_prefix(CODE_PREFIX).unwrap();
            assert_eq!(digits.len(), 6);
            assert!(digits.bytes().all(|b| b.is_ascii_digit()));
            assert_ne!(digits.as_bytes()[0], b'0');
        }
    }
}
