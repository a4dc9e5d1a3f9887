use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::error::InvenError;

/// Argon2id PHC string for `secret`. Runs on the blocking pool.
pub async fn hash_secret(secret: String) -> Result<String, InvenError> {
    tokio::task::spawn_blocking(move || hash_secret_blocking(&secret))
        .await
        .map_err(|e| InvenError::PasswordHash(format!("hashing task failed: {e}")))?
}

/// False for a wrong secret or an unparseable stored hash.
pub async fn verify_secret(secret: String, phc: String) -> Result<bool, InvenError> {
    tokio::task::spawn_blocking(move || verify_secret_blocking(&secret, &phc))
        .await
        .map_err(|e| InvenError::PasswordHash(format!("verify task failed: {e}")))
}

fn hash_secret_blocking(secret: &str) -> Result<String, InvenError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| InvenError::PasswordHash(e.to_string()))
}

fn verify_secret_blocking(secret: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_verifies_and_is_salted() {
        let a = hash_secret("s3cret!pw".into()).await.unwrap();
        let b = hash_secret("s3cret!pw".into()).await.unwrap();
        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b);
        assert!(verify_secret("s3cret!pw".into(), a.clone()).await.unwrap());
        assert!(!verify_secret("wrong!pw1".into(), a).await.unwrap());
        assert!(!verify_secret("s3cret!pw".into(), "plaintext".into()).await.unwrap());
    }
}
