//! Session-backed identity and password hashing.
//!
//! The signed session cookie carries only the user id; the account and role
//! are reloaded from the database on every request.

use actix_session::Session;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use once_cell::sync::Lazy;

const USER_ID_SESSION_KEY: &str = "user_id";

static ARGON2: Lazy<Argon2<'static>> = Lazy::new(Argon2::default);

pub fn get_argon2() -> &'static Argon2<'static> {
    &ARGON2
}

/// Produces a PHC string for storage in `users.password_hash`.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(get_argon2()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Checks a password against a stored PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => get_argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::error!("verify_password: stored hash is malformed: {}", e);
            false
        }
    }
}

/// Returns the signed-in user id, if any.
pub fn get_user_id(session: &Session) -> Option<i32> {
    session.get::<i32>(USER_ID_SESSION_KEY).unwrap_or_else(|e| {
        log::warn!("get_user_id: unreadable session: {}", e);
        None
    })
}

/// Binds the session to `user_id`, rotating the session key.
pub fn login(session: &Session, user_id: i32) -> Result<(), actix_web::Error> {
    session.renew();
    session
        .insert(USER_ID_SESSION_KEY, user_id)
        .map_err(|_| actix_web::error::ErrorInternalServerError("middleware error"))
}

/// Drops the identity but keeps the session so a notice can follow.
pub fn logout(session: &Session) {
    session.remove(USER_ID_SESSION_KEY);
    session.renew();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("adminpass").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("adminpass", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "plaintext"));
    }
}
