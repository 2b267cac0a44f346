use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use md5::Md5;
use sha2::{Digest, Sha256};

use crate::config::PasswordAlgorithm;
use crate::middleware::auth::constant_time_eq;

/// 64 MiB, expressed in KiB.
const ARGON2_MEMORY_KIB: u32 = 65536;
const ARGON2_TIME_COST: u32 = 4;
const ARGON2_THREADS: u32 = 3;
const BCRYPT_COST: u32 = 12;

fn argon2() -> anyhow::Result<Argon2<'static>> {
    let params = Params::new(ARGON2_MEMORY_KIB, ARGON2_TIME_COST, ARGON2_THREADS, None)
        .map_err(|e| anyhow::anyhow!("Invalid argon2 parameters: {e}"))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

pub fn hash_password(password: &str, algorithm: PasswordAlgorithm) -> anyhow::Result<String> {
    match algorithm {
        PasswordAlgorithm::Argon2id => {
            let salt = SaltString::generate(&mut OsRng);
            let hash = argon2()?
                .hash_password(password.as_bytes(), &salt)
                .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;
            Ok(hash.to_string())
        }
        PasswordAlgorithm::Bcrypt => bcrypt::hash(password, BCRYPT_COST)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}")),
    }
}

fn is_bcrypt(hash: &str) -> bool {
    ["$2y$", "$2b$", "$2a$", "$2x$"].iter().any(|p| hash.starts_with(p))
}

/// Verifies against an argon2 (PHC string) or bcrypt hash.
///
/// Parameters are read from the stored hash, so hashes made with other costs verify too.
pub fn verify_password(password: &str, hash: &str) -> bool {
    if hash.starts_with("$argon2") {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        return Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok();
    }
    if is_bcrypt(hash) {
        return bcrypt::verify(password, hash).unwrap_or(false);
    }
    false
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// How a stored password matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordMatch {
    Hashed,
    Plaintext,
    Md5,
    Sha256,
}

/// Checks a login candidate against a stored credential of unknown format.
///
/// Tried in order: argon2/bcrypt hash, plaintext, MD5 hex, SHA-256 hex.
pub fn verify_stored_password(candidate: &str, stored: &str) -> Option<PasswordMatch> {
    if stored.is_empty() {
        return None;
    }
    if verify_password(candidate, stored) {
        return Some(PasswordMatch::Hashed);
    }
    if constant_time_eq(stored.as_bytes(), candidate.as_bytes()) {
        return Some(PasswordMatch::Plaintext);
    }
    if constant_time_eq(stored.as_bytes(), hex(&Md5::digest(candidate.as_bytes())).as_bytes()) {
        return Some(PasswordMatch::Md5);
    }
    if constant_time_eq(stored.as_bytes(), hex(&Sha256::digest(candidate.as_bytes())).as_bytes()) {
        return Some(PasswordMatch::Sha256);
    }
    None
}
