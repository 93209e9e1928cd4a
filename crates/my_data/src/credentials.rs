//! Password hashing, TOTP second factor and token string generation.
//!
//! # Responsibility
//! - Hash and verify passwords with Argon2id (PHC strings).
//! - Generate and check time-based one-time passwords.
//! - Produce random API token strings.
//!
//! # Invariants
//! - TOTP follows RFC 6238 defaults: HMAC-SHA1, a 30 second step and
//!   6 digits. The previous and next step are accepted too.
//! - Second factor secrets are unpadded RFC 4648 base32, the format
//!   authenticator apps import. Decoding ignores case, spaces and `=`.
//! - Comparisons of secret-derived values are constant time.

use crate::error::{DataError, DataResult};
use base32::Alphabet;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use sha1::Sha1;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

const SECRET_ALPHABET: Alphabet = Alphabet::RFC4648 { padding: false };

pub const TOTP_STEP_SECONDS: u64 = 30;
pub const TOTP_DIGITS: u32 = 6;
const TOTP_SKEW_STEPS: u64 = 1;
const SECOND_FACTOR_SECRET_BYTES: usize = 20;
const API_TOKEN_LEN: usize = 32;

/// Hashes `password` with a fresh random salt.
pub fn hash_password(password: &str) -> DataResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| DataError::Credential(format!("failed to hash password: {err}")))
}

/// Returns whether `password` matches `password_hash`.
///
/// A malformed stored hash never matches.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Random base32 encoded TOTP secret of 160 bits.
pub fn generate_second_factor_secret() -> String {
    let mut secret = [0_u8; SECOND_FACTOR_SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut secret);
    base32::encode(SECRET_ALPHABET, &secret)
}

/// Returns whether `secret` decodes to a usable TOTP key.
pub fn is_valid_second_factor_secret(secret: &str) -> bool {
    decode_secret(secret).is_ok()
}

/// Random alphanumeric API token string.
pub fn generate_api_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(API_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// TOTP code for the base32 `secret` at `unix_secs`.
pub fn totp_code(secret: &str, unix_secs: u64) -> DataResult<String> {
    let key = decode_secret(secret)?;
    code_for_counter(&key, unix_secs / TOTP_STEP_SECONDS)
}

/// Checks `code` against the steps around `unix_secs`.
pub fn verify_second_factor(secret: &str, code: &str, unix_secs: u64) -> DataResult<bool> {
    let key = decode_secret(secret)?;
    let counter = unix_secs / TOTP_STEP_SECONDS;
    let first = counter.saturating_sub(TOTP_SKEW_STEPS);
    let last = counter.saturating_add(TOTP_SKEW_STEPS);

    let mut matched = false;
    for step in first..=last {
        let expected = code_for_counter(&key, step)?;
        if expected.len() == code.len() && bool::from(expected.as_bytes().ct_eq(code.as_bytes()))
        {
            matched = true;
        }
    }
    Ok(matched)
}

fn decode_secret(secret: &str) -> DataResult<Vec<u8>> {
    let normalized: String = secret
        .chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '=')
        .map(|ch| ch.to_ascii_uppercase())
        .collect();
    if normalized.is_empty() {
        return Err(DataError::Credential(
            "second factor secret is empty".to_string(),
        ));
    }
    match base32::decode(SECRET_ALPHABET, &normalized) {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(DataError::Credential(
            "second factor secret is not base32".to_string(),
        )),
    }
}

fn code_for_counter(key: &[u8], counter: u64) -> DataResult<String> {
    let mut mac = HmacSha1::new_from_slice(key)
        .map_err(|err| DataError::Credential(format!("invalid second factor key: {err}")))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = usize::from(digest[digest.len() - 1] & 0x0f);
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    let code = binary % 10_u32.pow(TOTP_DIGITS);
    Ok(format!("{code:0width$}", width = TOTP_DIGITS as usize))
}
