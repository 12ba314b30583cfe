//! Credentials: password hashing, signup validation, one-time codes

use std::sync::OnceLock;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::Rng;
use regex::Regex;
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};

/// Minimum password length for signup and reset
pub const MIN_PASSWORD_LEN: usize = 8;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
            .expect("valid regex")
    })
}

/// Hash a password into an Argon2id PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::rng().fill(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| Error::Internal(format!("Failed to create salt: {}", e)))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string; garbage hashes never verify
pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation("Enter a valid name".into()));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<()> {
    if !email_regex().is_match(email.trim()) {
        return Err(Error::Validation("Enter a valid email address".into()));
    }
    Ok(())
}

/// At least 8 characters with upper, lower, digit and symbol
pub fn validate_password_strength(password: &str) -> Result<()> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    if long_enough && has_upper && has_lower && has_digit && has_symbol {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "Enter a strong password: at least {} characters with upper and lower case letters, a digit and a symbol",
            MIN_PASSWORD_LEN
        )))
    }
}

/// Random numeric code with exactly `digits` digits (no leading zero)
pub fn generate_numeric_code(digits: u32) -> String {
    let low = 10u32.pow(digits.saturating_sub(1));
    let high = 10u32.pow(digits);
    rand::rng().random_range(low..high).to_string()
}

/// Constant-time equality for one-time codes
pub fn codes_match(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.trim().as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("S3cure!pass").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("S3cure!pass", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("S3cure!pass", "not-a-phc-string"));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(
            hash_password("S3cure!pass").unwrap(),
            hash_password("S3cure!pass").unwrap()
        );
    }

    #[test]
    fn test_email_validation() {
        assert!(validate_email("asha@example.com").is_ok());
        assert!(validate_email(" asha.k+bills@mail.example.in ").is_ok());
        assert!(validate_email("asha@").is_err());
        assert!(validate_email("no-at-sign.com").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("Str0ng!pw").is_ok());
        assert!(validate_password_strength("short1!A").is_ok());
        assert!(validate_password_strength("Sh0rt!").is_err());
        assert!(validate_password_strength("alllowercase1!").is_err());
        assert!(validate_password_strength("NoDigits!!").is_err());
        assert!(validate_password_strength("NoSymbol123").is_err());
    }

    #[test]
    fn test_numeric_code_length() {
        for _ in 0..100 {
            let code = generate_numeric_code(6);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            let otp = generate_numeric_code(4);
            assert_eq!(otp.len(), 4);
        }
    }

    #[test]
    fn test_codes_match() {
        assert!(codes_match("1234", "1234"));
        assert!(codes_match("1234", " 1234 "));
        assert!(!codes_match("1234", "1235"));
        assert!(!codes_match("1234", "12345"));
    }
}
