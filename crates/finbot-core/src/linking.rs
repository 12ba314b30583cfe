//! Account linking and password-reset codes
//!
//! Both flows store a short numeric code on the user row and consume it
//! with a conditional update, so a code can only ever be used once even when
//! two requests race.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::auth::{codes_match, generate_numeric_code, hash_password, validate_password_strength};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{LinkCode, User};

pub const LINK_CODE_DIGITS: u32 = 6;
pub const RESET_OTP_DIGITS: u32 = 4;

/// Environment variable for the link code lifetime
pub const LINK_CODE_TTL_ENV: &str = "FINBOT_LINK_CODE_TTL_MINS";
pub const DEFAULT_LINK_CODE_TTL_MINS: i64 = 10;
pub const RESET_OTP_TTL_MINS: i64 = 5;
/// Wrong guesses allowed before a reset OTP is discarded
pub const MAX_RESET_ATTEMPTS: u32 = 5;

/// Link code lifetime from the environment, falling back to the default
pub fn link_code_ttl_from_env() -> Duration {
    let minutes = std::env::var(LINK_CODE_TTL_ENV)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|m| *m > 0)
        .unwrap_or(DEFAULT_LINK_CODE_TTL_MINS);
    Duration::minutes(minutes)
}

/// Issue a fresh linking code, replacing any pending one
pub fn generate_link_code(db: &Database, user_id: i64, ttl: Duration) -> Result<LinkCode> {
    let user = db
        .get_user(user_id)?
        .ok_or_else(|| Error::NotFound(format!("User {}", user_id)))?;

    if user.is_linked() {
        return Err(Error::Validation(
            "Your Telegram account is already linked".into(),
        ));
    }

    let code = generate_numeric_code(LINK_CODE_DIGITS);
    let expires_at = Utc::now() + ttl;
    db.set_verification_code(user_id, &code, expires_at)?;

    info!(user_id, "Issued link code");
    Ok(LinkCode {
        instruction: format!("Send this to the FinBot Telegram bot: /start {}", code),
        code,
        expires_at,
    })
}

/// Link `chat_id` to whoever holds `code`
pub fn consume_link_code(db: &Database, code: &str, chat_id: &str) -> Result<User> {
    let code = code.trim();
    if code.is_empty() {
        return Err(Error::InvalidOrExpiredCode);
    }

    if let Some(existing) = db.get_user_by_chat_id(chat_id)? {
        return Err(Error::Validation(format!(
            "This chat is already linked to {}",
            existing.name
        )));
    }

    let user = db
        .find_user_by_pending_code(code, Utc::now())?
        .ok_or(Error::InvalidOrExpiredCode)?;

    if !db.link_chat(user.id, code, chat_id)? {
        return Err(Error::InvalidOrExpiredCode);
    }

    info!(user_id = user.id, "Linked chat identity");
    db.get_user(user.id)?
        .ok_or_else(|| Error::NotFound(format!("User {}", user.id)))
}

/// Issue a 4-digit password-reset OTP; the caller delivers it over chat
pub fn request_password_reset(db: &Database, email: &str) -> Result<(User, String)> {
    let user = db
        .get_user_by_email(email)?
        .ok_or_else(|| Error::NotFound("User not found with this email".into()))?;

    if !user.is_linked() {
        return Err(Error::NotLinked);
    }

    let otp = generate_numeric_code(RESET_OTP_DIGITS);
    db.set_reset_otp(user.id, &otp, Utc::now() + Duration::minutes(RESET_OTP_TTL_MINS))?;

    info!(user_id = user.id, "Issued password reset OTP");
    Ok((user, otp))
}

/// Replace the password if `otp` matches and has not expired
pub fn reset_password(db: &Database, email: &str, otp: &str, new_password: &str) -> Result<()> {
    if email.trim().is_empty() || otp.trim().is_empty() || new_password.is_empty() {
        return Err(Error::Validation("All fields are required".into()));
    }
    validate_password_strength(new_password)?;

    let user = db
        .get_user_by_email(email)?
        .ok_or(Error::InvalidOrExpiredCode)?;

    let now = Utc::now();
    let current = match (&user.reset_password_otp, user.reset_password_expires) {
        (Some(stored), Some(expires)) if expires > now => {
            if !codes_match(stored, otp) {
                if db.record_failed_reset(user.id, MAX_RESET_ATTEMPTS)? {
                    warn!(user_id = user.id, "Reset OTP discarded after too many attempts");
                }
                return Err(Error::InvalidOrExpiredCode);
            }
            stored.clone()
        }
        _ => return Err(Error::InvalidOrExpiredCode),
    };

    let new_hash = hash_password(new_password)?;
    if !db.consume_reset_otp(user.id, &current, now, &new_hash)? {
        return Err(Error::InvalidOrExpiredCode);
    }

    info!(user_id = user.id, "Password reset");
    Ok(())
}
