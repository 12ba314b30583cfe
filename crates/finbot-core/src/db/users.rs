//! User operations: accounts, chat linking, password-reset OTPs

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::User;

const USER_COLUMNS: &str = "id, name, email, password_hash, telegram_chat_id, \
     verification_code, verification_expires, reset_password_otp, reset_password_expires, \
     created_at";

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    let verification_expires: Option<String> = row.get(6)?;
    let reset_expires: Option<String> = row.get(8)?;
    let created_at: String = row.get(9)?;

    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        telegram_chat_id: row.get(4)?,
        verification_code: row.get(5)?,
        verification_expires: verification_expires.as_deref().map(parse_datetime),
        reset_password_otp: row.get(7)?,
        reset_password_expires: reset_expires.as_deref().map(parse_datetime),
        created_at: parse_datetime(&created_at),
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Emails are compared trimmed and lowercased everywhere
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Database {
    /// Create a user; a duplicate email is a `Conflict`
    pub fn create_user(&self, name: &str, email: &str, password_hash: &str) -> Result<User> {
        let conn = self.conn()?;
        let email = normalize_email(email);

        conn.execute(
            "INSERT INTO users (name, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
            params![name.trim(), email, password_hash, format_datetime(&Utc::now())],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict("Email is already registered".into())
            } else {
                Error::Database(e)
            }
        })?;

        let id = conn.last_insert_rowid();
        drop(conn);
        self.get_user(id)?
            .ok_or_else(|| Error::Internal(format!("User {} vanished after insert", id)))
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
                params![id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS),
                params![normalize_email(email)],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Resolve the user linked to a chat identity
    pub fn get_user_by_chat_id(&self, chat_id: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE telegram_chat_id = ?", USER_COLUMNS),
                params![chat_id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Store a linking code, replacing any previous one
    pub fn set_verification_code(
        &self,
        user_id: i64,
        code: &str,
        expires: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE users SET verification_code = ?, verification_expires = ? WHERE id = ?",
            params![code, format_datetime(&expires), user_id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("User {}", user_id)));
        }
        Ok(())
    }

    /// Find the user holding `code`, if it has not expired at `now`
    pub fn find_user_by_pending_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!(
                    "SELECT {} FROM users WHERE verification_code = ? AND verification_expires > ?",
                    USER_COLUMNS
                ),
                params![code, format_datetime(&now)],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Link a chat identity and clear the code in one conditional update
    ///
    /// Returns false if the code was already consumed or replaced.
    pub fn link_chat(&self, user_id: i64, code: &str, chat_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn
            .execute(
                "UPDATE users
                 SET telegram_chat_id = ?, verification_code = NULL, verification_expires = NULL
                 WHERE id = ? AND verification_code = ? AND telegram_chat_id IS NULL",
                params![chat_id, user_id, code],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::Validation("This chat is already linked to another account".into())
                } else {
                    Error::Database(e)
                }
            })?;
        Ok(rows == 1)
    }

    /// Store a password-reset OTP, replacing any previous one
    pub fn set_reset_otp(&self, user_id: i64, otp: &str, expires: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE users
             SET reset_password_otp = ?, reset_password_expires = ?, reset_attempts = 0
             WHERE id = ?",
            params![otp, format_datetime(&expires), user_id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("User {}", user_id)));
        }
        Ok(())
    }

    /// Replace the password hash and clear the OTP, only if `otp` is still current
    pub fn consume_reset_otp(
        &self,
        user_id: i64,
        otp: &str,
        now: DateTime<Utc>,
        new_password_hash: &str,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE users
             SET password_hash = ?, reset_password_otp = NULL, reset_password_expires = NULL,
                 reset_attempts = 0
             WHERE id = ? AND reset_password_otp = ? AND reset_password_expires > ?",
            params![new_password_hash, user_id, otp, format_datetime(&now)],
        )?;
        Ok(rows == 1)
    }

    /// Count a wrong OTP guess; the OTP is discarded once `max_attempts` is reached
    ///
    /// Returns true when this guess used up the last attempt.
    pub fn record_failed_reset(&self, user_id: i64, max_attempts: u32) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE users
             SET reset_attempts = reset_attempts + 1,
                 reset_password_otp = CASE WHEN reset_attempts + 1 >= ?1
                     THEN NULL ELSE reset_password_otp END,
                 reset_password_expires = CASE WHEN reset_attempts + 1 >= ?1
                     THEN NULL ELSE reset_password_expires END
             WHERE id = ?2 AND reset_password_otp IS NOT NULL",
            params![max_attempts, user_id],
        )?;
        if rows == 0 {
            return Ok(false);
        }

        let attempts: u32 = conn.query_row(
            "SELECT reset_attempts FROM users WHERE id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(attempts >= max_attempts)
    }
}
