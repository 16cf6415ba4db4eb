use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use super::{FlowieDb, map_not_found};
use crate::errors::{FlowieError, Result};
use crate::models::{Employee, RefreshToken, User};

const USER_COLUMNS: &str = "id, email, password_hash, token_version, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        token_version: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn refresh_token_from_row(row: &Row<'_>) -> rusqlite::Result<RefreshToken> {
    Ok(RefreshToken {
        id: row.get(0)?,
        user_id: row.get(1)?,
        token_hash: row.get(2)?,
        expires_at: row.get(3)?,
        revoked: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl FlowieDb {
    // ── Users ─────────────────────────────────────────────────────────

    /// Register a user account and the employee record linked to it.
    pub fn create_user_with_employee(
        &self,
        email: &str,
        password_hash: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<(User, Employee)> {
        let email = email.trim();
        if self.get_user_by_email(email)?.is_some() {
            return Err(FlowieError::validation("email", "is already registered"));
        }

        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO users (email, password_hash, token_version, created_at)
             VALUES (?1, ?2, 0, ?3)",
            params![email, password_hash, now],
        )?;
        let user_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO employees (user_id, name, email, active, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![user_id, name.trim(), email, now],
        )?;
        let employee_id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::info!(user_id, employee_id, "user registered");
        Ok((self.get_user(user_id)?, self.get_employee(employee_id)?))
    }

    pub fn get_user(&self, id: i64) -> Result<User> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                user_from_row,
            )
            .optional()?;
        map_not_found(user, "User", id)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                params![email.trim()],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    // ── Refresh tokens ────────────────────────────────────────────────

    pub fn store_refresh_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at, revoked, created_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![user_id, token_hash, expires_at, now],
        )?;
        Ok(())
    }

    /// Revoke a refresh token and return its owner, provided the token is
    /// known, not yet revoked and not expired. Each token is usable once.
    pub fn consume_refresh_token(&self, token_hash: &str, now: DateTime<Utc>) -> Result<User> {
        let token = self
            .conn
            .query_row(
                "SELECT id, user_id, token_hash, expires_at, revoked, created_at
                 FROM refresh_tokens WHERE token_hash = ?1",
                params![token_hash],
                refresh_token_from_row,
            )
            .optional()?;

        let token = match token {
            Some(t) if !t.revoked && t.expires_at > now => t,
            Some(t) => {
                tracing::warn!(
                    user_id = t.user_id,
                    revoked = t.revoked,
                    "rejected stale refresh token"
                );
                return Err(FlowieError::Unauthorized("Invalid refresh token".into()));
            }
            None => return Err(FlowieError::Unauthorized("Invalid refresh token".into())),
        };

        self.conn.execute(
            "UPDATE refresh_tokens SET revoked = 1 WHERE id = ?1",
            params![token.id],
        )?;
        self.get_user(token.user_id)
    }

    /// Revoke every refresh token of a user and bump the token version so
    /// outstanding access tokens stop validating.
    pub fn revoke_user_sessions(&self, user_id: i64) -> Result<User> {
        self.get_user(user_id)?;

        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ?1 AND revoked = 0",
            params![user_id],
        )?;
        tx.execute(
            "UPDATE users SET token_version = token_version + 1 WHERE id = ?1",
            params![user_id],
        )?;
        tx.commit()?;

        tracing::info!(user_id, "user sessions revoked");
        self.get_user(user_id)
    }
}
