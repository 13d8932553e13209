//! User Repository
//!
//! Accounts and their bearer-token sessions.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use mrf_models::{PageRequest, Paginated, RegisterUser, Session, UpdateUser, User, UserFilter, UserRole};

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by ID")
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by email")
    }

    /// Create a user. A duplicate email surfaces as a unique violation.
    pub async fn create(
        &self,
        profile: &RegisterUser,
        password_hash: &str,
        role: UserRole,
        approval_level: i16,
    ) -> Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users
                (email, password_hash, first_name, last_name, user_code,
                 designation, department, location, role, approval_level)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(profile.email.trim().to_lowercase())
        .bind(password_hash)
        .bind(profile.first_name.trim())
        .bind(profile.last_name.trim())
        .bind(&profile.user_code)
        .bind(&profile.designation)
        .bind(&profile.department)
        .bind(&profile.location)
        .bind(role.as_str())
        .bind(approval_level)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create user")
    }

    pub async fn list(&self, filter: &UserFilter) -> Result<Paginated<User>> {
        let page = PageRequest::new(filter.page.unwrap_or(1), filter.limit.unwrap_or(50));

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE 1=1");
        push_user_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;

        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM users WHERE 1=1");
        push_user_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let users = query
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list users")?;

        Ok(Paginated::new(users, page, total))
    }

    /// Apply the set fields of `update`. Returns `None` when the user does not exist.
    pub async fn update(&self, id: Uuid, update: &UpdateUser) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                user_code = COALESCE($5, user_code),
                designation = COALESCE($6, designation),
                department = COALESCE($7, department),
                location = COALESCE($8, location),
                role = COALESCE($9, role),
                approval_level = COALESCE($10, approval_level),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.email.as_ref().map(|e| e.trim().to_lowercase()))
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.user_code)
        .bind(&update.designation)
        .bind(&update.department)
        .bind(&update.location)
        .bind(update.role.map(|r| r.as_str()))
        .bind(update.approval_level)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update user")
    }

    /// Deactivating a user also revokes their sessions.
    pub async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Option<User>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(is_active)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to update user status")?;

        if user.is_some() && !is_active {
            sqlx::query("DELETE FROM sessions WHERE user_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to revoke sessions")?;
        }

        tx.commit().await.context("Failed to commit user status")?;
        Ok(user)
    }

    pub async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .context("Failed to update password")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn record_login(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to record login")?;
        Ok(())
    }

    pub async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session> {
        sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token_hash, expires_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create session")
    }

    /// Active user owning an unexpired session with this token hash.
    pub async fn find_by_session(&self, token_hash: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT u.*
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = $1
              AND s.expires_at > NOW()
              AND u.is_active = TRUE
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to resolve session")
    }

    pub async fn delete_session(&self, token_hash: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .context("Failed to purge expired sessions")?;

        tracing::debug!(purged = result.rows_affected(), "Expired sessions purged");
        Ok(result.rows_affected())
    }
}

fn push_user_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    if let Some(role) = filter.role {
        query.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some(is_active) = filter.is_active {
        query.push(" AND is_active = ").push_bind(is_active);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        query
            .push(" AND (email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR last_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR user_code ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_filter_sql() {
        let filter = UserFilter {
            role: Some(UserRole::Manager),
            is_active: Some(true),
            search: Some("obi".into()),
            ..Default::default()
        };
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM users WHERE 1=1");
        push_user_filters(&mut query, &filter);

        let sql = query.sql();
        assert!(sql.contains("AND role = $1"));
        assert!(sql.contains("AND is_active = $2"));
        assert!(sql.contains("user_code ILIKE $6)"));
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let filter = UserFilter {
            search: Some("   ".into()),
            ..Default::default()
        };
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM users WHERE 1=1");
        push_user_filters(&mut query, &filter);
        assert_eq!(query.sql(), "SELECT * FROM users WHERE 1=1");
    }
}
